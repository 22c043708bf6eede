//! Settings-driven entry points: render, field-only compute, device listing, benchmark.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::caps::record::{DeviceRecord, describe_devices};
use crate::compute::api::ComputeApi;
use crate::compute::backend::{BackendTask, run_on_backend};
use crate::foundation::error::MandelResult;
use crate::foundation::request::RenderRequest;
use crate::pipeline::catalog::DeviceCatalog;
use crate::pipeline::execution::ResultField;
use crate::pipeline::program::KernelDialect;
use crate::pipeline::session::{RenderReport, RenderSession, SessionOpts};
use crate::settings::RenderSettings;

/// Render `request` to an RGB image with the backend and device chosen by `settings`.
pub fn render_image(
    settings: &RenderSettings,
    request: &RenderRequest,
) -> MandelResult<(image::RgbImage, RenderReport)> {
    settings.validate()?;
    run_on_backend(
        settings.backend,
        settings.host_opts(),
        ImageTask { settings, request },
    )
}

/// Compute the raw escape field for `request` without rasterizing it.
pub fn compute_field(
    settings: &RenderSettings,
    request: &RenderRequest,
) -> MandelResult<(ResultField, RenderReport)> {
    settings.validate()?;
    run_on_backend(
        settings.backend,
        settings.host_opts(),
        FieldTask { settings, request },
    )
}

/// Capability records for every device the configured backend enumerates.
pub fn list_devices(settings: &RenderSettings) -> MandelResult<Vec<DeviceRecord>> {
    settings.validate()?;
    run_on_backend(
        settings.backend,
        settings.host_opts(),
        ListTask {
            cap: settings.device_cap,
        },
    )
}

/// Benchmark parameters.
#[derive(Clone, Debug)]
pub struct BenchOpts {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Plane unit; `None` uses the default.
    pub unit: Option<f64>,
    /// Renders per device.
    pub iterations: usize,
    /// Directory the per-device PNGs are written to.
    pub out_dir: PathBuf,
}

/// Benchmark result for one device.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BenchEntry {
    /// Catalog index.
    pub device_index: usize,
    /// Device name.
    pub device_name: String,
    /// Total wall time for all iterations.
    pub elapsed: Duration,
    /// PNG of the device's last render.
    pub image_path: PathBuf,
}

/// Render `opts.iterations` images on every enumerated device and save each device's last image
/// as `clmandelbrot{index}.png`.
pub fn bench(settings: &RenderSettings, opts: &BenchOpts) -> MandelResult<Vec<BenchEntry>> {
    settings.validate()?;
    run_on_backend(
        settings.backend,
        settings.host_opts(),
        BenchTask { settings, opts },
    )
}

/// Path of the benchmark image for device `index`.
pub fn bench_image_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("clmandelbrot{index}.png"))
}

struct ImageTask<'a> {
    settings: &'a RenderSettings,
    request: &'a RenderRequest,
}

impl BackendTask for ImageTask<'_> {
    type Output = (image::RgbImage, RenderReport);

    fn run<A: ComputeApi>(self, api: &A, dialect: KernelDialect) -> MandelResult<Self::Output> {
        let source = self.settings.kernel_source(dialect)?;
        RenderSession::new(api, &source, self.settings.session_opts()).render(self.request)
    }
}

struct FieldTask<'a> {
    settings: &'a RenderSettings,
    request: &'a RenderRequest,
}

impl BackendTask for FieldTask<'_> {
    type Output = (ResultField, RenderReport);

    fn run<A: ComputeApi>(self, api: &A, dialect: KernelDialect) -> MandelResult<Self::Output> {
        let source = self.settings.kernel_source(dialect)?;
        RenderSession::new(api, &source, self.settings.session_opts()).compute(self.request)
    }
}

struct ListTask {
    cap: usize,
}

impl BackendTask for ListTask {
    type Output = Vec<DeviceRecord>;

    fn run<A: ComputeApi>(self, api: &A, _dialect: KernelDialect) -> MandelResult<Self::Output> {
        describe_devices(api, self.cap)
    }
}

struct BenchTask<'a> {
    settings: &'a RenderSettings,
    opts: &'a BenchOpts,
}

impl BackendTask for BenchTask<'_> {
    type Output = Vec<BenchEntry>;

    fn run<A: ComputeApi>(self, api: &A, dialect: KernelDialect) -> MandelResult<Self::Output> {
        let source = self.settings.kernel_source(dialect)?;
        let request = self
            .settings
            .request(self.opts.width, self.opts.height, self.opts.unit)?;
        let device_count = DeviceCatalog::enumerate(api, self.settings.device_cap)?.len();

        std::fs::create_dir_all(&self.opts.out_dir).with_context(|| {
            format!("create output dir '{}'", self.opts.out_dir.display())
        })?;

        let mut entries = Vec::with_capacity(device_count);
        for device_index in 0..device_count {
            let session_opts = SessionOpts {
                device_index,
                ..self.settings.session_opts()
            };
            let started = Instant::now();
            let mut last = None;
            for _ in 0..self.opts.iterations.max(1) {
                let mut session = RenderSession::new(api, &source, session_opts);
                last = Some(session.render::<image::RgbImage>(&request)?);
            }
            let elapsed = started.elapsed();
            let Some((img, report)) = last else {
                continue;
            };

            let image_path = bench_image_path(&self.opts.out_dir, device_index);
            img.save_with_format(&image_path, image::ImageFormat::Png)
                .with_context(|| format!("write png '{}'", image_path.display()))?;
            tracing::info!(
                device = %report.device_name,
                index = device_index,
                iterations = self.opts.iterations.max(1),
                seconds = elapsed.as_secs_f64(),
                "bench device complete"
            );
            entries.push(BenchEntry {
                device_index,
                device_name: report.device_name,
                elapsed,
                image_path,
            });
        }
        Ok(entries)
    }
}
