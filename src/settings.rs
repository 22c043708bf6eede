use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::compute::backend::BackendKind;
use crate::compute::host::HostOpts;
use crate::foundation::error::{MandelError, MandelResult};
use crate::foundation::request::{Center, RenderRequest, RowStride};
use crate::pipeline::catalog::DEFAULT_DEVICE_CAP;
use crate::pipeline::program::{KernelDialect, KernelSource};
use crate::pipeline::session::SessionOpts;

/// Render configuration, loadable from JSON.
///
/// Every field is optional in the file; missing fields take their [`Default`] value.
/// Unknown keys are rejected so typos surface instead of being ignored.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    /// Compute backend.
    pub backend: BackendKind,
    /// Maximum number of devices to enumerate.
    pub device_cap: usize,
    /// Catalog index of the render device.
    pub device_index: usize,
    /// Kernel source override. The packaged kernel is used when absent.
    pub kernel_path: Option<PathBuf>,
    /// Row stride the rasterizer reads the field with.
    pub row_stride: RowStride,
    /// Upper bound on the work-group size. Never raises the device maximum.
    pub work_group_limit: Option<usize>,
    /// Image center on the complex plane.
    pub center: Center,
    /// Host backend worker threads.
    pub host_threads: Option<usize>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            device_cap: DEFAULT_DEVICE_CAP,
            device_index: 0,
            kernel_path: None,
            row_stride: RowStride::default(),
            work_group_limit: None,
            center: Center::default(),
            host_threads: None,
        }
    }
}

impl RenderSettings {
    /// Parse settings from a JSON string and validate them.
    pub fn from_json_str(json: &str) -> MandelResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| MandelError::serde(format!("parse render settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file and validate them.
    pub fn from_json_path(path: &Path) -> MandelResult<Self> {
        let f = File::open(path)
            .with_context(|| format!("open render settings '{}'", path.display()))?;
        let settings: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            MandelError::serde(format!("parse render settings '{}': {e}", path.display()))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check field ranges. Does not touch the filesystem or any device.
    pub fn validate(&self) -> MandelResult<()> {
        if self.device_cap == 0 {
            return Err(MandelError::validation("device_cap must be at least 1"));
        }
        if self.device_index >= self.device_cap {
            return Err(MandelError::validation(format!(
                "device_index {} is outside device_cap {}",
                self.device_index, self.device_cap
            )));
        }
        if self.work_group_limit == Some(0) {
            return Err(MandelError::validation("work_group_limit must be positive"));
        }
        if self.host_threads == Some(0) {
            return Err(MandelError::validation("host_threads must be positive"));
        }
        if !self.center.x.is_finite() || !self.center.y.is_finite() {
            return Err(MandelError::validation("center coordinates must be finite"));
        }
        Ok(())
    }

    /// Kernel source for `dialect`: the override file when set, else the packaged kernel.
    pub fn kernel_source(&self, dialect: KernelDialect) -> MandelResult<KernelSource> {
        match &self.kernel_path {
            Some(path) => KernelSource::from_path(path, dialect),
            None => Ok(KernelSource::builtin(dialect)),
        }
    }

    /// Session knobs derived from these settings.
    pub fn session_opts(&self) -> SessionOpts {
        SessionOpts {
            device_cap: self.device_cap,
            device_index: self.device_index,
            work_group_limit: self.work_group_limit,
        }
    }

    /// Host backend options derived from these settings.
    pub fn host_opts(&self) -> HostOpts {
        HostOpts {
            threads: self.host_threads,
            ..HostOpts::default()
        }
    }

    /// Build a request for a `width`×`height` image with these settings' center and stride.
    pub fn request(
        &self,
        width: u32,
        height: u32,
        unit: Option<f64>,
    ) -> MandelResult<RenderRequest> {
        Ok(RenderRequest::new(width, height)?
            .with_unit(unit)
            .with_center(self.center.x, self.center.y)?
            .with_stride(self.row_stride))
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
