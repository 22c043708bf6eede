use std::time::{Duration, Instant};

use crate::compute::api::ComputeApi;
use crate::foundation::error::{MandelError, MandelResult, Stage};
use crate::foundation::request::RenderRequest;
use crate::pipeline::catalog::{DEFAULT_DEVICE_CAP, DeviceCatalog};
use crate::pipeline::execution::{DispatchOpts, ExecutionContext, KernelParams, ResultField};
use crate::pipeline::program::{CompiledProgram, KernelSource};
use crate::pipeline::raster::{self, PixelSurface};

/// Where a [`RenderSession`] is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing acquired yet.
    Start,
    /// A device was enumerated and selected.
    DeviceSelected,
    /// The kernel is compiled for the selected device.
    Compiled,
    /// Queue and output buffer exist.
    QueueReady,
    /// The field has been read back and device resources released.
    Executed,
    /// The field has been drawn onto the surface.
    Rasterized,
    /// The session completed successfully.
    Done,
    /// The session failed; terminal.
    Failed {
        /// Stage the failure originated from, when it belongs to one.
        stage: Option<Stage>,
        /// Diagnostic text.
        reason: String,
    },
}

impl SessionState {
    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed { .. })
    }
}

/// Per-session knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOpts {
    /// Maximum number of devices to enumerate.
    pub device_cap: usize,
    /// Catalog index of the render device.
    pub device_index: usize,
    /// Optional clamp on the work-group size.
    pub work_group_limit: Option<usize>,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            device_cap: DEFAULT_DEVICE_CAP,
            device_index: 0,
            work_group_limit: None,
        }
    }
}

/// Summary of a successful render.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RenderReport {
    /// Backend name.
    pub backend: &'static str,
    /// Device the kernel ran on.
    pub device_name: String,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Work-group size used for the dispatch.
    pub local_size: usize,
    /// Padded global range.
    pub global_size: usize,
    /// Wall time from enumeration to readback.
    pub elapsed: Duration,
}

/// One render, start to finish.
///
/// A session is single use. Device handles, the compiled program and the execution context
/// are scoped to [`RenderSession::compute`] and dropped in reverse acquisition order on every
/// exit path, before anything is drawn. The surface is only touched after the whole device
/// pipeline has succeeded.
pub struct RenderSession<'a, A: ComputeApi> {
    api: &'a A,
    source: &'a KernelSource,
    opts: SessionOpts,
    state: SessionState,
}

impl<'a, A: ComputeApi> RenderSession<'a, A> {
    /// New session in [`SessionState::Start`].
    pub fn new(api: &'a A, source: &'a KernelSource, opts: SessionOpts) -> Self {
        Self {
            api,
            source,
            opts,
            state: SessionState::Start,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the device pipeline and return the read-back field. Ends in `Done`.
    pub fn compute(
        &mut self,
        request: &RenderRequest,
    ) -> MandelResult<(ResultField, RenderReport)> {
        let out = self.compute_field(request)?;
        self.advance(SessionState::Done);
        Ok(out)
    }

    /// Run the device pipeline and draw onto `surface`.
    ///
    /// On failure `surface` is left untouched.
    pub fn render_into<S: PixelSurface + ?Sized>(
        &mut self,
        request: &RenderRequest,
        surface: &mut S,
    ) -> MandelResult<RenderReport> {
        self.ensure_fresh()?;
        let (width, height) = surface.dimensions();
        if (width, height) != (request.width(), request.height()) {
            let err = MandelError::validation(format!(
                "surface is {width}x{height} but the request is {}x{}",
                request.width(),
                request.height()
            ));
            return Err(self.fail(err));
        }

        let (field, report) = self.compute_field(request)?;
        if let Err(e) = raster::draw(&field, request.stride(), surface) {
            return Err(self.fail(e));
        }
        self.advance(SessionState::Rasterized);
        self.advance(SessionState::Done);
        Ok(report)
    }

    /// Create a surface of the request's size and render into it.
    pub fn render<S: PixelSurface>(
        &mut self,
        request: &RenderRequest,
    ) -> MandelResult<(S, RenderReport)> {
        let (field, report) = self.compute_field(request)?;
        let mut surface = S::create(request.width(), request.height());
        if let Err(e) = raster::draw(&field, request.stride(), &mut surface) {
            return Err(self.fail(e));
        }
        self.advance(SessionState::Rasterized);
        self.advance(SessionState::Done);
        Ok((surface, report))
    }

    #[tracing::instrument(
        skip(self, request),
        fields(backend = self.api.name(), width = request.width(), height = request.height())
    )]
    fn compute_field(
        &mut self,
        request: &RenderRequest,
    ) -> MandelResult<(ResultField, RenderReport)> {
        self.ensure_fresh()?;
        match self.run_device_stages(request) {
            Ok(out) => {
                self.advance(SessionState::Executed);
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_device_stages(
        &mut self,
        request: &RenderRequest,
    ) -> MandelResult<(ResultField, RenderReport)> {
        let started = Instant::now();
        let api = self.api;

        let catalog = DeviceCatalog::enumerate(api, self.opts.device_cap)?;
        let device = catalog.select(self.opts.device_index)?;
        let device_name = api.device_name(device);
        tracing::debug!(device = %device_name, index = self.opts.device_index, "device selected");
        self.advance(SessionState::DeviceSelected);

        let program = CompiledProgram::compile(api, device, self.source)?;
        self.advance(SessionState::Compiled);

        let ctx =
            ExecutionContext::prepare(api, &program, device, request.width(), request.height())?;
        self.advance(SessionState::QueueReady);

        let params = KernelParams::from_request(request);
        let execution = ctx.execute(
            &params,
            DispatchOpts {
                work_group_limit: self.opts.work_group_limit,
            },
        )?;

        drop(ctx);
        drop(program);
        drop(catalog);

        let report = RenderReport {
            backend: api.name(),
            device_name,
            width: request.width(),
            height: request.height(),
            local_size: execution.dispatch.local,
            global_size: execution.dispatch.global,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            backend = report.backend,
            device = %report.device_name,
            width = report.width,
            height = report.height,
            local_size = report.local_size,
            elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
            "render complete"
        );
        Ok((execution.field, report))
    }

    fn ensure_fresh(&self) -> MandelResult<()> {
        if self.state != SessionState::Start {
            return Err(MandelError::validation(format!(
                "render session already used (state: {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    fn fail(&mut self, err: MandelError) -> MandelError {
        let stage = err.stage();
        tracing::warn!(
            stage = stage.map(Stage::name).unwrap_or("none"),
            error = %err,
            "render failed"
        );
        self.state = SessionState::Failed {
            stage,
            reason: err.to_string(),
        };
        err
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/session.rs"]
mod tests;
