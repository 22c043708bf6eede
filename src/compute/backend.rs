use crate::compute::api::ComputeApi;
use crate::compute::host::{HostApi, HostOpts};
use crate::foundation::error::{MandelError, MandelResult};
use crate::pipeline::program::KernelDialect;

/// Compute backend a render runs on.
///
/// Every variant parses from settings; whether it can run depends on the cargo features the
/// crate was built with (see [`BackendKind::is_available`]).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CPU emulation on a rayon pool. Always available.
    #[default]
    Host,
    /// System OpenCL runtime (`opencl` feature).
    #[serde(rename = "opencl")]
    OpenCl,
    /// wgpu compute (`gpu` feature).
    Gpu,
}

impl BackendKind {
    /// All kinds, in declaration order.
    pub const ALL: [BackendKind; 3] = [BackendKind::Host, BackendKind::OpenCl, BackendKind::Gpu];

    /// Settings/CLI name.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Host => "host",
            BackendKind::OpenCl => "opencl",
            BackendKind::Gpu => "gpu",
        }
    }

    /// Whether this build can run the backend.
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Host => true,
            BackendKind::OpenCl => cfg!(feature = "opencl"),
            BackendKind::Gpu => cfg!(feature = "gpu"),
        }
    }

    /// OpenCL when built in, otherwise the host backend.
    pub fn preferred() -> Self {
        if BackendKind::OpenCl.is_available() {
            BackendKind::OpenCl
        } else {
            BackendKind::Host
        }
    }

    /// Kernel language the backend compiles.
    pub fn dialect(self) -> KernelDialect {
        match self {
            BackendKind::Host | BackendKind::OpenCl => KernelDialect::OpenClC,
            BackendKind::Gpu => KernelDialect::Wgsl,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Work that is generic over the compute API.
///
/// [`run_on_backend`] builds the concrete API for a [`BackendKind`] and hands it to the task,
/// which keeps the pipeline monomorphized per backend.
pub trait BackendTask {
    /// Task result.
    type Output;

    /// Run against `api`, whose kernels are written in `dialect`.
    fn run<A: ComputeApi>(self, api: &A, dialect: KernelDialect) -> MandelResult<Self::Output>;
}

/// Construct the API for `kind` and run `task` on it.
pub fn run_on_backend<T: BackendTask>(
    kind: BackendKind,
    host: HostOpts,
    task: T,
) -> MandelResult<T::Output> {
    tracing::debug!(backend = %kind, "selecting backend");
    match kind {
        BackendKind::Host => task.run(&HostApi::new(host), kind.dialect()),
        #[cfg(feature = "opencl")]
        BackendKind::OpenCl => task.run(&crate::compute::opencl::OpenClApi, kind.dialect()),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => task.run(&crate::compute::gpu::GpuApi::new(), kind.dialect()),
        #[allow(unreachable_patterns)]
        other => Err(MandelError::validation(format!(
            "requested backend is not available: {other} (rebuild with the '{other}' feature)"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compute/backend.rs"]
mod tests;
