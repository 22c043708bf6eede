use std::path::Path;

use anyhow::Context as _;

use crate::compute::api::ComputeApi;
use crate::foundation::error::{MandelError, MandelResult, Stage};

/// Name of the kernel entry point every kernel source must declare.
pub const ENTRY_POINT: &str = "Mandelbrot";

const OPENCL_C_SOURCE: &str = include_str!("../../kernels/mandelbrot.cl");
const WGSL_SOURCE: &str = include_str!("../../kernels/mandelbrot.wgsl");

/// Language a kernel source is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelDialect {
    /// OpenCL C (host and OpenCL backends).
    OpenClC,
    /// WGSL (GPU backend).
    Wgsl,
}

/// Kernel source text plus where it came from.
///
/// The packaged sources live in `kernels/` and are embedded at build time. A source may also be
/// loaded from a file; it is read once per session and never cached across sessions.
#[derive(Clone, Debug)]
pub struct KernelSource {
    dialect: KernelDialect,
    origin: String,
    text: String,
}

impl KernelSource {
    /// The packaged kernel for `dialect`.
    pub fn builtin(dialect: KernelDialect) -> Self {
        let (origin, text) = match dialect {
            KernelDialect::OpenClC => ("builtin:mandelbrot.cl", OPENCL_C_SOURCE),
            KernelDialect::Wgsl => ("builtin:mandelbrot.wgsl", WGSL_SOURCE),
        };
        Self {
            dialect,
            origin: origin.to_string(),
            text: text.to_string(),
        }
    }

    /// Load a kernel source from `path`.
    pub fn from_path(path: &Path, dialect: KernelDialect) -> MandelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read kernel source '{}'", path.display()))?;
        Self::from_text(path.display().to_string(), text, dialect)
    }

    /// Wrap in-memory source text.
    pub fn from_text(
        origin: impl Into<String>,
        text: impl Into<String>,
        dialect: KernelDialect,
    ) -> MandelResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(MandelError::validation("kernel source is empty"));
        }
        Ok(Self {
            dialect,
            origin: origin.into(),
            text,
        })
    }

    /// Source language.
    pub fn dialect(&self) -> KernelDialect {
        self.dialect
    }

    /// `builtin:<file>` for packaged sources, otherwise the path or label it was loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether this is one of the packaged sources.
    pub fn is_builtin(&self) -> bool {
        self.origin.starts_with("builtin:")
    }

    /// Source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Version declared by a `kernel-version:` tag in the source header, if any.
    pub fn version(&self) -> Option<&str> {
        self.text.lines().take(8).find_map(|line| {
            let (_, rest) = line.split_once("kernel-version:")?;
            let v = rest.trim();
            (!v.is_empty()).then_some(v)
        })
    }
}

/// A custom source whose kernel bodies `api` would not execute.
pub(crate) fn overridden_body_ignored<A: ComputeApi>(api: &A, source: &KernelSource) -> bool {
    !source.is_builtin() && !api.runs_kernel_bodies()
}

/// A kernel compiled for exactly one device.
///
/// Owns the device context, the program and the kernel entry point. Fields are declared in
/// reverse acquisition order so they drop kernel, program, context.
pub struct CompiledProgram<A: ComputeApi> {
    kernel: A::Kernel,
    program: A::Program,
    context: A::Context,
}

impl<A: ComputeApi> CompiledProgram<A> {
    /// Build a context for `device`, compile `source` and look up [`ENTRY_POINT`].
    ///
    /// A failure in any step releases what earlier steps acquired. There is no retry.
    #[tracing::instrument(skip_all, fields(backend = api.name(), origin = source.origin()))]
    pub fn compile(api: &A, device: &A::Device, source: &KernelSource) -> MandelResult<Self> {
        if overridden_body_ignored(api, source) {
            tracing::warn!(
                backend = api.name(),
                "kernel bodies in a custom source are ignored; native kernel math runs instead"
            );
        }
        let context = api
            .create_context(device)
            .map_err(|e| e.at_stage(Stage::ContextCreation))?;
        let program = api
            .build_program(&context, device, source.text())
            .map_err(|e| e.at_stage(Stage::Compilation))?;
        let kernel = api
            .create_kernel(&program, ENTRY_POINT)
            .map_err(|e| e.at_stage(Stage::KernelLookup))?;

        tracing::debug!("kernel compiled");
        Ok(Self {
            kernel,
            program,
            context,
        })
    }

    /// Kernel entry point.
    pub fn kernel(&self) -> &A::Kernel {
        &self.kernel
    }

    /// Compiled program.
    pub fn program(&self) -> &A::Program {
        &self.program
    }

    /// Context the program was built in.
    pub fn context(&self) -> &A::Context {
        &self.context
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/program.rs"]
mod tests;
