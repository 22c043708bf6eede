//! clmandelbrot computes a Mandelbrot escape-iteration field on a parallel compute device and
//! rasterizes it into a grayscale image.
//!
//! # Pipeline overview
//!
//! 1. **Enumerate**: [`DeviceCatalog`] lists up to ten devices of a [`ComputeApi`] backend.
//! 2. **Compile**: [`CompiledProgram`] builds the kernel source for one device and looks up the
//!    `Mandelbrot` entry point.
//! 3. **Execute**: [`ExecutionContext`] owns the queue and the output buffer, binds the six
//!    kernel arguments, dispatches one work item per pixel and reads the field back.
//! 4. **Rasterize**: [`draw`] writes each intensity as an `(c, c, c)` pixel onto a
//!    [`PixelSurface`].
//!
//! [`RenderSession`] drives these stages as a linear state machine and releases every native
//! handle in reverse acquisition order on success and failure alike.
//!
//! # Backends
//!
//! - `host` (always built): OpenCL C source scanned for kernels and run natively on rayon.
//! - `opencl` (cargo feature `opencl`): the system OpenCL runtime through `ocl`.
//! - `gpu` (cargo feature `gpu`): wgpu compute with a WGSL port of the kernel.
//!
//! Most callers go through [`render_image`] with [`RenderSettings`], or through the
//! [`boundary`] functions when embedding.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod caps;
mod compute;
mod foundation;
mod pipeline;
mod render;
mod settings;

/// Plain-argument entry points for embedders.
pub mod boundary;

pub use caps::fields::{
    DEVICE_FIELDS, DEVICE_TYPE_ACCELERATOR, DEVICE_TYPE_CPU, DEVICE_TYPE_DEFAULT,
    DEVICE_TYPE_GPU, DeviceField, FP_DENORM, FP_FMA, FP_INF_NAN, FP_ROUND_TO_INF,
    FP_ROUND_TO_NEAREST, FP_ROUND_TO_ZERO, FieldDescriptor, InfoValue, PLATFORM_FIELDS,
    PlatformField, ValueKind,
};
pub use caps::record::{AttributeMap, DeviceRecord, describe_devices};
pub use compute::api::{ComputeApi, Dispatch, KernelArg};
pub use compute::backend::{BackendKind, BackendTask, run_on_backend};
pub use compute::escape::{INTENSITY_STEP, ITERATION_LIMIT, escape_intensity, pixel_coordinate};
#[cfg(feature = "gpu")]
pub use compute::gpu::{GpuApi, GpuDevice};
pub use compute::host::{HostApi, HostDevice, HostOpts, build_thread_pool};
#[cfg(feature = "opencl")]
pub use compute::opencl::{OpenClApi, OpenClDevice};
pub use foundation::error::{COMPILE_LOG_LIMIT, MandelError, MandelResult, Stage};
pub use foundation::request::{Center, RenderRequest, RowStride};
pub use pipeline::catalog::{DEFAULT_DEVICE_CAP, DeviceCatalog};
pub use pipeline::execution::{
    DispatchOpts, Execution, ExecutionContext, KernelParams, ResultField,
};
pub use pipeline::program::{CompiledProgram, ENTRY_POINT, KernelDialect, KernelSource};
pub use pipeline::raster::{PixelSurface, draw};
pub use pipeline::session::{RenderReport, RenderSession, SessionOpts, SessionState};
pub use render::{
    BenchEntry, BenchOpts, bench, bench_image_path, compute_field, list_devices, render_image,
};
pub use settings::RenderSettings;

#[cfg(test)]
#[path = "../tests/unit/support/mock_api.rs"]
pub(crate) mod mock_api;
