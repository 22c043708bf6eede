use crate::caps::fields::{DeviceField, InfoValue, PlatformField};
use crate::foundation::error::{MandelError, MandelResult};

/// One positional kernel argument.
#[derive(Debug)]
pub enum KernelArg<'a, B> {
    /// Device buffer.
    Buffer(&'a B),
    /// 32-bit signed integer (`int`).
    Int(i32),
    /// 32-bit float (`float`).
    Float(f32),
}

impl<B> KernelArg<'_, B> {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            KernelArg::Buffer(_) => "buffer",
            KernelArg::Int(_) => "int",
            KernelArg::Float(_) => "float",
        }
    }
}

/// One-dimensional range dispatch: `global` work items in groups of `local`.
///
/// `global` is always a multiple of `local`; kernels mask items past the real pixel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    /// Total work items, padded up to a multiple of `local`.
    pub global: usize,
    /// Work-group size.
    pub local: usize,
}

impl Dispatch {
    /// Pad `items` up to the next multiple of `local`.
    pub fn padded(items: usize, local: usize) -> Self {
        let local = local.max(1);
        Self {
            global: items.div_ceil(local) * local,
            local,
        }
    }

    /// Number of work groups in the range.
    pub fn groups(&self) -> usize {
        self.global / self.local
    }
}

/// Native compute API the render pipeline drives.
///
/// Each associated handle type owns one native resource and releases it on drop, so the owners
/// in the render pipeline only have to get the drop order right. Every method reports failures
/// with the [`MandelError`](crate::MandelError) variant of the stage it serves; the pipeline
/// re-attributes stray variants to the calling stage anyway.
pub trait ComputeApi {
    /// Discovered device.
    type Device: Clone + std::fmt::Debug;
    /// Context scoped to one device.
    type Context;
    /// Compiled program.
    type Program;
    /// Kernel entry point extracted from a program.
    type Kernel;
    /// In-order command queue.
    type Queue;
    /// Device-resident byte buffer.
    type Buffer;

    /// Backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Enumerate devices in platform order, at most `cap` of them.
    fn devices(&self, cap: usize) -> MandelResult<Vec<Self::Device>>;

    /// Human-readable device name.
    fn device_name(&self, device: &Self::Device) -> String;

    /// Whether compiled kernel bodies actually run. Backends that only check declarations and
    /// bind to native code return `false`.
    fn runs_kernel_bodies(&self) -> bool {
        true
    }

    /// Build a context scoped to exactly `device`.
    fn create_context(&self, device: &Self::Device) -> MandelResult<Self::Context>;

    /// Compile `source` for `device`.
    fn build_program(
        &self,
        context: &Self::Context,
        device: &Self::Device,
        source: &str,
    ) -> MandelResult<Self::Program>;

    /// Look up the kernel named `entry_point`.
    fn create_kernel(&self, program: &Self::Program, entry_point: &str)
    -> MandelResult<Self::Kernel>;

    /// Create a command queue on `device`.
    fn create_queue(&self, context: &Self::Context, device: &Self::Device)
    -> MandelResult<Self::Queue>;

    /// Allocate a write-only device buffer of `len` bytes.
    fn create_buffer(
        &self,
        context: &Self::Context,
        queue: &Self::Queue,
        len: usize,
    ) -> MandelResult<Self::Buffer>;

    /// Bind argument `index` of `kernel`.
    fn set_arg(
        &self,
        kernel: &Self::Kernel,
        index: u32,
        arg: KernelArg<'_, Self::Buffer>,
    ) -> MandelResult<()>;

    /// Largest work-group size `kernel` supports on `device`.
    fn max_work_group_size(&self, kernel: &Self::Kernel, device: &Self::Device)
    -> MandelResult<usize>;

    /// Enqueue a 1-D range of `kernel` on `queue`.
    fn enqueue(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        dispatch: Dispatch,
    ) -> MandelResult<()>;

    /// Block until every command on `queue` has completed.
    fn finish(&self, queue: &Self::Queue) -> MandelResult<()>;

    /// Allocate the zeroed host array a `len`-byte buffer is read back into.
    fn alloc_host(&self, len: usize) -> MandelResult<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            MandelError::host_allocation(format!("result field of {len} bytes: {e}"))
        })?;
        data.resize(len, 0);
        Ok(data)
    }

    /// Blocking copy of `buffer` into `out`. `out.len()` equals the buffer length.
    fn read_buffer(
        &self,
        queue: &Self::Queue,
        buffer: &Self::Buffer,
        out: &mut [u8],
    ) -> MandelResult<()>;

    /// Query one descriptive device attribute.
    fn device_field(&self, device: &Self::Device, field: DeviceField) -> MandelResult<InfoValue>;

    /// Query one attribute of the platform `device` belongs to.
    fn platform_field(
        &self,
        device: &Self::Device,
        field: PlatformField,
    ) -> MandelResult<InfoValue>;
}

#[cfg(test)]
#[path = "../../tests/unit/compute/api.rs"]
mod tests;
