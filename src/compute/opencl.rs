//! OpenCL backend on the `ocl` crate.

use ocl::core::{
    DeviceInfo, DeviceInfoResult, KernelWorkGroupInfo, KernelWorkGroupInfoResult, PlatformInfo,
};
use ocl::{
    Buffer as OclBuffer, Context as OclContext, Device as OclDevice, Kernel as OclKernel,
    Platform, Program as OclProgram, Queue as OclQueue, flags,
};

use crate::caps::fields::{DeviceField, InfoValue, PlatformField};
use crate::compute::api::{ComputeApi, Dispatch, KernelArg};
use crate::foundation::error::{MandelError, MandelResult};

/// Compute API backed by the system OpenCL ICD loader.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenClApi;

/// One OpenCL device together with the platform it was enumerated from.
#[derive(Clone, Copy, Debug)]
pub struct OpenClDevice {
    platform: Platform,
    device: OclDevice,
}

/// Wrap the raw platform ids. A loader without any installed driver reports an error here
/// rather than an empty list.
fn platforms<E: std::fmt::Display>(
    ids: Result<Vec<ocl::core::PlatformId>, E>,
) -> MandelResult<Vec<Platform>> {
    let ids = ids.map_err(|e| MandelError::no_device(format!("list platforms: {e}")))?;
    Ok(ids.into_iter().map(Platform::new).collect())
}

impl ComputeApi for OpenClApi {
    type Device = OpenClDevice;
    type Context = OclContext;
    type Program = OclProgram;
    type Kernel = OclKernel;
    type Queue = OclQueue;
    type Buffer = OclBuffer<u8>;

    fn name(&self) -> &'static str {
        "opencl"
    }

    fn devices(&self, cap: usize) -> MandelResult<Vec<OpenClDevice>> {
        let mut out = Vec::new();
        for platform in platforms(ocl::core::get_platform_ids())? {
            let devices = OclDevice::list_all(platform)
                .map_err(|e| MandelError::no_device(format!("list devices: {e}")))?;
            for device in devices {
                if out.len() == cap {
                    return Ok(out);
                }
                out.push(OpenClDevice { platform, device });
            }
        }
        Ok(out)
    }

    fn device_name(&self, device: &OpenClDevice) -> String {
        device
            .device
            .name()
            .unwrap_or_else(|_| "unknown OpenCL device".to_string())
    }

    fn create_context(&self, device: &OpenClDevice) -> MandelResult<OclContext> {
        OclContext::builder()
            .platform(device.platform)
            .devices(device.device)
            .build()
            .map_err(|e| MandelError::context_creation(e.to_string()))
    }

    fn build_program(
        &self,
        context: &OclContext,
        device: &OpenClDevice,
        source: &str,
    ) -> MandelResult<OclProgram> {
        // The build error text carries the compiler log.
        OclProgram::builder()
            .src(source)
            .devices(device.device)
            .build(context)
            .map_err(|e| MandelError::compile(e.to_string()))
    }

    fn create_kernel(&self, program: &OclProgram, entry_point: &str) -> MandelResult<OclKernel> {
        // Arguments are declared with placeholders and bound later through `set_arg`.
        OclKernel::builder()
            .program(program)
            .name(entry_point)
            .arg(None::<&OclBuffer<u8>>)
            .arg(0i32)
            .arg(0i32)
            .arg(0f32)
            .arg(0f32)
            .arg(0f32)
            .build()
            .map_err(|e| MandelError::kernel_lookup(format!("{entry_point}: {e}")))
    }

    fn create_queue(&self, context: &OclContext, device: &OpenClDevice) -> MandelResult<OclQueue> {
        OclQueue::new(context, device.device, None)
            .map_err(|e| MandelError::queue_creation(e.to_string()))
    }

    fn create_buffer(
        &self,
        _context: &OclContext,
        queue: &OclQueue,
        len: usize,
    ) -> MandelResult<OclBuffer<u8>> {
        OclBuffer::<u8>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_WRITE_ONLY)
            .len(len)
            .build()
            .map_err(|e| MandelError::buffer_allocation(e.to_string()))
    }

    fn set_arg(
        &self,
        kernel: &OclKernel,
        index: u32,
        arg: KernelArg<'_, OclBuffer<u8>>,
    ) -> MandelResult<()> {
        let res = match arg {
            KernelArg::Buffer(buffer) => kernel.set_arg(index, buffer),
            KernelArg::Int(v) => kernel.set_arg(index, &v),
            KernelArg::Float(v) => kernel.set_arg(index, &v),
        };
        res.map_err(|e| MandelError::argument_binding(e.to_string()))
    }

    fn max_work_group_size(
        &self,
        kernel: &OclKernel,
        device: &OpenClDevice,
    ) -> MandelResult<usize> {
        match kernel.wg_info(device.device, KernelWorkGroupInfo::WorkGroupSize) {
            Ok(KernelWorkGroupInfoResult::WorkGroupSize(n)) => Ok(n),
            Ok(other) => Err(MandelError::work_group_query(format!(
                "unexpected query result: {other:?}"
            ))),
            Err(e) => Err(MandelError::work_group_query(e.to_string())),
        }
    }

    fn enqueue(
        &self,
        queue: &OclQueue,
        kernel: &OclKernel,
        dispatch: Dispatch,
    ) -> MandelResult<()> {
        let cmd = kernel
            .cmd()
            .queue(queue)
            .global_work_size(dispatch.global)
            .local_work_size(dispatch.local);
        // SAFETY: every argument was bound before dispatch and the kernel masks padded items.
        unsafe { cmd.enq() }.map_err(|e| MandelError::dispatch(e.to_string()))
    }

    fn finish(&self, queue: &OclQueue) -> MandelResult<()> {
        queue
            .finish()
            .map_err(|e| MandelError::dispatch(e.to_string()))
    }

    fn read_buffer(
        &self,
        queue: &OclQueue,
        buffer: &OclBuffer<u8>,
        out: &mut [u8],
    ) -> MandelResult<()> {
        buffer
            .read(out)
            .queue(queue)
            .enq()
            .map_err(|e| MandelError::readback(e.to_string()))
    }

    fn device_field(&self, device: &OpenClDevice, field: DeviceField) -> MandelResult<InfoValue> {
        let info = device_info(field);
        let result = device
            .device
            .info(info)
            .map_err(|e| MandelError::validation(format!("{field:?}: {e}")))?;
        convert_device_info(result)
            .ok_or_else(|| MandelError::validation(format!("{field:?}: unexpected result type")))
    }

    fn platform_field(
        &self,
        device: &OpenClDevice,
        field: PlatformField,
    ) -> MandelResult<InfoValue> {
        let info = match field {
            PlatformField::Profile => PlatformInfo::Profile,
            PlatformField::Version => PlatformInfo::Version,
            PlatformField::Name => PlatformInfo::Name,
            PlatformField::Vendor => PlatformInfo::Vendor,
            PlatformField::Extensions => PlatformInfo::Extensions,
        };
        device
            .platform
            .info(info)
            .map(|v| InfoValue::Text(v.to_string()))
            .map_err(|e| MandelError::validation(format!("{field:?}: {e}")))
    }
}

fn device_info(field: DeviceField) -> DeviceInfo {
    match field {
        DeviceField::Type => DeviceInfo::Type,
        DeviceField::VendorId => DeviceInfo::VendorId,
        DeviceField::MaxComputeUnits => DeviceInfo::MaxComputeUnits,
        DeviceField::MaxWorkItemDimensions => DeviceInfo::MaxWorkItemDimensions,
        DeviceField::MaxWorkItemSizes => DeviceInfo::MaxWorkItemSizes,
        DeviceField::MaxWorkGroupSize => DeviceInfo::MaxWorkGroupSize,
        DeviceField::GlobalMemSize => DeviceInfo::GlobalMemSize,
        DeviceField::LocalMemSize => DeviceInfo::LocalMemSize,
        DeviceField::GlobalMemCacheSize => DeviceInfo::GlobalMemCacheSize,
        DeviceField::MaxConstantBufferSize => DeviceInfo::MaxConstantBufferSize,
        DeviceField::MaxMemAllocSize => DeviceInfo::MaxMemAllocSize,
        DeviceField::SingleFpConfig => DeviceInfo::SingleFpConfig,
        DeviceField::DoubleFpConfig => DeviceInfo::DoubleFpConfig,
        DeviceField::ImageSupport => DeviceInfo::ImageSupport,
        DeviceField::ErrorCorrectionSupport => DeviceInfo::ErrorCorrectionSupport,
        DeviceField::EndianLittle => DeviceInfo::EndianLittle,
        DeviceField::Available => DeviceInfo::Available,
        DeviceField::CompilerAvailable => DeviceInfo::CompilerAvailable,
        DeviceField::Name => DeviceInfo::Name,
        DeviceField::Vendor => DeviceInfo::Vendor,
        DeviceField::DriverVersion => DeviceInfo::DriverVersion,
        DeviceField::Profile => DeviceInfo::Profile,
        DeviceField::Version => DeviceInfo::Version,
        DeviceField::Extensions => DeviceInfo::Extensions,
    }
}

fn convert_device_info(result: DeviceInfoResult) -> Option<InfoValue> {
    use DeviceInfoResult as R;
    let value = match result {
        R::Type(t) => InfoValue::Bitfield(t.bits()),
        R::SingleFpConfig(c) | R::DoubleFpConfig(c) => InfoValue::Bitfield(c.bits()),
        R::VendorId(n) | R::MaxComputeUnits(n) | R::MaxWorkItemDimensions(n) => {
            InfoValue::UInt(u64::from(n))
        }
        R::MaxWorkGroupSize(n) => InfoValue::UInt(n as u64),
        R::GlobalMemSize(n)
        | R::LocalMemSize(n)
        | R::GlobalMemCacheSize(n)
        | R::MaxConstantBufferSize(n)
        | R::MaxMemAllocSize(n) => InfoValue::UInt(n),
        R::MaxWorkItemSizes(sizes) => {
            InfoValue::UIntList(sizes.into_iter().map(|s| s as u64).collect())
        }
        R::ImageSupport(b)
        | R::ErrorCorrectionSupport(b)
        | R::EndianLittle(b)
        | R::Available(b)
        | R::CompilerAvailable(b) => InfoValue::Bool(b),
        R::Name(s) | R::Vendor(s) | R::DriverVersion(s) | R::Profile(s) | R::Extensions(s) => {
            InfoValue::Text(s)
        }
        R::Version(v) => InfoValue::Text(v.to_string()),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
#[path = "../../tests/unit/compute/opencl.rs"]
mod tests;
