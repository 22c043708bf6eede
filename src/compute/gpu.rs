//! wgpu compute backend running the WGSL port of the kernel.
//!
//! WGSL has no byte-addressed storage, so the device buffer holds one `u32` per pixel and is
//! narrowed to bytes on readback. Scalar arguments are packed into a uniform block.

use std::cell::{Cell, RefCell};
use std::sync::mpsc;

use crate::caps::fields::{
    DEVICE_TYPE_ACCELERATOR, DEVICE_TYPE_CPU, DEVICE_TYPE_GPU, DeviceField,
    FP_INF_NAN, FP_ROUND_TO_NEAREST, InfoValue, PlatformField,
};
use crate::compute::api::{ComputeApi, Dispatch, KernelArg};
use crate::foundation::error::{MandelError, MandelResult};

const PARAMS_SIZE: u64 = 32;
const WORKGROUP_SIZE_OVERRIDE: &str = "WORKGROUP_SIZE";
const DEFAULT_WORKGROUP_SIZE: usize = 64;

/// Compute API backed by wgpu adapters.
pub struct GpuApi {
    instance: wgpu::Instance,
}

impl Default for GpuApi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GpuApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuApi").finish_non_exhaustive()
    }
}

impl GpuApi {
    /// Create an instance over every backend wgpu was built with.
    pub fn new() -> Self {
        Self {
            instance: wgpu::Instance::new(&wgpu::InstanceDescriptor::default()),
        }
    }
}

/// One wgpu adapter.
#[derive(Clone, Debug)]
pub struct GpuDevice {
    adapter: wgpu::Adapter,
}

/// Logical device and its submission queue.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Validated shader module.
pub struct GpuProgram {
    device: wgpu::Device,
    module: wgpu::ShaderModule,
}

#[derive(Clone, Copy, Debug, Default)]
struct Params {
    width: Option<i32>,
    height: Option<i32>,
    center_x: Option<f32>,
    center_y: Option<f32>,
    unit: Option<f32>,
}

/// Entry point plus its bind layout, lazily specialized per work-group size.
pub struct GpuKernel {
    device: wgpu::Device,
    module: wgpu::ShaderModule,
    entry_point: String,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: RefCell<Vec<(usize, wgpu::ComputePipeline)>>,
    output: RefCell<Option<wgpu::Buffer>>,
    params: Cell<Params>,
}

/// Submission queue; `finish` waits for everything submitted so far.
pub struct GpuQueue {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Storage buffer of one `u32` per byte of logical length.
pub struct GpuBuffer {
    storage: wgpu::Buffer,
    len: usize,
}

impl GpuKernel {
    fn pipeline(&self, local: usize) -> MandelResult<wgpu::ComputePipeline> {
        if let Some((_, p)) = self.pipelines.borrow().iter().find(|(l, _)| *l == local) {
            return Ok(p.clone());
        }
        let constants = [(WORKGROUP_SIZE_OVERRIDE, local as f64)];
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("clmandelbrot.pipeline"),
                layout: Some(&self.pipeline_layout),
                module: &self.module,
                entry_point: Some(self.entry_point.as_str()),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: false,
                },
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(MandelError::kernel_lookup(format!("{}: {err}", self.entry_point)));
        }
        self.pipelines.borrow_mut().push((local, pipeline.clone()));
        Ok(pipeline)
    }
}

impl ComputeApi for GpuApi {
    type Device = GpuDevice;
    type Context = GpuContext;
    type Program = GpuProgram;
    type Kernel = GpuKernel;
    type Queue = GpuQueue;
    type Buffer = GpuBuffer;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn devices(&self, cap: usize) -> MandelResult<Vec<GpuDevice>> {
        Ok(self
            .instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .take(cap)
            .map(|adapter| GpuDevice { adapter })
            .collect())
    }

    fn device_name(&self, device: &GpuDevice) -> String {
        let info = device.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    fn create_context(&self, device: &GpuDevice) -> MandelResult<GpuContext> {
        let (device, queue) =
            pollster::block_on(device.adapter.request_device(&wgpu::DeviceDescriptor {
                label: Some("clmandelbrot"),
                required_features: wgpu::Features::empty(),
                required_limits: device.adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            }))
            .map_err(|e| {
                MandelError::context_creation(format!("wgpu request_device failed: {e}"))
            })?;
        Ok(GpuContext { device, queue })
    }

    fn build_program(
        &self,
        context: &GpuContext,
        _device: &GpuDevice,
        source: &str,
    ) -> MandelResult<GpuProgram> {
        context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let module = context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("clmandelbrot.kernel"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(context.device.pop_error_scope()) {
            return Err(MandelError::compile(err.to_string()));
        }
        Ok(GpuProgram {
            device: context.device.clone(),
            module,
        })
    }

    fn create_kernel(&self, program: &GpuProgram, entry_point: &str) -> MandelResult<GpuKernel> {
        let device = &program.device;
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("clmandelbrot.bind_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(PARAMS_SIZE),
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("clmandelbrot.pipeline_layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let kernel = GpuKernel {
            device: device.clone(),
            module: program.module.clone(),
            entry_point: entry_point.to_string(),
            bind_layout,
            pipeline_layout,
            pipelines: RefCell::new(Vec::new()),
            output: RefCell::new(None),
            params: Cell::new(Params::default()),
        };
        // Building the default specialization proves the entry point exists.
        kernel.pipeline(DEFAULT_WORKGROUP_SIZE)?;
        Ok(kernel)
    }

    fn create_queue(&self, context: &GpuContext, _device: &GpuDevice) -> MandelResult<GpuQueue> {
        Ok(GpuQueue {
            device: context.device.clone(),
            queue: context.queue.clone(),
        })
    }

    fn create_buffer(
        &self,
        context: &GpuContext,
        _queue: &GpuQueue,
        len: usize,
    ) -> MandelResult<GpuBuffer> {
        let limits = context.device.limits();
        let size = (len as u64)
            .checked_mul(4)
            .ok_or_else(|| MandelError::buffer_allocation("buffer size overflow"))?;
        if size > u64::from(limits.max_storage_buffer_binding_size) || size > limits.max_buffer_size
        {
            return Err(MandelError::buffer_allocation(format!(
                "{size} bytes exceeds the device storage binding limit of {}",
                limits.max_storage_buffer_binding_size
            )));
        }
        let storage = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clmandelbrot.pixels"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(GpuBuffer { storage, len })
    }

    fn set_arg(
        &self,
        kernel: &GpuKernel,
        index: u32,
        arg: KernelArg<'_, GpuBuffer>,
    ) -> MandelResult<()> {
        let mut p = kernel.params.get();
        match (index, arg) {
            (0, KernelArg::Buffer(b)) => {
                *kernel.output.borrow_mut() = Some(b.storage.clone());
                return Ok(());
            }
            (1, KernelArg::Int(v)) => p.width = Some(v),
            (2, KernelArg::Int(v)) => p.height = Some(v),
            (3, KernelArg::Float(v)) => p.center_x = Some(v),
            (4, KernelArg::Float(v)) => p.center_y = Some(v),
            (5, KernelArg::Float(v)) => p.unit = Some(v),
            (i, a) => {
                return Err(MandelError::argument_binding(format!(
                    "argument {i} cannot take a {}",
                    a.type_name()
                )));
            }
        }
        kernel.params.set(p);
        Ok(())
    }

    fn max_work_group_size(&self, kernel: &GpuKernel, _device: &GpuDevice) -> MandelResult<usize> {
        let limits = kernel.device.limits();
        Ok(limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x) as usize)
    }

    fn enqueue(
        &self,
        queue: &GpuQueue,
        kernel: &GpuKernel,
        dispatch: Dispatch,
    ) -> MandelResult<()> {
        let Params {
            width: Some(width),
            height: Some(height),
            center_x: Some(center_x),
            center_y: Some(center_y),
            unit: Some(unit),
        } = kernel.params.get()
        else {
            return Err(MandelError::dispatch("kernel arguments not fully bound"));
        };
        let output = kernel
            .output
            .borrow()
            .clone()
            .ok_or_else(|| MandelError::dispatch("output buffer not bound"))?;

        let max_per_dim = kernel.device.limits().max_compute_workgroups_per_dimension as usize;
        let groups = dispatch.groups();
        let (groups_x, groups_y) = if groups <= max_per_dim {
            (groups, 1)
        } else {
            (max_per_dim, groups.div_ceil(max_per_dim))
        };
        if groups_y > max_per_dim {
            return Err(MandelError::dispatch(format!(
                "{groups} work groups exceed the device dispatch limit"
            )));
        }
        let row_pitch = u32::try_from(groups_x * dispatch.local)
            .map_err(|_| MandelError::dispatch("dispatch row pitch overflows u32"))?;

        let pipeline = kernel.pipeline(dispatch.local).map_err(|e| {
            MandelError::dispatch(format!("work-group size {}: {e}", dispatch.local))
        })?;

        let mut bytes = Vec::with_capacity(PARAMS_SIZE as usize);
        bytes.extend_from_slice(&(width as u32).to_le_bytes());
        bytes.extend_from_slice(&(height as u32).to_le_bytes());
        bytes.extend_from_slice(&center_x.to_le_bytes());
        bytes.extend_from_slice(&center_y.to_le_bytes());
        bytes.extend_from_slice(&unit.to_le_bytes());
        bytes.extend_from_slice(&row_pitch.to_le_bytes());
        bytes.resize(PARAMS_SIZE as usize, 0);

        let uniform = queue.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clmandelbrot.params"),
            size: PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.queue.write_buffer(&uniform, 0, &bytes);

        let bind_group = queue.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clmandelbrot.bind_group"),
            layout: &kernel.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });

        let mut encoder = queue
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clmandelbrot.dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("clmandelbrot.pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x as u32, groups_y as u32, 1);
        }
        queue.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn finish(&self, queue: &GpuQueue) -> MandelResult<()> {
        queue
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| MandelError::dispatch(format!("wgpu poll failed: {e:?}")))
    }

    fn read_buffer(
        &self,
        queue: &GpuQueue,
        buffer: &GpuBuffer,
        out: &mut [u8],
    ) -> MandelResult<()> {
        if out.len() != buffer.len {
            return Err(MandelError::readback(format!(
                "buffer holds {} pixels, destination {}",
                buffer.len,
                out.len()
            )));
        }
        let size = buffer.storage.size();
        let staging = queue.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clmandelbrot.readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = queue
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clmandelbrot.readback"),
            });
        encoder.copy_buffer_to_buffer(&buffer.storage, 0, &staging, 0, size);
        queue.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        queue
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| MandelError::readback(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| MandelError::readback("readback channel closed"))?
            .map_err(|e| MandelError::readback(format!("readback map failed: {e:?}")))?;

        {
            let mapped = slice.get_mapped_range();
            for (dst, word) in out.iter_mut().zip(mapped.chunks_exact(4)) {
                let v = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                *dst = v.min(255) as u8;
            }
        }
        staging.unmap();
        Ok(())
    }

    fn device_field(&self, device: &GpuDevice, field: DeviceField) -> MandelResult<InfoValue> {
        let info = device.adapter.get_info();
        let limits = device.adapter.limits();
        let fp = FP_INF_NAN | FP_ROUND_TO_NEAREST;
        let value = match field {
            DeviceField::Type => InfoValue::Bitfield(match info.device_type {
                wgpu::DeviceType::DiscreteGpu
                | wgpu::DeviceType::IntegratedGpu
                | wgpu::DeviceType::VirtualGpu => DEVICE_TYPE_GPU,
                wgpu::DeviceType::Cpu => DEVICE_TYPE_CPU,
                wgpu::DeviceType::Other => DEVICE_TYPE_ACCELERATOR,
            }),
            DeviceField::VendorId => InfoValue::UInt(u64::from(info.vendor)),
            DeviceField::MaxWorkItemDimensions => InfoValue::UInt(3),
            DeviceField::MaxWorkItemSizes => InfoValue::UIntList(vec![
                u64::from(limits.max_compute_workgroup_size_x),
                u64::from(limits.max_compute_workgroup_size_y),
                u64::from(limits.max_compute_workgroup_size_z),
            ]),
            DeviceField::MaxWorkGroupSize => {
                InfoValue::UInt(u64::from(limits.max_compute_invocations_per_workgroup))
            }
            DeviceField::LocalMemSize => {
                InfoValue::UInt(u64::from(limits.max_compute_workgroup_storage_size))
            }
            DeviceField::MaxConstantBufferSize => {
                InfoValue::UInt(u64::from(limits.max_uniform_buffer_binding_size))
            }
            DeviceField::MaxMemAllocSize => InfoValue::UInt(limits.max_buffer_size),
            DeviceField::SingleFpConfig => InfoValue::Bitfield(fp),
            DeviceField::DoubleFpConfig => {
                let f64_ok = device.adapter.features().contains(wgpu::Features::SHADER_F64);
                InfoValue::Bitfield(if f64_ok { fp } else { 0 })
            }
            DeviceField::ImageSupport
            | DeviceField::EndianLittle
            | DeviceField::Available
            | DeviceField::CompilerAvailable => InfoValue::Bool(true),
            DeviceField::Name => InfoValue::Text(info.name),
            DeviceField::Vendor => InfoValue::Text(vendor_name(info.vendor)),
            DeviceField::DriverVersion => InfoValue::Text(info.driver_info),
            DeviceField::Profile => InfoValue::Text("WebGPU".to_string()),
            DeviceField::Version => InfoValue::Text(format!("{:?} {}", info.backend, info.driver)),
            DeviceField::Extensions => InfoValue::Text(format!("{:?}", device.adapter.features())),
            DeviceField::MaxComputeUnits
            | DeviceField::GlobalMemSize
            | DeviceField::GlobalMemCacheSize
            | DeviceField::ErrorCorrectionSupport => {
                return Err(MandelError::validation(format!(
                    "{field:?} is not exposed by wgpu"
                )));
            }
        };
        Ok(value)
    }

    fn platform_field(&self, device: &GpuDevice, field: PlatformField) -> MandelResult<InfoValue> {
        let info = device.adapter.get_info();
        let text = match field {
            PlatformField::Profile => "WebGPU".to_string(),
            PlatformField::Version => format!("wgpu {:?}", info.backend),
            PlatformField::Name => format!("{:?}", info.backend),
            PlatformField::Vendor => "wgpu".to_string(),
            PlatformField::Extensions => String::new(),
        };
        Ok(InfoValue::Text(text))
    }
}

fn vendor_name(id: u32) -> String {
    match id {
        0x10de => "NVIDIA".to_string(),
        0x1002 | 0x1022 => "AMD".to_string(),
        0x8086 => "Intel".to_string(),
        0x106b => "Apple".to_string(),
        0x13b5 => "ARM".to_string(),
        0x5143 => "Qualcomm".to_string(),
        other => format!("{other:#06x}"),
    }
}
