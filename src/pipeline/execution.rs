use crate::compute::api::{ComputeApi, Dispatch, KernelArg};
use crate::foundation::error::{MandelError, MandelResult, Stage};
use crate::foundation::request::{RenderRequest, RowStride};
use crate::pipeline::program::CompiledProgram;

/// Scalar kernel parameters, in binding order after the output buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    /// Image width in pixels.
    pub width: i32,
    /// Image height in pixels.
    pub height: i32,
    /// Real part of the image center.
    pub center_x: f32,
    /// Imaginary part of the image center.
    pub center_y: f32,
    /// Per-pixel step on the complex plane.
    pub unit: f32,
}

impl KernelParams {
    /// Parameters for `request`.
    pub fn from_request(request: &RenderRequest) -> Self {
        let center = request.center();
        // RenderRequest::new keeps both dimensions within i32.
        Self {
            width: request.width() as i32,
            height: request.height() as i32,
            center_x: center.x as f32,
            center_y: center.y as f32,
            unit: request.unit() as f32,
        }
    }
}

/// Host copy of the per-pixel intensity buffer, `width * height` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultField {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ResultField {
    /// Wrap `data`. Fails unless `data.len() == width * height`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MandelResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(MandelError::validation(format!(
                "result field has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image width the field was computed for.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height the field was computed for.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw intensities in kernel order (`gid = x + y * width`).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` for a zero-length field (never produced by the pipeline).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Intensity for pixel `(x, y)` read through `stride`.
    ///
    /// The height stride can index past the field when `height > width`; those reads yield 0.
    pub fn intensity(&self, x: u32, y: u32, stride: RowStride) -> u8 {
        let idx = stride.index(x, y, self.width, self.height);
        self.data.get(idx).copied().unwrap_or(0)
    }

    /// Consume the field and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Dispatch controls applied on top of the queried work-group size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOpts {
    /// Clamp the local size to at most this many work items.
    pub work_group_limit: Option<usize>,
}

/// Outcome of one [`ExecutionContext::execute`] call.
#[derive(Clone, Debug)]
pub struct Execution {
    /// The read-back intensity field.
    pub field: ResultField,
    /// Range that was dispatched.
    pub dispatch: Dispatch,
}

/// Command queue plus output buffer for one render.
///
/// Borrows the compiled program (and through it the context), so it can never outlive them.
/// Fields are declared in reverse acquisition order: the buffer is released before the queue.
pub struct ExecutionContext<'p, A: ComputeApi> {
    buffer: A::Buffer,
    queue: A::Queue,
    api: &'p A,
    program: &'p CompiledProgram<A>,
    device: &'p A::Device,
    width: u32,
    height: u32,
}

impl<'p, A: ComputeApi> ExecutionContext<'p, A> {
    /// Create the command queue and a write-only output buffer of `width * height` bytes.
    #[tracing::instrument(skip(api, program, device), fields(backend = api.name()))]
    pub fn prepare(
        api: &'p A,
        program: &'p CompiledProgram<A>,
        device: &'p A::Device,
        width: u32,
        height: u32,
    ) -> MandelResult<Self> {
        let len = width as usize * height as usize;
        if len == 0 {
            return Err(MandelError::validation("output buffer must not be empty"));
        }

        let queue = api
            .create_queue(program.context(), device)
            .map_err(|e| e.at_stage(Stage::QueueCreation))?;
        let buffer = api
            .create_buffer(program.context(), &queue, len)
            .map_err(|e| e.at_stage(Stage::BufferAllocation))?;

        tracing::debug!(bytes = len, "queue and output buffer ready");
        Ok(Self {
            buffer,
            queue,
            api,
            program,
            device,
            width,
            height,
        })
    }

    /// Output buffer length in bytes.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bind parameters, dispatch one work item per pixel, wait, and read the buffer back.
    ///
    /// Steps run strictly in order and the first failure ends the call: a binding failure
    /// means nothing is dispatched, and a readback failure returns no field at all.
    #[tracing::instrument(skip(self, params), fields(backend = self.api.name()))]
    pub fn execute(&self, params: &KernelParams, opts: DispatchOpts) -> MandelResult<Execution> {
        if params.width < 0
            || params.height < 0
            || params.width as u32 != self.width
            || params.height as u32 != self.height
        {
            return Err(MandelError::validation(format!(
                "kernel parameters {}x{} do not match the {}x{} output buffer",
                params.width, params.height, self.width, self.height
            )));
        }

        let kernel = self.program.kernel();
        self.bind_args(kernel, params)?;

        let max_local = self
            .api
            .max_work_group_size(kernel, self.device)
            .map_err(|e| e.at_stage(Stage::WorkGroupQuery))?;
        if max_local == 0 {
            return Err(MandelError::work_group_query(
                "device reported a zero work-group size",
            ));
        }
        let local = match opts.work_group_limit {
            Some(limit) => max_local.min(limit.max(1)),
            None => max_local,
        };

        let len = self.buffer_len();
        let dispatch = Dispatch::padded(len, local);
        tracing::debug!(
            global = dispatch.global,
            local = dispatch.local,
            pixels = len,
            "dispatching"
        );

        self.api
            .enqueue(&self.queue, kernel, dispatch)
            .map_err(|e| e.at_stage(Stage::Dispatch))?;
        self.api
            .finish(&self.queue)
            .map_err(|e| e.at_stage(Stage::Dispatch))?;

        let mut data = self
            .api
            .alloc_host(len)
            .map_err(|e| e.at_stage(Stage::HostAllocation))?;
        self.api
            .read_buffer(&self.queue, &self.buffer, &mut data)
            .map_err(|e| e.at_stage(Stage::Readback))?;

        Ok(Execution {
            field: ResultField::new(self.width, self.height, data)?,
            dispatch,
        })
    }

    fn bind_args(&self, kernel: &A::Kernel, params: &KernelParams) -> MandelResult<()> {
        let args = [
            KernelArg::Buffer(&self.buffer),
            KernelArg::Int(params.width),
            KernelArg::Int(params.height),
            KernelArg::Float(params.center_x),
            KernelArg::Float(params.center_y),
            KernelArg::Float(params.unit),
        ];
        for (index, arg) in (0u32..).zip(args) {
            let ty = arg.type_name();
            self.api.set_arg(kernel, index, arg).map_err(|e| {
                MandelError::argument_binding(format!("argument {index} ({ty}): {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/execution.rs"]
mod tests;
