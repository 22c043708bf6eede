//! Recording `ComputeApi` double shared by the pipeline unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::caps::fields::{DeviceField, InfoValue, PlatformField};
use crate::compute::api::{ComputeApi, Dispatch, KernelArg};
use crate::compute::escape::{escape_intensity, pixel_coordinate};
use crate::foundation::error::{MandelError, MandelResult, Stage};

/// Every stage a `MockApi` call can fail at, in pipeline order, with the method serving it.
pub(crate) const STAGE_METHODS: &[(Stage, &str)] = &[
    (Stage::DeviceEnumeration, "devices"),
    (Stage::ContextCreation, "create_context"),
    (Stage::Compilation, "build_program"),
    (Stage::KernelLookup, "create_kernel"),
    (Stage::QueueCreation, "create_queue"),
    (Stage::BufferAllocation, "create_buffer"),
    (Stage::ArgumentBinding, "set_arg"),
    (Stage::WorkGroupQuery, "max_work_group_size"),
    (Stage::Dispatch, "enqueue"),
    (Stage::HostAllocation, "alloc_host"),
    (Stage::Readback, "read_buffer"),
];

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub calls: Vec<&'static str>,
    pub acquired: Vec<&'static str>,
    pub released: Vec<&'static str>,
}

impl Ledger {
    pub fn balanced(&self) -> bool {
        let mut a = self.acquired.clone();
        let mut r = self.released.clone();
        a.sort_unstable();
        r.sort_unstable();
        a == r
    }

    /// Every handle was released, newest first.
    pub fn released_in_reverse(&self) -> bool {
        self.released.iter().eq(self.acquired.iter().rev())
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls.iter().any(|c| *c == method)
    }
}

type SharedLedger = Rc<RefCell<Ledger>>;

/// One native handle; records its release on drop.
#[derive(Debug)]
pub(crate) struct Handle {
    kind: &'static str,
    ledger: SharedLedger,
}

impl Handle {
    fn acquire(kind: &'static str, ledger: &SharedLedger) -> Self {
        ledger.borrow_mut().acquired.push(kind);
        Self {
            kind,
            ledger: Rc::clone(ledger),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.ledger.borrow_mut().released.push(self.kind);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MockDevice {
    pub index: usize,
    _handle: Rc<Handle>,
}

pub(crate) struct MockBuffer {
    _handle: Handle,
    data: Rc<RefCell<Vec<u8>>>,
}

#[derive(Clone, Copy, Debug)]
enum Scalar {
    Int(i32),
    Float(f32),
}

pub(crate) struct MockKernel {
    _handle: Handle,
    out: RefCell<Option<Rc<RefCell<Vec<u8>>>>>,
    scalars: RefCell<[Option<Scalar>; 5]>,
}

pub(crate) struct MockApi {
    ledger: SharedLedger,
    pub device_count: usize,
    pub fail_at: Option<Stage>,
    pub fail_finish: bool,
    pub max_local: usize,
    pub last_dispatch: RefCell<Option<Dispatch>>,
}

impl MockApi {
    pub fn new(device_count: usize) -> Self {
        Self {
            ledger: SharedLedger::default(),
            device_count,
            fail_at: None,
            fail_finish: false,
            max_local: 4,
            last_dispatch: RefCell::new(None),
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::new(2)
        }
    }

    /// Two devices; draining the queue fails after a successful enqueue.
    pub fn failing_finish() -> Self {
        Self {
            fail_finish: true,
            ..Self::new(2)
        }
    }

    pub fn ledger(&self) -> std::cell::Ref<'_, Ledger> {
        self.ledger.borrow()
    }

    fn enter(&self, method: &'static str, stage: Stage) -> MandelResult<()> {
        self.ledger.borrow_mut().calls.push(method);
        if self.fail_at == Some(stage) {
            // Untyped on purpose: the pipeline must attribute it to the stage itself.
            return Err(MandelError::Other(anyhow::anyhow!("injected {method} failure")));
        }
        Ok(())
    }
}

impl ComputeApi for MockApi {
    type Device = MockDevice;
    type Context = Handle;
    type Program = Handle;
    type Kernel = MockKernel;
    type Queue = Handle;
    type Buffer = MockBuffer;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn devices(&self, cap: usize) -> MandelResult<Vec<MockDevice>> {
        self.enter("devices", Stage::DeviceEnumeration)?;
        Ok((0..self.device_count.min(cap))
            .map(|index| MockDevice {
                index,
                _handle: Rc::new(Handle::acquire("device", &self.ledger)),
            })
            .collect())
    }

    fn device_name(&self, device: &MockDevice) -> String {
        format!("mock device {}", device.index)
    }

    fn create_context(&self, _device: &MockDevice) -> MandelResult<Handle> {
        self.enter("create_context", Stage::ContextCreation)?;
        Ok(Handle::acquire("context", &self.ledger))
    }

    fn build_program(
        &self,
        _context: &Handle,
        _device: &MockDevice,
        _source: &str,
    ) -> MandelResult<Handle> {
        self.enter("build_program", Stage::Compilation)?;
        Ok(Handle::acquire("program", &self.ledger))
    }

    fn create_kernel(&self, _program: &Handle, _entry_point: &str) -> MandelResult<MockKernel> {
        self.enter("create_kernel", Stage::KernelLookup)?;
        Ok(MockKernel {
            _handle: Handle::acquire("kernel", &self.ledger),
            out: RefCell::new(None),
            scalars: RefCell::new([None; 5]),
        })
    }

    fn create_queue(&self, _context: &Handle, _device: &MockDevice) -> MandelResult<Handle> {
        self.enter("create_queue", Stage::QueueCreation)?;
        Ok(Handle::acquire("queue", &self.ledger))
    }

    fn create_buffer(
        &self,
        _context: &Handle,
        _queue: &Handle,
        len: usize,
    ) -> MandelResult<MockBuffer> {
        self.enter("create_buffer", Stage::BufferAllocation)?;
        Ok(MockBuffer {
            _handle: Handle::acquire("buffer", &self.ledger),
            data: Rc::new(RefCell::new(vec![0; len])),
        })
    }

    fn set_arg(
        &self,
        kernel: &MockKernel,
        index: u32,
        arg: KernelArg<'_, MockBuffer>,
    ) -> MandelResult<()> {
        self.enter("set_arg", Stage::ArgumentBinding)?;
        match (index, arg) {
            (0, KernelArg::Buffer(b)) => *kernel.out.borrow_mut() = Some(Rc::clone(&b.data)),
            (1..=2, KernelArg::Int(v)) => {
                kernel.scalars.borrow_mut()[index as usize - 1] = Some(Scalar::Int(v))
            }
            (3..=5, KernelArg::Float(v)) => {
                kernel.scalars.borrow_mut()[index as usize - 1] = Some(Scalar::Float(v))
            }
            (i, a) => {
                return Err(MandelError::argument_binding(format!(
                    "unexpected {} at {i}",
                    a.type_name()
                )));
            }
        }
        Ok(())
    }

    fn max_work_group_size(
        &self,
        _kernel: &MockKernel,
        _device: &MockDevice,
    ) -> MandelResult<usize> {
        self.enter("max_work_group_size", Stage::WorkGroupQuery)?;
        Ok(self.max_local)
    }

    fn enqueue(
        &self,
        _queue: &Handle,
        kernel: &MockKernel,
        dispatch: Dispatch,
    ) -> MandelResult<()> {
        self.enter("enqueue", Stage::Dispatch)?;
        *self.last_dispatch.borrow_mut() = Some(dispatch);

        let out = kernel
            .out
            .borrow()
            .clone()
            .ok_or_else(|| MandelError::dispatch("no buffer"))?;
        let s = *kernel.scalars.borrow();
        let (
            [Some(Scalar::Int(w)), Some(Scalar::Int(h))],
            [Some(Scalar::Float(cx)), Some(Scalar::Float(cy)), Some(Scalar::Float(unit))],
        ) = ([s[0], s[1]], [s[2], s[3], s[4]])
        else {
            return Err(MandelError::dispatch("arguments not bound"));
        };
        let (w, h) = (w as u32, h as u32);
        let mut data = out.borrow_mut();
        for gid in 0..dispatch.global.min(data.len()) {
            let (cr, ci) = pixel_coordinate(gid as u32 % w, gid as u32 / w, w, h, (cx, cy), unit);
            data[gid] = escape_intensity(cr, ci);
        }
        Ok(())
    }

    fn finish(&self, _queue: &Handle) -> MandelResult<()> {
        self.ledger.borrow_mut().calls.push("finish");
        if self.fail_finish {
            return Err(MandelError::Other(anyhow::anyhow!("injected finish failure")));
        }
        Ok(())
    }

    fn alloc_host(&self, len: usize) -> MandelResult<Vec<u8>> {
        self.enter("alloc_host", Stage::HostAllocation)?;
        Ok(vec![0; len])
    }

    fn read_buffer(
        &self,
        _queue: &Handle,
        buffer: &MockBuffer,
        out: &mut [u8],
    ) -> MandelResult<()> {
        self.enter("read_buffer", Stage::Readback)?;
        out.copy_from_slice(&buffer.data.borrow());
        Ok(())
    }

    fn device_field(&self, device: &MockDevice, field: DeviceField) -> MandelResult<InfoValue> {
        match field {
            DeviceField::Name => Ok(InfoValue::Text(self.device_name(device))),
            DeviceField::MaxWorkGroupSize => Ok(InfoValue::UInt(self.max_local as u64)),
            // Wrong kind on purpose: must surface as null.
            DeviceField::Available => Ok(InfoValue::UInt(1)),
            DeviceField::MaxWorkItemSizes => {
                Ok(InfoValue::UIntList(vec![self.max_local as u64, 1, 1]))
            }
            _ => Err(MandelError::validation(format!("{field:?} not mocked"))),
        }
    }

    fn platform_field(
        &self,
        _device: &MockDevice,
        field: PlatformField,
    ) -> MandelResult<InfoValue> {
        match field {
            PlatformField::Name => Ok(InfoValue::Text("mock platform".to_string())),
            _ => Err(MandelError::validation("not mocked")),
        }
    }
}
