//! CPU emulation of the compute API on a rayon thread pool.
//!
//! "Compiling" scans OpenCL C source for kernel declarations and binds each one to a native
//! Rust kernel of the same name and arity. Work groups become rayon chunks. Commands execute
//! when enqueued, so the queue is trivially in order.

use std::sync::{Arc, Mutex, MutexGuard};

use rayon::prelude::*;

use crate::caps::fields::{
    DEVICE_TYPE_CPU, DeviceField, FP_DENORM, FP_FMA, FP_INF_NAN, FP_ROUND_TO_NEAREST, InfoValue,
    PlatformField,
};
use crate::compute::api::{ComputeApi, Dispatch, KernelArg};
use crate::compute::escape::{escape_intensity, pixel_coordinate};
use crate::foundation::error::{MandelError, MandelResult};

const DEVICE_NAME: &str = "host cpu (rayon)";
const VENDOR: &str = "clmandelbrot";
const PROFILE: &str = "FULL_PROFILE";

/// Host backend options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostOpts {
    /// Worker threads; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Reported work-group limit.
    pub max_work_group_size: usize,
}

impl Default for HostOpts {
    fn default() -> Self {
        Self {
            threads: None,
            max_work_group_size: 256,
        }
    }
}

/// Compute API backed by the host CPU.
#[derive(Clone, Debug, Default)]
pub struct HostApi {
    opts: HostOpts,
}

impl HostApi {
    /// Host backend with `opts`.
    pub fn new(opts: HostOpts) -> Self {
        Self { opts }
    }

    fn compute_units(&self) -> usize {
        self.opts
            .threads
            .unwrap_or_else(rayon::current_num_threads)
            .max(1)
    }
}

/// The single host device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostDevice {
    compute_units: usize,
    max_work_group_size: usize,
}

/// Worker pool scoped to one render.
pub struct HostContext {
    pool: Arc<rayon::ThreadPool>,
}

/// Kernel declarations found in a program source.
#[derive(Clone, Debug)]
pub struct HostProgram {
    entries: Vec<EntryDecl>,
}

impl HostProgram {
    /// Names of the declared kernels, in source order.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EntryDecl {
    name: String,
    arity: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParamKind {
    Buffer,
    Int,
    Float,
}

#[derive(Clone, Debug)]
enum BoundArg {
    Buffer(HostBuffer),
    Int(i32),
    Float(f32),
}

impl BoundArg {
    fn kind(&self) -> ParamKind {
        match self {
            BoundArg::Buffer(_) => ParamKind::Buffer,
            BoundArg::Int(_) => ParamKind::Int,
            BoundArg::Float(_) => ParamKind::Float,
        }
    }
}

type NativeFn = fn(&[BoundArg], Dispatch, &rayon::ThreadPool) -> MandelResult<()>;

struct NativeKernel {
    name: &'static str,
    params: &'static [ParamKind],
    run: NativeFn,
}

const NATIVE_KERNELS: &[NativeKernel] = &[NativeKernel {
    name: "Mandelbrot",
    params: &[
        ParamKind::Buffer,
        ParamKind::Int,
        ParamKind::Int,
        ParamKind::Float,
        ParamKind::Float,
        ParamKind::Float,
    ],
    run: mandelbrot,
}];

/// Native kernel bound to a program entry point, plus its argument slots.
pub struct HostKernel {
    native: &'static NativeKernel,
    args: Mutex<Vec<Option<BoundArg>>>,
}

impl std::fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKernel")
            .field("name", &self.native.name)
            .finish_non_exhaustive()
    }
}

/// In-order queue on the context's pool.
pub struct HostQueue {
    pool: Arc<rayon::ThreadPool>,
}

/// Host-resident byte buffer.
#[derive(Clone, Debug)]
pub struct HostBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl HostBuffer {
    fn lock(&self) -> MandelResult<MutexGuard<'_, Vec<u8>>> {
        self.data
            .lock()
            .map_err(|_| MandelError::dispatch("host buffer lock poisoned"))
    }
}

impl ComputeApi for HostApi {
    type Device = HostDevice;
    type Context = HostContext;
    type Program = HostProgram;
    type Kernel = HostKernel;
    type Queue = HostQueue;
    type Buffer = HostBuffer;

    fn name(&self) -> &'static str {
        "host"
    }

    fn devices(&self, cap: usize) -> MandelResult<Vec<HostDevice>> {
        if cap == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![HostDevice {
            compute_units: self.compute_units(),
            max_work_group_size: self.opts.max_work_group_size,
        }])
    }

    fn device_name(&self, _device: &HostDevice) -> String {
        DEVICE_NAME.to_string()
    }

    fn runs_kernel_bodies(&self) -> bool {
        false
    }

    fn create_context(&self, device: &HostDevice) -> MandelResult<HostContext> {
        let pool = build_thread_pool(Some(device.compute_units))?;
        Ok(HostContext {
            pool: Arc::new(pool),
        })
    }

    fn build_program(
        &self,
        _context: &HostContext,
        _device: &HostDevice,
        source: &str,
    ) -> MandelResult<HostProgram> {
        let entries = scan_kernels(source)?;
        tracing::debug!(kernels = entries.len(), "host program scanned");
        Ok(HostProgram { entries })
    }

    fn create_kernel(&self, program: &HostProgram, entry_point: &str) -> MandelResult<HostKernel> {
        let decl = program
            .entries
            .iter()
            .find(|e| e.name == entry_point)
            .ok_or_else(|| MandelError::kernel_lookup(entry_point))?;
        let native = NATIVE_KERNELS
            .iter()
            .find(|k| k.name == entry_point)
            .ok_or_else(|| {
                MandelError::kernel_lookup(format!("{entry_point} (no host implementation)"))
            })?;
        if decl.arity != native.params.len() {
            return Err(MandelError::kernel_lookup(format!(
                "{entry_point} declares {} parameters, host implementation takes {}",
                decl.arity,
                native.params.len()
            )));
        }
        Ok(HostKernel {
            native,
            args: Mutex::new(vec![None; native.params.len()]),
        })
    }

    fn create_queue(&self, context: &HostContext, _device: &HostDevice) -> MandelResult<HostQueue> {
        Ok(HostQueue {
            pool: Arc::clone(&context.pool),
        })
    }

    fn create_buffer(
        &self,
        _context: &HostContext,
        _queue: &HostQueue,
        len: usize,
    ) -> MandelResult<HostBuffer> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| MandelError::buffer_allocation(format!("{len} bytes: {e}")))?;
        data.resize(len, 0);
        Ok(HostBuffer {
            data: Arc::new(Mutex::new(data)),
        })
    }

    fn set_arg(
        &self,
        kernel: &HostKernel,
        index: u32,
        arg: KernelArg<'_, HostBuffer>,
    ) -> MandelResult<()> {
        let bound = match arg {
            KernelArg::Buffer(b) => BoundArg::Buffer(b.clone()),
            KernelArg::Int(v) => BoundArg::Int(v),
            KernelArg::Float(v) => BoundArg::Float(v),
        };
        let expected = kernel
            .native
            .params
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                MandelError::argument_binding(format!(
                    "{} has no argument {index}",
                    kernel.native.name
                ))
            })?;
        if bound.kind() != expected {
            return Err(MandelError::argument_binding(format!(
                "argument {index} expects {expected:?}, got {:?}",
                bound.kind()
            )));
        }

        let mut args = kernel
            .args
            .lock()
            .map_err(|_| MandelError::argument_binding("kernel argument lock poisoned"))?;
        args[index as usize] = Some(bound);
        Ok(())
    }

    fn max_work_group_size(
        &self,
        _kernel: &HostKernel,
        device: &HostDevice,
    ) -> MandelResult<usize> {
        Ok(device.max_work_group_size)
    }

    fn enqueue(
        &self,
        queue: &HostQueue,
        kernel: &HostKernel,
        dispatch: Dispatch,
    ) -> MandelResult<()> {
        if dispatch.local == 0 || dispatch.global % dispatch.local != 0 {
            return Err(MandelError::dispatch(format!(
                "global size {} is not a multiple of local size {}",
                dispatch.global, dispatch.local
            )));
        }
        let args = {
            let slots = kernel
                .args
                .lock()
                .map_err(|_| MandelError::dispatch("kernel argument lock poisoned"))?;
            slots
                .iter()
                .enumerate()
                .map(|(i, slot)| {
                    slot.clone().ok_or_else(|| {
                        MandelError::dispatch(format!(
                            "argument {i} of {} not set",
                            kernel.native.name
                        ))
                    })
                })
                .collect::<MandelResult<Vec<_>>>()?
        };
        (kernel.native.run)(&args, dispatch, &queue.pool)
    }

    fn finish(&self, _queue: &HostQueue) -> MandelResult<()> {
        Ok(())
    }

    fn read_buffer(
        &self,
        _queue: &HostQueue,
        buffer: &HostBuffer,
        out: &mut [u8],
    ) -> MandelResult<()> {
        let data = buffer
            .data
            .lock()
            .map_err(|_| MandelError::readback("host buffer lock poisoned"))?;
        if data.len() != out.len() {
            return Err(MandelError::readback(format!(
                "buffer holds {} bytes, destination {}",
                data.len(),
                out.len()
            )));
        }
        out.copy_from_slice(&data);
        Ok(())
    }

    fn device_field(&self, device: &HostDevice, field: DeviceField) -> MandelResult<InfoValue> {
        let fp = FP_DENORM | FP_INF_NAN | FP_ROUND_TO_NEAREST | FP_FMA;
        let value = match field {
            DeviceField::Type => InfoValue::Bitfield(DEVICE_TYPE_CPU),
            DeviceField::VendorId => InfoValue::UInt(0),
            DeviceField::MaxComputeUnits => InfoValue::UInt(device.compute_units as u64),
            DeviceField::MaxWorkItemDimensions => InfoValue::UInt(1),
            DeviceField::MaxWorkItemSizes => {
                InfoValue::UIntList(vec![device.max_work_group_size as u64])
            }
            DeviceField::MaxWorkGroupSize => InfoValue::UInt(device.max_work_group_size as u64),
            DeviceField::LocalMemSize => InfoValue::UInt(0),
            DeviceField::MaxMemAllocSize => InfoValue::UInt(isize::MAX as u64),
            DeviceField::SingleFpConfig | DeviceField::DoubleFpConfig => InfoValue::Bitfield(fp),
            DeviceField::ImageSupport | DeviceField::ErrorCorrectionSupport => {
                InfoValue::Bool(false)
            }
            DeviceField::EndianLittle => InfoValue::Bool(cfg!(target_endian = "little")),
            DeviceField::Available | DeviceField::CompilerAvailable => InfoValue::Bool(true),
            DeviceField::Name => InfoValue::Text(DEVICE_NAME.to_string()),
            DeviceField::Vendor => InfoValue::Text(VENDOR.to_string()),
            DeviceField::DriverVersion => InfoValue::Text(env!("CARGO_PKG_VERSION").to_string()),
            DeviceField::Profile => InfoValue::Text(PROFILE.to_string()),
            DeviceField::Version => InfoValue::Text("host emulation 1.0".to_string()),
            DeviceField::Extensions => InfoValue::Text(String::new()),
            DeviceField::GlobalMemSize
            | DeviceField::GlobalMemCacheSize
            | DeviceField::MaxConstantBufferSize => {
                return Err(MandelError::validation(format!(
                    "{field:?} is not reported by the host backend"
                )));
            }
        };
        Ok(value)
    }

    fn platform_field(
        &self,
        _device: &HostDevice,
        field: PlatformField,
    ) -> MandelResult<InfoValue> {
        let text = match field {
            PlatformField::Profile => PROFILE.to_string(),
            PlatformField::Version => format!("clmandelbrot host {}", env!("CARGO_PKG_VERSION")),
            PlatformField::Name => "clmandelbrot host".to_string(),
            PlatformField::Vendor => VENDOR.to_string(),
            PlatformField::Extensions => String::new(),
        };
        Ok(InfoValue::Text(text))
    }
}

/// Build the rayon pool a host context runs on.
pub fn build_thread_pool(threads: Option<usize>) -> MandelResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder.build().map_err(|e| {
        MandelError::context_creation(format!("failed to build rayon thread pool: {e}"))
    })
}

fn mandelbrot(args: &[BoundArg], dispatch: Dispatch, pool: &rayon::ThreadPool) -> MandelResult<()> {
    let [
        BoundArg::Buffer(out),
        BoundArg::Int(width),
        BoundArg::Int(height),
        BoundArg::Float(cx),
        BoundArg::Float(cy),
        BoundArg::Float(unit),
    ] = args
    else {
        return Err(MandelError::dispatch("Mandelbrot called with mismatched arguments"));
    };
    if *width <= 0 || *height <= 0 {
        return Err(MandelError::dispatch(format!(
            "invalid image size {width}x{height}"
        )));
    }
    let (width, height) = (*width as u32, *height as u32);
    let total = width as usize * height as usize;

    let mut data = out.lock()?;
    if data.len() < total {
        return Err(MandelError::dispatch(format!(
            "output buffer holds {} bytes, kernel writes {total}",
            data.len()
        )));
    }

    // Work items past the pixel count are masked, items past the global range never run.
    let covered = total.min(dispatch.global);
    let local = dispatch.local;
    let (center, unit) = ((*cx, *cy), *unit);
    let pixels = &mut data[..covered];
    pool.install(|| {
        pixels
            .par_chunks_mut(local)
            .enumerate()
            .for_each(|(group, chunk)| {
                for (i, px) in chunk.iter_mut().enumerate() {
                    let gid = group * local + i;
                    let x = (gid % width as usize) as u32;
                    let y = (gid / width as usize) as u32;
                    let (cr, ci) = pixel_coordinate(x, y, width, height, center, unit);
                    *px = escape_intensity(cr, ci);
                }
            });
    });
    Ok(())
}

fn scan_kernels(source: &str) -> MandelResult<Vec<EntryDecl>> {
    let code = strip_comments(source)?;
    let tokens = tokenize(&code);

    let mut depth = 0i64;
    for (line, tok) in &tokens {
        match *tok {
            "{" | "(" | "[" => depth += 1,
            "}" | ")" | "]" => {
                depth -= 1;
                if depth < 0 {
                    return Err(MandelError::compile(format!(
                        "line {line}: unmatched '{tok}'"
                    )));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(MandelError::compile("unexpected end of source: unbalanced brackets"));
    }

    let mut entries = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i].1;
        if tok != "__kernel" && tok != "kernel" {
            i += 1;
            continue;
        }
        let line = tokens[i].0;
        let decl = match tokens.get(i + 1..i + 4) {
            Some([(_, "void"), (_, name), (_, "(")]) if is_identifier(name) => *name,
            _ => {
                return Err(MandelError::compile(format!(
                    "line {line}: expected `kernel void <name>(`"
                )));
            }
        };
        let (arity, next) = count_params(&tokens, i + 4);
        if entries.iter().any(|e: &EntryDecl| e.name == decl) {
            return Err(MandelError::compile(format!(
                "line {line}: kernel '{decl}' redefined"
            )));
        }
        entries.push(EntryDecl {
            name: decl.to_string(),
            arity,
        });
        i = next;
    }

    if entries.is_empty() {
        return Err(MandelError::compile("source declares no kernels"));
    }
    Ok(entries)
}

/// Count top-level parameters starting right after the opening parenthesis. Returns the count
/// and the index past the closing parenthesis.
fn count_params(tokens: &[(usize, &str)], start: usize) -> (usize, usize) {
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut any = false;
    let mut i = start;
    while let Some((_, tok)) = tokens.get(i) {
        match *tok {
            "(" => depth += 1,
            ")" if depth == 0 => {
                let arity = if any { commas + 1 } else { 0 };
                return (arity, i + 1);
            }
            ")" => depth -= 1,
            "," if depth == 0 => commas += 1,
            "void" if !any && tokens.get(i + 1).map(|t| t.1) == Some(")") => {}
            _ => any = true,
        }
        i += 1;
    }
    (if any { commas + 1 } else { 0 }, i)
}

fn strip_comments(source: &str) -> MandelResult<String> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1usize;
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        line += 1;
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let start = line;
                let mut closed = false;
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(MandelError::compile(format!(
                        "line {start}: unterminated block comment"
                    )));
                }
                out.push(' ');
            }
            ('"' | '\'', _) => {
                out.push(c);
                let mut escaped = false;
                for d in chars.by_ref() {
                    out.push(d);
                    if d == '\n' {
                        line += 1;
                    }
                    if escaped {
                        escaped = false;
                    } else if d == '\\' {
                        escaped = true;
                    } else if d == c || d == '\n' {
                        break;
                    }
                }
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                out.push(c);
            }
        }
    }
    Ok(out)
}

fn tokenize(code: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut in_directive = false;
    for (n, text) in code.lines().enumerate() {
        let line = n + 1;
        // Preprocessor lines, continuations included, carry no declarations we care about.
        if in_directive || text.trim_start().starts_with('#') {
            in_directive = text.trim_end().ends_with('\\');
            continue;
        }
        let mut start = None;
        let mut chars = text.char_indices();
        while let Some((i, c)) = chars.next() {
            if c.is_alphanumeric() || c == '_' {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                tokens.push((line, &text[s..i]));
            }
            if c == '"' || c == '\'' {
                let end = literal_end(&mut chars, c).unwrap_or(text.len());
                tokens.push((line, &text[i..end]));
            } else if !c.is_whitespace() {
                tokens.push((line, &text[i..i + c.len_utf8()]));
            }
        }
        if let Some(s) = start {
            tokens.push((line, &text[s..]));
        }
    }
    tokens
}

/// Consume a string or character literal whose opening `quote` was just read. Returns the byte
/// offset past the closing quote, or `None` when the line ends first.
fn literal_end(chars: &mut std::str::CharIndices<'_>, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in chars.by_ref() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(i + c.len_utf8());
        }
    }
    None
}

fn is_identifier(tok: &str) -> bool {
    tok.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

#[cfg(test)]
#[path = "../../tests/unit/compute/host.rs"]
mod tests;
