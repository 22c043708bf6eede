use super::*;
use crate::compute::api::KernelArg;
use crate::foundation::error::Stage;
use crate::pipeline::program::{ENTRY_POINT, KernelDialect, KernelSource};

fn api() -> HostApi {
    HostApi::new(HostOpts {
        threads: Some(2),
        max_work_group_size: 4,
    })
}

fn builtin_program(api: &HostApi, device: &HostDevice) -> (HostContext, HostProgram) {
    let ctx = api.create_context(device).unwrap();
    let src = KernelSource::builtin(KernelDialect::OpenClC);
    let program = api.build_program(&ctx, device, src.text()).unwrap();
    (ctx, program)
}

#[test]
fn host_reports_one_device() {
    let api = api();
    assert_eq!(api.devices(10).unwrap().len(), 1);
    assert!(api.devices(0).unwrap().is_empty());
}

#[test]
fn builtin_source_declares_mandelbrot() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let (_ctx, program) = builtin_program(&api, &device);
    assert_eq!(program.entry_points().collect::<Vec<_>>(), vec![ENTRY_POINT]);
}

#[test]
fn scanner_ignores_commented_out_kernels() {
    let src = "// __kernel void Ghost(int a) {}\n/* kernel void Other() {} */\n\
               __kernel void Mandelbrot(__global uchar *o, int w, int h, \
               float x, float y, float u) {}";
    let entries = scan_kernels(src).unwrap();
    assert_eq!(
        entries,
        vec![EntryDecl {
            name: "Mandelbrot".to_string(),
            arity: 6
        }]
    );
}

#[test]
fn scanner_counts_void_parameter_list_as_zero() {
    let entries = scan_kernels("kernel void Noop(void) { }").unwrap();
    assert_eq!(entries[0].arity, 0);
}

#[test]
fn scanner_skips_continued_define_lines() {
    let src = "#define BODY { \\\n    }\n\
               __kernel void Mandelbrot(__global uchar *o, int w, int h, \
               float x, float y, float u) { }";
    let entries = scan_kernels(src).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].arity, 6);
}

#[test]
fn scanner_ignores_brackets_inside_literals() {
    let src = "__kernel void Mandelbrot(__global uchar *o, int w, int h, \
               float x, float y, float u) {\n\
               char c = '}';\n\
               char q = '\\'';\n\
               constant char *s = \"(( // /* kernel void Fake(\";\n\
               }";
    let entries = scan_kernels(src).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Mandelbrot");
    assert_eq!(entries[0].arity, 6);
}

#[test]
fn unbalanced_source_is_a_compile_error() {
    let err = scan_kernels("__kernel void Mandelbrot(int a) {").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Compilation));
}

#[test]
fn unterminated_comment_reports_its_line() {
    let err = scan_kernels("\n\n/* open\n__kernel void A() {}").unwrap_err();
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn source_without_kernels_fails_to_compile() {
    let err = scan_kernels("int helper(int x) { return x; }").unwrap_err();
    assert!(matches!(err, MandelError::Compile { .. }));
}

#[test]
fn missing_entry_point_is_a_lookup_error() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let ctx = api.create_context(&device).unwrap();
    let program = api
        .build_program(&ctx, &device, "__kernel void Julia(__global uchar *o) {}")
        .unwrap();
    let err = api.create_kernel(&program, ENTRY_POINT).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::KernelLookup));
}

#[test]
fn arity_mismatch_is_a_lookup_error() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let ctx = api.create_context(&device).unwrap();
    let program = api
        .build_program(&ctx, &device, "__kernel void Mandelbrot(__global uchar *o, int w) {}")
        .unwrap();
    assert!(matches!(
        api.create_kernel(&program, ENTRY_POINT),
        Err(MandelError::KernelLookup(_))
    ));
}

#[test]
fn wrong_argument_type_is_rejected() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let (_ctx, program) = builtin_program(&api, &device);
    let kernel = api.create_kernel(&program, ENTRY_POINT).unwrap();
    let err = api.set_arg(&kernel, 1, KernelArg::Float(1.0)).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::ArgumentBinding));
    let err = api.set_arg(&kernel, 6, KernelArg::Int(1)).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::ArgumentBinding));
}

#[test]
fn enqueue_with_unset_arguments_fails() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let (ctx, program) = builtin_program(&api, &device);
    let kernel = api.create_kernel(&program, ENTRY_POINT).unwrap();
    let queue = api.create_queue(&ctx, &device).unwrap();
    let err = api
        .enqueue(&queue, &kernel, Dispatch::padded(4, 4))
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Dispatch));
}

#[test]
fn padded_dispatch_fills_exactly_the_pixels() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let (ctx, program) = builtin_program(&api, &device);
    let kernel = api.create_kernel(&program, ENTRY_POINT).unwrap();
    let queue = api.create_queue(&ctx, &device).unwrap();
    let buffer = api.create_buffer(&ctx, &queue, 6).unwrap();

    api.set_arg(&kernel, 0, KernelArg::Buffer(&buffer)).unwrap();
    api.set_arg(&kernel, 1, KernelArg::Int(3)).unwrap();
    api.set_arg(&kernel, 2, KernelArg::Int(2)).unwrap();
    api.set_arg(&kernel, 3, KernelArg::Float(0.0)).unwrap();
    api.set_arg(&kernel, 4, KernelArg::Float(0.0)).unwrap();
    api.set_arg(&kernel, 5, KernelArg::Float(1.0)).unwrap();

    // 6 items in groups of 4: global 8, two padded items masked.
    api.enqueue(&queue, &kernel, Dispatch::padded(6, 4)).unwrap();
    api.finish(&queue).unwrap();

    let mut out = vec![0xAA; 6];
    api.read_buffer(&queue, &buffer, &mut out).unwrap();
    let expected: Vec<u8> = (0..6u32)
        .map(|gid| {
            let (cr, ci) = pixel_coordinate(gid % 3, gid / 3, 3, 2, (0.0, 0.0), 1.0);
            escape_intensity(cr, ci)
        })
        .collect();
    assert_eq!(out, expected);
}

#[test]
fn readback_length_mismatch_fails() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    let ctx = api.create_context(&device).unwrap();
    let queue = api.create_queue(&ctx, &device).unwrap();
    let buffer = api.create_buffer(&ctx, &queue, 4).unwrap();
    let mut out = vec![0; 3];
    let err = api.read_buffer(&queue, &buffer, &mut out).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Readback));
}

#[test]
fn unsupported_memory_fields_are_errors_not_values() {
    let api = api();
    let device = api.devices(1).unwrap().remove(0);
    assert!(api.device_field(&device, DeviceField::GlobalMemSize).is_err());
    assert_eq!(
        api.device_field(&device, DeviceField::Type).unwrap(),
        InfoValue::Bitfield(DEVICE_TYPE_CPU)
    );
    assert_eq!(
        api.device_field(&device, DeviceField::MaxWorkGroupSize).unwrap(),
        InfoValue::UInt(4)
    );
}
