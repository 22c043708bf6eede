use super::*;

#[test]
fn empty_object_yields_defaults() {
    let s = RenderSettings::from_json_str("{}").unwrap();
    assert_eq!(s, RenderSettings::default());
    assert_eq!(s.device_cap, 10);
    assert_eq!(s.row_stride, RowStride::Height);
    assert_eq!(s.backend, BackendKind::Host);
}

#[test]
fn fields_parse_from_json() {
    let s = RenderSettings::from_json_str(
        r#"{
            "backend": "opencl",
            "device_cap": 4,
            "device_index": 2,
            "row_stride": "width",
            "work_group_limit": 32,
            "center": { "x": -0.5, "y": 0.25 },
            "host_threads": 3
        }"#,
    )
    .unwrap();
    assert_eq!(s.backend, BackendKind::OpenCl);
    assert_eq!(s.session_opts().device_index, 2);
    assert_eq!(s.session_opts().work_group_limit, Some(32));
    assert_eq!(s.host_opts().threads, Some(3));
    assert_eq!(s.center, Center { x: -0.5, y: 0.25 });
}

#[test]
fn unknown_keys_are_rejected() {
    let err = RenderSettings::from_json_str(r#"{ "devcie_cap": 3 }"#).unwrap_err();
    assert!(matches!(err, MandelError::Serde(_)), "{err}");
}

#[test]
fn out_of_range_values_fail_validation() {
    for json in [
        r#"{ "device_cap": 0 }"#,
        r#"{ "device_cap": 2, "device_index": 2 }"#,
        r#"{ "work_group_limit": 0 }"#,
        r#"{ "host_threads": 0 }"#,
    ] {
        let err = RenderSettings::from_json_str(json).unwrap_err();
        assert!(matches!(err, MandelError::Validation(_)), "{json}: {err}");
    }
}

#[test]
fn missing_settings_file_is_reported_with_path() {
    let err = RenderSettings::from_json_path(Path::new("does/not/exist.json")).unwrap_err();
    assert!(err.to_string().contains("exist.json"), "{err}");
}

#[test]
fn kernel_source_defaults_to_packaged_kernel() {
    let s = RenderSettings::default();
    let src = s.kernel_source(KernelDialect::OpenClC).unwrap();
    assert_eq!(src.origin(), "builtin:mandelbrot.cl");
}

#[test]
fn request_carries_center_and_stride() {
    let s = RenderSettings {
        row_stride: RowStride::Width,
        center: Center { x: 1.0, y: -1.0 },
        ..RenderSettings::default()
    };
    let req = s.request(100, 50, None).unwrap();
    assert_eq!(req.stride(), RowStride::Width);
    assert_eq!(req.center(), Center { x: 1.0, y: -1.0 });
    assert_eq!(req.unit(), 10.0 / 150.0);
}
