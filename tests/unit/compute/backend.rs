use super::*;

struct BackendName;

impl BackendTask for BackendName {
    type Output = (&'static str, KernelDialect);

    fn run<A: ComputeApi>(self, api: &A, dialect: KernelDialect) -> MandelResult<Self::Output> {
        Ok((api.name(), dialect))
    }
}

#[test]
fn host_backend_is_always_available() {
    assert!(BackendKind::Host.is_available());
    let (name, dialect) =
        run_on_backend(BackendKind::Host, HostOpts::default(), BackendName).unwrap();
    assert_eq!(name, "host");
    assert_eq!(dialect, KernelDialect::OpenClC);
}

#[test]
fn gpu_backend_compiles_wgsl() {
    assert_eq!(BackendKind::Gpu.dialect(), KernelDialect::Wgsl);
    assert_eq!(BackendKind::OpenCl.dialect(), KernelDialect::OpenClC);
}

#[cfg(not(feature = "opencl"))]
#[test]
fn disabled_backend_is_a_validation_error() {
    let err = run_on_backend(BackendKind::OpenCl, HostOpts::default(), BackendName).unwrap_err();
    assert!(matches!(err, MandelError::Validation(_)));
    assert!(err.to_string().contains("not available"), "{err}");
}

#[test]
fn kinds_use_settings_names() {
    for kind in BackendKind::ALL {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.name()));
        let back: BackendKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
