use super::*;
use crate::mock_api::{MockApi, STAGE_METHODS};
use crate::pipeline::catalog::DeviceCatalog;

#[test]
fn builtin_sources_carry_a_version() {
    for dialect in [KernelDialect::OpenClC, KernelDialect::Wgsl] {
        let src = KernelSource::builtin(dialect);
        assert_eq!(src.version(), Some("1"));
        assert!(src.text().contains(ENTRY_POINT));
        assert!(src.origin().starts_with("builtin:"));
    }
}

#[test]
fn empty_source_text_is_rejected() {
    let err = KernelSource::from_text("inline", "  \n", KernelDialect::OpenClC).unwrap_err();
    assert!(matches!(err, MandelError::Validation(_)));
}

#[test]
fn missing_source_file_is_an_error() {
    let err = KernelSource::from_path(
        Path::new("/definitely/not/here/mandelbrot.cl"),
        KernelDialect::OpenClC,
    )
    .unwrap_err();
    assert!(err.to_string().contains("read kernel source"));
}

#[test]
fn compile_acquires_context_program_and_kernel() {
    let api = MockApi::new(1);
    let catalog = DeviceCatalog::enumerate(&api, 10).unwrap();
    let src = KernelSource::builtin(KernelDialect::OpenClC);
    let program = CompiledProgram::compile(&api, catalog.primary(), &src).unwrap();
    assert_eq!(
        api.ledger().calls,
        vec!["devices", "create_context", "build_program", "create_kernel"]
    );
    drop(program);
    assert_eq!(api.ledger().released, vec!["kernel", "program", "context"]);
}

#[test]
fn failures_are_attributed_and_release_earlier_handles() {
    let stages = [Stage::ContextCreation, Stage::Compilation, Stage::KernelLookup];
    for stage in stages {
        let api = MockApi::failing_at(stage);
        let catalog = DeviceCatalog::enumerate(&api, 10).unwrap();
        let src = KernelSource::builtin(KernelDialect::OpenClC);
        let err = CompiledProgram::compile(&api, catalog.primary(), &src)
            .err()
            .unwrap();
        assert_eq!(err.stage(), Some(stage), "{err}");

        drop(catalog);
        let ledger = api.ledger();
        assert!(ledger.balanced(), "{stage}: {ledger:?}");
        let later = STAGE_METHODS
            .iter()
            .skip_while(|(s, _)| *s != stage)
            .skip(1);
        for (_, method) in later {
            assert!(!ledger.called(method), "{stage}: {method} was called");
        }
    }
}

#[test]
fn custom_source_on_host_is_flagged() {
    let host = crate::compute::host::HostApi::default();
    let custom = KernelSource::from_text(
        "my.cl",
        "__kernel void Mandelbrot(__global uchar *o, int w, int h, float x, float y, float u) {}",
        KernelDialect::OpenClC,
    )
    .unwrap();
    let builtin = KernelSource::builtin(KernelDialect::OpenClC);

    assert!(!custom.is_builtin());
    assert!(overridden_body_ignored(&host, &custom));
    assert!(!overridden_body_ignored(&host, &builtin));
    assert!(!overridden_body_ignored(&MockApi::new(1), &custom));
}
