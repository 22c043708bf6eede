use super::*;

#[test]
fn non_positive_dimensions_fail_before_any_device_work() {
    for (w, h) in [(0, 4), (4, 0), (-3, 4), (4, i64::MAX)] {
        let err = render(w, h, None).unwrap_err();
        assert!(err.diagnostic.contains("positive integer"), "{w}x{h}: {err}");
    }
}

#[test]
fn negative_device_index_is_rejected() {
    let err = render_on(4, 4, None, -1).unwrap_err();
    assert!(err.diagnostic.contains("must not be negative"), "{err}");
}

#[test]
fn pipeline_errors_collapse_to_their_message() {
    let failed = RenderFailed::from(MandelError::no_device("nothing found"));
    assert_eq!(failed.diagnostic, "no compute device: nothing found");
    assert_eq!(failed.to_string(), failed.diagnostic);
}

#[cfg(not(feature = "opencl"))]
mod host {
    use super::*;

    #[test]
    fn renders_requested_dimensions() {
        let img = render(8, 6, None).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert!(img.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }

    #[test]
    fn missing_device_index_is_a_failure() {
        let err = render_on(4, 4, Some(1.0), 3).unwrap_err();
        assert!(err.diagnostic.starts_with("no compute device"), "{err}");
    }

    #[test]
    fn host_lists_a_single_device() {
        let devices = list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
        assert!(devices[0].name().is_some());
    }
}
