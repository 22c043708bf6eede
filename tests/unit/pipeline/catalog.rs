use super::*;
use crate::mock_api::MockApi;

#[test]
fn enumerates_in_order_up_to_cap() {
    let api = MockApi::new(12);
    let catalog = DeviceCatalog::enumerate(&api, DEFAULT_DEVICE_CAP).unwrap();
    assert_eq!(catalog.len(), 10);
    assert_eq!(catalog.primary().index, 0);
    assert_eq!(catalog.devices()[9].index, 9);
}

#[test]
fn cap_is_configurable() {
    let api = MockApi::new(5);
    let catalog = DeviceCatalog::enumerate(&api, 2).unwrap();
    assert_eq!(catalog.len(), 2);
}

#[test]
fn zero_devices_is_no_device() {
    let api = MockApi::new(0);
    let err = DeviceCatalog::enumerate(&api, 10).err().unwrap();
    assert!(matches!(err, MandelError::NoDevice(_)));
}

#[test]
fn query_failure_is_no_device() {
    let api = MockApi::failing_at(Stage::DeviceEnumeration);
    let err = DeviceCatalog::enumerate(&api, 10).err().unwrap();
    assert_eq!(err.stage(), Some(Stage::DeviceEnumeration));
}

#[test]
fn discover_separates_empty_from_failed() {
    assert!(DeviceCatalog::discover(&MockApi::new(0), 10).unwrap().is_none());
    let found = DeviceCatalog::discover(&MockApi::new(3), 2).unwrap();
    assert_eq!(found.map(|c| c.len()), Some(2));
    let failing = MockApi::failing_at(Stage::DeviceEnumeration);
    assert!(DeviceCatalog::discover(&failing, 10).is_err());
}

#[test]
fn zero_cap_is_rejected() {
    let api = MockApi::new(1);
    assert!(matches!(
        DeviceCatalog::enumerate(&api, 0),
        Err(MandelError::Validation(_))
    ));
    assert!(api.ledger().calls.is_empty());
}

#[test]
fn select_out_of_range_is_no_device() {
    let api = MockApi::new(2);
    let catalog = DeviceCatalog::enumerate(&api, 10).unwrap();
    assert_eq!(catalog.select(1).unwrap().index, 1);
    assert!(matches!(catalog.select(2), Err(MandelError::NoDevice(_))));
}

#[test]
fn dropping_the_catalog_releases_every_device() {
    let api = MockApi::new(3);
    {
        let _catalog = DeviceCatalog::enumerate(&api, 10).unwrap();
        assert_eq!(api.ledger().acquired.len(), 3);
    }
    assert!(api.ledger().balanced());
}
