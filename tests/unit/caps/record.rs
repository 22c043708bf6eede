use super::*;
use crate::caps::fields::{DEVICE_FIELDS, PLATFORM_FIELDS};
use crate::foundation::error::Stage;
use crate::mock_api::MockApi;

#[test]
fn every_key_is_present_even_when_unavailable() {
    let api = MockApi::new(2);
    let records = describe_devices(&api, 10).unwrap();
    assert_eq!(records.len(), 2);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.index, i);
        assert_eq!(record.device.len(), DEVICE_FIELDS.len());
        assert_eq!(record.platform.len(), PLATFORM_FIELDS.len());
    }
    assert_eq!(records[1].name(), Some("mock device 1"));
    assert_eq!(records[0].get("global_mem_size"), None);
    assert!(records[0].device.contains_key("global_mem_size"));
}

#[test]
fn wrong_value_kind_is_reported_as_null() {
    let api = MockApi::new(1);
    let records = describe_devices(&api, 10).unwrap();
    assert_eq!(records[0].device.get("available"), Some(&None));
    assert_eq!(
        records[0].get("max_work_item_sizes"),
        Some(&InfoValue::UIntList(vec![4, 1, 1]))
    );
}

#[test]
fn no_devices_is_an_empty_listing() {
    let api = MockApi::new(0);
    assert!(describe_devices(&api, 10).unwrap().is_empty());
}

#[test]
fn failing_device_query_is_reported_not_hidden() {
    let api = MockApi::failing_at(Stage::DeviceEnumeration);
    let err = describe_devices(&api, 10).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::DeviceEnumeration));
    assert!(err.to_string().contains("injected devices failure"), "{err}");
    assert!(api.ledger().acquired.is_empty());
}

#[test]
fn records_serialize_flat_with_nulls() {
    let api = MockApi::new(1);
    let records = describe_devices(&api, 10).unwrap();
    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["index"], 0);
    assert_eq!(json["name"], "mock device 0");
    assert!(json["vendor"].is_null());
    assert_eq!(json["platform"]["name"], "mock platform");
    assert!(json["platform"]["extensions"].is_null());
}

#[test]
fn listing_releases_every_device() {
    let api = MockApi::new(4);
    describe_devices(&api, 10).unwrap();
    assert!(api.ledger().balanced());
}
