use std::collections::BTreeMap;

use crate::caps::fields::{DEVICE_FIELDS, FieldDescriptor, InfoValue, PLATFORM_FIELDS};
use crate::compute::api::ComputeApi;
use crate::foundation::error::MandelResult;
use crate::pipeline::catalog::DeviceCatalog;

/// Attribute map of one device or platform. Every key of the descriptor table is present;
/// attributes that could not be queried are `None` (serialized as `null`).
pub type AttributeMap = BTreeMap<&'static str, Option<InfoValue>>;

/// Descriptive record for one enumerated device.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DeviceRecord {
    /// Position in the device catalog; the value to pass as a render device index.
    pub index: usize,
    /// Device attributes keyed by [`DEVICE_FIELDS`] keys.
    #[serde(flatten)]
    pub device: AttributeMap,
    /// Attributes of the platform the device belongs to.
    pub platform: AttributeMap,
}

impl DeviceRecord {
    /// Collect every attribute of `device`.
    pub fn collect<A: ComputeApi>(api: &A, index: usize, device: &A::Device) -> Self {
        let device_map = collect_table(DEVICE_FIELDS, |field| api.device_field(device, field));
        let platform_map =
            collect_table(PLATFORM_FIELDS, |field| api.platform_field(device, field));
        Self {
            index,
            device: device_map,
            platform: platform_map,
        }
    }

    /// Device attribute `key`, or `None` when absent or null.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.device.get(key).and_then(Option::as_ref)
    }

    /// Device name, when the backend could report one.
    pub fn name(&self) -> Option<&str> {
        match self.get("name") {
            Some(InfoValue::Text(name)) => Some(name),
            _ => None,
        }
    }
}

fn collect_table<F: Copy + std::fmt::Debug>(
    table: &[FieldDescriptor<F>],
    mut query: impl FnMut(F) -> MandelResult<InfoValue>,
) -> AttributeMap {
    table
        .iter()
        .map(|desc| {
            let value = match query(desc.field) {
                Ok(v) if v.kind() == desc.kind => Some(v),
                Ok(v) => {
                    tracing::debug!(
                        key = desc.key,
                        expected = ?desc.kind,
                        got = ?v.kind(),
                        "attribute kind mismatch"
                    );
                    None
                }
                Err(e) => {
                    tracing::debug!(key = desc.key, error = %e, "attribute unavailable");
                    None
                }
            };
            (desc.key, value)
        })
        .collect()
}

/// Describe every device `api` enumerates, up to `cap`.
///
/// Having no device at all is not an error here: the result is simply empty. A failing device
/// query is.
#[tracing::instrument(skip(api), fields(backend = api.name()))]
pub fn describe_devices<A: ComputeApi>(api: &A, cap: usize) -> MandelResult<Vec<DeviceRecord>> {
    let Some(catalog) = DeviceCatalog::discover(api, cap)? else {
        tracing::warn!("no devices to describe");
        return Ok(Vec::new());
    };

    Ok(catalog
        .devices()
        .iter()
        .enumerate()
        .map(|(index, device)| DeviceRecord::collect(api, index, device))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/caps/record.rs"]
mod tests;
