use crate::compute::api::ComputeApi;
use crate::foundation::error::{MandelError, MandelResult, Stage};

/// Default cap on enumerated devices.
pub const DEFAULT_DEVICE_CAP: usize = 10;

/// Ordered set of devices discovered by one enumeration.
///
/// The catalog owns the device handles; render stages only borrow them.
pub struct DeviceCatalog<A: ComputeApi> {
    devices: Vec<A::Device>,
}

impl<A: ComputeApi> DeviceCatalog<A> {
    /// Enumerate up to `cap` devices in platform order.
    ///
    /// Fails with [`MandelError::NoDevice`] when nothing is found or the query itself fails.
    pub fn enumerate(api: &A, cap: usize) -> MandelResult<Self> {
        Self::discover(api, cap)?.ok_or_else(|| {
            MandelError::no_device(format!("{} backend reported no devices", api.name()))
        })
    }

    /// Like [`DeviceCatalog::enumerate`], but an empty platform is `Ok(None)` rather than an
    /// error. Query failures still propagate.
    pub fn discover(api: &A, cap: usize) -> MandelResult<Option<Self>> {
        if cap == 0 {
            return Err(MandelError::validation("device cap must be >= 1"));
        }

        let mut devices = api
            .devices(cap)
            .map_err(|e| e.at_stage(Stage::DeviceEnumeration))?;
        devices.truncate(cap);

        if devices.is_empty() {
            return Ok(None);
        }

        tracing::debug!(backend = api.name(), count = devices.len(), "devices enumerated");
        Ok(Some(Self { devices }))
    }

    /// All devices, in enumeration order.
    pub fn devices(&self) -> &[A::Device] {
        &self.devices
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always `false`: an enumerated catalog holds at least one device.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The default render device (first in enumeration order).
    pub fn primary(&self) -> &A::Device {
        &self.devices[0]
    }

    /// Device at `index`.
    pub fn select(&self, index: usize) -> MandelResult<&A::Device> {
        self.devices.get(index).ok_or_else(|| {
            MandelError::no_device(format!(
                "device index {index} out of range (available: {})",
                self.devices.len()
            ))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/catalog.rs"]
mod tests;
