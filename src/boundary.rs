//! Thin call boundary for embedders.
//!
//! Mirrors a scripting-extension surface: plain integer/float arguments in, an image or a
//! single failure value out. Every pipeline error collapses into [`RenderFailed`].

use crate::caps::record::DeviceRecord;
use crate::compute::backend::BackendKind;
use crate::foundation::error::MandelError;
use crate::settings::RenderSettings;

/// Failure signal returned across the boundary. Carries only the diagnostic text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{diagnostic}")]
pub struct RenderFailed {
    /// Human-readable diagnostic.
    pub diagnostic: String,
}

impl From<MandelError> for RenderFailed {
    fn from(err: MandelError) -> Self {
        Self {
            diagnostic: err.to_string(),
        }
    }
}

fn boundary_settings(device_index: usize) -> RenderSettings {
    RenderSettings {
        backend: BackendKind::preferred(),
        device_index,
        ..RenderSettings::default()
    }
}

fn dimension(name: &str, v: i64) -> Result<u32, RenderFailed> {
    match u32::try_from(v) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RenderFailed {
            diagnostic: format!("{name} must be a positive integer (got {v})"),
        }),
    }
}

/// Render a `width`×`height` grayscale image on the first device.
///
/// `unit` is the per-pixel plane step; absent or non-positive selects `10 / (width + height)`.
pub fn render(
    width: i64,
    height: i64,
    unit: Option<f64>,
) -> Result<image::RgbImage, RenderFailed> {
    render_on(width, height, unit, 0)
}

/// [`render`] on the device at `device_index` in enumeration order.
pub fn render_on(
    width: i64,
    height: i64,
    unit: Option<f64>,
    device_index: i64,
) -> Result<image::RgbImage, RenderFailed> {
    let width = dimension("width", width)?;
    let height = dimension("height", height)?;
    let device_index = usize::try_from(device_index).map_err(|_| RenderFailed {
        diagnostic: format!("device index must not be negative (got {device_index})"),
    })?;

    let mut settings = boundary_settings(device_index);
    settings.device_cap = settings.device_cap.max(device_index + 1);
    let request = settings.request(width, height, unit)?;
    let (img, _report) = crate::render::render_image(&settings, &request)?;
    Ok(img)
}

/// Capability records for up to ten devices, keyed by their enumeration index.
pub fn list_devices() -> Result<Vec<DeviceRecord>, RenderFailed> {
    Ok(crate::render::list_devices(&boundary_settings(0))?)
}

#[cfg(test)]
#[path = "../tests/unit/boundary.rs"]
mod tests;
