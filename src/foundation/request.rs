use crate::foundation::error::{MandelError, MandelResult};

/// Row stride used to index the result field when rasterizing.
///
/// Images have always been read at `x + y * height`, which transposes the field for non-square
/// sizes. Existing output depends on it, so it stays the default.
/// [`RowStride::Width`] selects the conventional row-major `x + y * width` mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStride {
    /// `x + y * height` (bug-compatible).
    #[default]
    Height,
    /// `x + y * width`.
    Width,
}

impl RowStride {
    /// Field index of pixel `(x, y)` for a `width`×`height` image.
    pub fn index(self, x: u32, y: u32, width: u32, height: u32) -> usize {
        let stride = match self {
            RowStride::Height => height,
            RowStride::Width => width,
        };
        x as usize + y as usize * stride as usize
    }
}

/// Point on the complex plane the image is centered on.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Center {
    /// Real part.
    pub x: f64,
    /// Imaginary part.
    pub y: f64,
}

/// One image request: dimensions, plane scale and center.
///
/// Built once and then only read. The `with_*` methods consume and return a new value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRequest {
    width: u32,
    height: u32,
    unit: f64,
    center: Center,
    stride: RowStride,
}

impl RenderRequest {
    /// Create a request with the default unit (see [`RenderRequest::default_unit`]), centered on
    /// the origin.
    pub fn new(width: u32, height: u32) -> MandelResult<Self> {
        if width == 0 || height == 0 {
            return Err(MandelError::validation(format!(
                "image dimensions must be positive (got {width}x{height})"
            )));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(MandelError::validation(format!(
                "image dimensions exceed kernel int range (got {width}x{height})"
            )));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > u64::from(u32::MAX) {
            return Err(MandelError::validation(format!(
                "image has too many pixels for a single dispatch ({pixels})"
            )));
        }

        Ok(Self {
            width,
            height,
            unit: Self::default_unit(width, height),
            center: Center::default(),
            stride: RowStride::default(),
        })
    }

    /// Per-pixel step used when no usable unit is supplied: `10 / (width + height)`.
    pub fn default_unit(width: u32, height: u32) -> f64 {
        10.0 / (f64::from(width) + f64::from(height))
    }

    /// Set the plane-scale unit. `None`, non-positive and non-finite values fall back to the
    /// default unit.
    pub fn with_unit(mut self, unit: Option<f64>) -> Self {
        self.unit = match unit {
            Some(u) if u.is_finite() && u > 0.0 => u,
            _ => Self::default_unit(self.width, self.height),
        };
        self
    }

    /// Center the image on `(x, y)`.
    pub fn with_center(mut self, x: f64, y: f64) -> MandelResult<Self> {
        if !x.is_finite() || !y.is_finite() {
            return Err(MandelError::validation("center coordinates must be finite"));
        }
        self.center = Center { x, y };
        Ok(self)
    }

    /// Select the rasterizer row stride.
    pub fn with_stride(mut self, stride: RowStride) -> Self {
        self.stride = stride;
        self
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Effective per-pixel step on the complex plane.
    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// Image center on the complex plane.
    pub fn center(&self) -> Center {
        self.center
    }

    /// Rasterizer row stride.
    pub fn stride(&self) -> RowStride {
        self.stride
    }

    /// `width * height`, the length of the result field.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/request.rs"]
mod tests;
