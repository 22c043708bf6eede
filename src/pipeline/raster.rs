use crate::foundation::error::{MandelError, MandelResult};
use crate::foundation::request::RowStride;
use crate::pipeline::execution::ResultField;

/// Writable RGB pixel grid the rasterizer draws into.
pub trait PixelSurface {
    /// Allocate a `width`×`height` surface.
    fn create(width: u32, height: u32) -> Self
    where
        Self: Sized;

    /// `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Set pixel `(x, y)`. Callers guarantee the coordinates are in bounds.
    fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]);
}

impl PixelSurface for image::RgbImage {
    fn create(width: u32, height: u32) -> Self {
        image::RgbImage::new(width, height)
    }

    fn dimensions(&self) -> (u32, u32) {
        image::RgbImage::dimensions(self)
    }

    fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        self.put_pixel(x, y, image::Rgb(rgb));
    }
}

/// Draw `field` onto `surface` as grayscale: pixel `(x, y)` becomes `(c, c, c)` with `c` read
/// through `stride`.
///
/// The surface must match the field dimensions; on mismatch nothing is written.
pub fn draw<S: PixelSurface + ?Sized>(
    field: &ResultField,
    stride: RowStride,
    surface: &mut S,
) -> MandelResult<()> {
    let (width, height) = surface.dimensions();
    if (width, height) != (field.width(), field.height()) {
        return Err(MandelError::validation(format!(
            "surface is {width}x{height} but the field is {}x{}",
            field.width(),
            field.height()
        )));
    }

    for y in 0..height {
        for x in 0..width {
            let c = field.intensity(x, y, stride);
            surface.set_pixel(x, y, [c, c, c]);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/raster.rs"]
mod tests;
