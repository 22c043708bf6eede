//! Escape-time math shared by the native kernels. Mirrors `kernels/mandelbrot.cl` operation for
//! operation in `f32`, so every backend produces the same bytes.

/// Iterations before a point is considered inside the set.
pub const ITERATION_LIMIT: u32 = 64;

/// Intensity added per escape iteration.
pub const INTENSITY_STEP: u32 = 4;

/// Complex-plane coordinate of pixel `(x, y)`.
#[inline]
pub fn pixel_coordinate(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    center: (f32, f32),
    unit: f32,
) -> (f32, f32) {
    let cr = (x as f32 - width as f32 * 0.5) * unit + center.0;
    let ci = (y as f32 - height as f32 * 0.5) * unit + center.1;
    (cr, ci)
}

/// Intensity of point `cr + ci·i`: 0 inside the set, otherwise the escape iteration times
/// [`INTENSITY_STEP`].
#[inline]
pub fn escape_intensity(cr: f32, ci: f32) -> u8 {
    let mut zr = 0.0f32;
    let mut zi = 0.0f32;
    let mut n = 0u32;
    while n < ITERATION_LIMIT {
        let zr2 = zr * zr;
        let zi2 = zi * zi;
        if zr2 + zi2 > 4.0 {
            break;
        }
        zi = 2.0 * zr * zi + ci;
        zr = zr2 - zi2 + cr;
        n += 1;
    }
    if n == ITERATION_LIMIT {
        0
    } else {
        // n < 64, so n * 4 <= 252.
        (n * INTENSITY_STEP) as u8
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compute/escape.rs"]
mod tests;
