//! Utility functions for image conversion and pixel coordinates.

pub mod safe_cast;
pub mod image_conversion;

use opencv::core::Point;
use safe_cast::f32_to_i32_clamp;

/// Coordinates further than this from the origin are clamped before drawing
const DRAW_COORD_LIMIT: i32 = 1 << 15;

/// Convert floating point pixel coordinates to an OpenCV point
///
/// Values are truncated toward zero. Non-finite values map to the lower
/// clamp bound so a stray NaN never reaches the draw primitives.
#[must_use]
pub fn to_pixel(x: f32, y: f32) -> Point {
    Point::new(
        f32_to_i32_clamp(x, -DRAW_COORD_LIMIT, DRAW_COORD_LIMIT),
        f32_to_i32_clamp(y, -DRAW_COORD_LIMIT, DRAW_COORD_LIMIT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel_truncates() {
        let p = to_pixel(10.7, -3.2);
        assert_eq!(p, Point::new(10, -3));
    }

    #[test]
    fn test_to_pixel_clamps() {
        let p = to_pixel(1e9, f32::NAN);
        assert_eq!(p.x, DRAW_COORD_LIMIT);
        assert_eq!(p.y, -DRAW_COORD_LIMIT);
    }
}
