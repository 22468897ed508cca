//! Coordinate types for the Web-Mercator plane.
//!
//! Everything the reader pipeline schedules or decodes is positioned on a
//! single logical plane: the Web-Mercator projection, spanning
//! [`MERCATOR_MIN`]..[`MERCATOR_MAX`] on both axes. This module provides
//! the plane's primitives (points, axis-aligned rectangles), the integer
//! grid coordinates used by the binary feature coding, the [`TileKey`]
//! addressing one quadtree cell, and the rotated-rectangle [`Viewport`]
//! the camera reports.

mod types;
mod viewport;

pub use types::{PointD, PointU, RectD, TileKey};
pub use viewport::Viewport;

/// Western/southern edge of the mercator plane.
pub const MERCATOR_MIN: f64 = -180.0;

/// Eastern/northern edge of the mercator plane.
pub const MERCATOR_MAX: f64 = 180.0;

/// Full extent of the mercator plane along one axis.
pub const MERCATOR_RANGE: f64 = MERCATOR_MAX - MERCATOR_MIN;

/// Side length of one tile cell at the given scale level.
///
/// The grid at scale `z` divides the mercator span into `2^z` cells per
/// axis, so cells shrink by half with every scale step.
#[inline]
pub fn cell_size(scale: i32) -> f64 {
    MERCATOR_RANGE / f64::powi(2.0, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_size_halves_per_scale() {
        for z in 0..19 {
            let coarse = cell_size(z);
            let fine = cell_size(z + 1);
            assert!((coarse / fine - 2.0).abs() < 1e-12, "scale {z}");
        }
    }

    #[test]
    fn test_cell_size_at_zero_covers_plane() {
        assert!((cell_size(0) - MERCATOR_RANGE).abs() < f64::EPSILON);
    }
}
