//! The camera's footprint on the mercator plane.
//!
//! A [`Viewport`] is a rectangle of the plane, possibly rotated around
//! its centre. Tile enumeration works against the viewport's rotated
//! polygon, not its axis-aligned clip rectangle, so a rotated camera does
//! not schedule the corner tiles its screen never shows.
//!
//! Intersection tests go through the `geo` crate: the rotated corners
//! become a `geo::Polygon` and overlap is answered by its `Intersects`
//! predicate, behind a cheap clip-rect prefilter.

use geo::{Coord, Intersects, LineString};

use super::types::{PointD, RectD};

/// A rotated rectangle on the mercator plane.
///
/// Equality is exact on all four parameters; the read manager uses it for
/// its no-op short-circuit, so two camera updates that differ in any
/// component are distinct viewports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center: PointD,
    half_width: f64,
    half_height: f64,
    /// Rotation around the centre, radians, counter-clockwise.
    angle: f64,
}

impl Viewport {
    /// Create a viewport from its centre, full extents and rotation.
    pub fn new(center: PointD, width: f64, height: f64, angle: f64) -> Self {
        Self {
            center,
            half_width: width / 2.0,
            half_height: height / 2.0,
            angle,
        }
    }

    /// Create an axis-aligned viewport covering `rect`.
    pub fn axis_aligned(rect: RectD) -> Self {
        Self::new(rect.center(), rect.width(), rect.height(), 0.0)
    }

    /// Centre of the viewport.
    pub fn center(&self) -> PointD {
        self.center
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The rotated corner polygon, counter-clockwise.
    pub fn polygon(&self) -> [PointD; 4] {
        let (sin, cos) = self.angle.sin_cos();
        let rotate = |dx: f64, dy: f64| {
            PointD::new(
                self.center.x + dx * cos - dy * sin,
                self.center.y + dx * sin + dy * cos,
            )
        };
        [
            rotate(-self.half_width, -self.half_height),
            rotate(self.half_width, -self.half_height),
            rotate(self.half_width, self.half_height),
            rotate(-self.half_width, self.half_height),
        ]
    }

    /// Axis-aligned bounding rectangle of the rotated polygon.
    pub fn clip_rect(&self) -> RectD {
        let mut rect = RectD::empty();
        for corner in self.polygon() {
            rect.add_point(corner);
        }
        rect
    }

    /// True if the two rotated polygons overlap (boundary contact
    /// counts).
    pub fn intersects(&self, other: &Viewport) -> bool {
        if !self.clip_rect().intersects(&other.clip_rect()) {
            return false;
        }
        self.geo_polygon().intersects(&other.geo_polygon())
    }

    /// True if the rotated polygon overlaps an axis-aligned rectangle.
    pub fn intersects_rect(&self, rect: &RectD) -> bool {
        if !rect.is_valid() || !self.clip_rect().intersects(rect) {
            return false;
        }
        let rect = geo::Rect::new(
            Coord {
                x: rect.min_x,
                y: rect.min_y,
            },
            Coord {
                x: rect.max_x,
                y: rect.max_y,
            },
        );
        self.geo_polygon().intersects(&rect)
    }

    /// The rotated footprint as a closed single-ring `geo` polygon.
    fn geo_polygon(&self) -> geo::Polygon<f64> {
        let corners = self.polygon();
        let mut coords: Vec<Coord<f64>> = corners
            .iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect();
        coords.push(coords[0]);
        geo::Polygon::new(LineString(coords), vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_axis_aligned_clip_rect_matches_input() {
        let rect = RectD::new(-10.0, 0.0, 10.0, 20.0);
        let viewport = Viewport::axis_aligned(rect);
        let clip = viewport.clip_rect();
        assert!((clip.min_x - rect.min_x).abs() < 1e-9);
        assert!((clip.max_y - rect.max_y).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_clip_rect_grows() {
        // A 2x2 square rotated 45 degrees has a diagonal-sized bounding box.
        let viewport = Viewport::new(PointD::new(0.0, 0.0), 2.0, 2.0, FRAC_PI_4);
        let clip = viewport.clip_rect();
        let expected = 2.0_f64.sqrt();
        assert!((clip.max_x - expected).abs() < 1e-9);
        assert!((clip.max_y - expected).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_viewports_intersect() {
        let a = Viewport::axis_aligned(RectD::new(0.0, 0.0, 10.0, 10.0));
        let b = Viewport::axis_aligned(RectD::new(5.0, 5.0, 15.0, 15.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_disjoint_viewports_do_not_intersect() {
        let a = Viewport::axis_aligned(RectD::new(0.0, 0.0, 10.0, 10.0));
        let b = Viewport::axis_aligned(RectD::new(20.0, 20.0, 30.0, 30.0));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_rotated_disjoint_but_clip_rects_overlap() {
        // Two thin bars rotated 45 degrees apart in opposite corners of
        // the same bounding region: clip rects overlap, polygons do not.
        let a = Viewport::new(PointD::new(0.0, 0.0), 10.0, 0.2, FRAC_PI_4);
        let b = Viewport::new(PointD::new(4.0, -4.0), 1.0, 0.2, FRAC_PI_4);
        assert!(a.clip_rect().intersects(&b.clip_rect()));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_rotation_excludes_corner_rect() {
        // A thin bar rotated 45 degrees misses the axis-aligned corner
        // cell of its own clip rect.
        let viewport = Viewport::new(PointD::new(0.0, 0.0), 20.0, 0.5, FRAC_PI_4);
        let clip = viewport.clip_rect();
        let corner = RectD::new(clip.min_x, clip.max_y - 0.5, clip.min_x + 0.5, clip.max_y);
        assert!(!viewport.intersects_rect(&corner));

        // But the centre cell is covered.
        let center = RectD::new(-0.5, -0.5, 0.5, 0.5);
        assert!(viewport.intersects_rect(&center));
    }

    #[test]
    fn test_intersects_rect_boundary_touch() {
        let viewport = Viewport::axis_aligned(RectD::new(0.0, 0.0, 10.0, 10.0));
        let touching = RectD::new(10.0, 0.0, 20.0, 10.0);
        assert!(viewport.intersects_rect(&touching));
    }

    #[test]
    fn test_empty_rect_never_intersects() {
        let viewport = Viewport::axis_aligned(RectD::new(0.0, 0.0, 10.0, 10.0));
        assert!(!viewport.intersects_rect(&RectD::empty()));
    }
}
