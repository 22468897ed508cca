//! The rendering-engine boundary.
//!
//! The reader core pushes decoded features into a shared
//! [`EngineContext`] and tells a [`CoverageDescriptor`] which tiles'
//! artefacts to discard when the viewport moves. Both sides stay
//! abstract: the graphics back-end that consumes them is external.

use smallvec::SmallVec;

use crate::container::FeatureId;
use crate::coord::{PointD, RectD, TileKey};
use crate::feature::MAX_TYPES_COUNT;

/// Decoded geometry of one feature at the tile's scale.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// A single point.
    Point(PointD),
    /// A polyline, simplified to the tile's scale.
    Line(Vec<PointD>),
    /// A triangle strip.
    Area(Vec<PointD>),
}

impl FeatureGeometry {
    /// Number of points carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Point(_) => 1,
            Self::Line(points) | Self::Area(points) => points.len(),
        }
    }

    /// True if no points are carried.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::Line(points) | Self::Area(points) => points.is_empty(),
        }
    }
}

/// One feature as delivered to the engine.
#[derive(Debug, Clone)]
pub struct DecodedFeature {
    pub id: FeatureId,
    /// Resolved type identifiers, most specific first.
    pub types: SmallVec<[u32; MAX_TYPES_COUNT]>,
    /// Draw layer, zero for most features.
    pub layer: i8,
    /// Importance rank, zero if the feature carries none.
    pub rank: u8,
    pub geometry: FeatureGeometry,
    /// Bounding rect of `geometry`.
    pub limit_rect: RectD,
}

/// The shared drawing context decoded features are appended to.
///
/// Implementations serialise appends internally: reader tasks for
/// different tiles call in concurrently. Delivery must be idempotent at
/// the `(tile, feature id)` level, because the read manager re-enqueues
/// surviving tiles on viewport change without cancelling their original
/// task, so the same feature may legitimately arrive twice.
pub trait EngineContext: Send + Sync {
    /// Deliver one decoded feature of a tile.
    fn append_feature(&self, tile: TileKey, feature: DecodedFeature);
}

/// Receiver of tile-eviction side effects of a coverage update.
pub trait CoverageDescriptor {
    /// Discard every tile artefact the engine holds.
    fn drop_all(&mut self);

    /// Discard the artefacts of exactly the given tiles.
    fn drop_tiles(&mut self, keys: &[TileKey]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_len() {
        assert_eq!(FeatureGeometry::Point(PointD::new(0.0, 0.0)).len(), 1);
        assert_eq!(FeatureGeometry::Line(vec![]).len(), 0);
        assert!(FeatureGeometry::Line(vec![]).is_empty());
        assert!(!FeatureGeometry::Point(PointD::new(0.0, 0.0)).is_empty());

        let strip = FeatureGeometry::Area(vec![
            PointD::new(0.0, 0.0),
            PointD::new(1.0, 0.0),
            PointD::new(0.0, 1.0),
        ]);
        assert_eq!(strip.len(), 3);
    }
}
