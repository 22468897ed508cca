//! Serialisation of feature records.
//!
//! [`FeatureBuilder`] is the writing half of the record format: the map
//! generation side assembles a feature, and `serialize` emits the record
//! blob plus the outer-geometry stream entries. The decoder round-trips
//! the output exactly (up to coding-grid precision on coordinates).
//!
//! The builder asserts its contracts instead of returning errors: a
//! malformed feature is a bug in the producing tool, not a runtime
//! condition.

use smallvec::SmallVec;

use crate::coord::{PointD, RectD};

use super::bits::{write_varint_u32, write_varint_u64};
use super::metadata::{MetaField, Metadata};
use super::serial::{save_outer_run, save_point, save_point_run, GeometryCodingParams};
use super::{
    GeomType, ADDENDUM_HAS_HOUSE, ADDENDUM_HAS_RANK, ADDENDUM_HAS_REF, HEADER_HAS_ADDENDUM,
    HEADER_HAS_LAYER, HEADER_HAS_NAME, HEADER_TYPES_SHIFT, MAX_TYPES_COUNT,
};

/// Most points an inner polyline may carry (4-bit count).
pub const MAX_INNER_POINTS: usize = 15;

/// Geometry accepted by the builder.
#[derive(Debug, Clone)]
enum Geometry {
    Point(PointD),
    InnerLine {
        points: Vec<PointD>,
        /// One 2-bit marker per intermediate point: the coarsest scale
        /// index at which the point is visible.
        markers: Vec<u8>,
    },
    OuterLine {
        /// Full polyline per container scale level, `None` where the
        /// level stores no variant. All present variants must share
        /// their first point.
        variants: Vec<Option<Vec<PointD>>>,
    },
    InnerArea {
        strip: Vec<PointD>,
    },
    OuterArea {
        variants: Vec<Option<Vec<PointD>>>,
    },
}

/// Output of serialising one feature.
#[derive(Debug, Clone)]
pub(crate) struct SerializedFeature {
    pub record: Vec<u8>,
    pub limit_rect: RectD,
}

/// Assembles one feature and serialises it into the record format.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    type_indices: SmallVec<[u32; MAX_TYPES_COUNT]>,
    names: Vec<(u8, String)>,
    layer: Option<i8>,
    house_number: Option<String>,
    road_ref: Option<String>,
    rank: Option<u8>,
    geometry: Option<Geometry>,
    metadata: Metadata,
}

impl FeatureBuilder {
    /// Start an empty feature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a classificator type index.
    pub fn add_type(mut self, index: u32) -> Self {
        assert!(
            self.type_indices.len() < MAX_TYPES_COUNT,
            "a feature carries at most {MAX_TYPES_COUNT} types"
        );
        self.type_indices.push(index);
        self
    }

    /// Add a name in one language.
    pub fn with_name(mut self, lang: u8, name: impl Into<String>) -> Self {
        self.names.push((lang, name.into()));
        self
    }

    /// Set the draw layer.
    pub fn with_layer(mut self, layer: i8) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Set the house number.
    pub fn with_house_number(mut self, house: impl Into<String>) -> Self {
        self.house_number = Some(house.into());
        self
    }

    /// Set the road reference.
    pub fn with_ref(mut self, road_ref: impl Into<String>) -> Self {
        self.road_ref = Some(road_ref.into());
        self
    }

    /// Set the importance rank.
    pub fn with_rank(mut self, rank: u8) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Attach one metadata field.
    pub fn with_metadata(mut self, field: MetaField, value: impl Into<String>) -> Self {
        self.metadata.set(field, value.into());
        self
    }

    /// Point geometry.
    pub fn point(mut self, center: PointD) -> Self {
        self.geometry = Some(Geometry::Point(center));
        self
    }

    /// Inline polyline with per-intermediate simplification markers.
    ///
    /// `markers.len()` must equal `points.len() - 2`; each marker is the
    /// coarsest scale index (0..=3) at which its point survives
    /// simplification.
    pub fn inner_line(mut self, points: Vec<PointD>, markers: Vec<u8>) -> Self {
        assert!(
            (2..=MAX_INNER_POINTS).contains(&points.len()),
            "inner polyline carries 2..={MAX_INNER_POINTS} points"
        );
        assert_eq!(markers.len(), points.len() - 2, "one marker per intermediate point");
        assert!(markers.iter().all(|&m| m <= 3), "markers are 2-bit values");
        self.geometry = Some(Geometry::InnerLine { points, markers });
        self
    }

    /// Outer polyline: one full variant per container scale level.
    pub fn outer_line(mut self, variants: Vec<Option<Vec<PointD>>>) -> Self {
        self.geometry = Some(Geometry::OuterLine { variants });
        self
    }

    /// Inline triangle strip.
    pub fn inner_area(mut self, strip: Vec<PointD>) -> Self {
        assert!(
            (3..=MAX_INNER_POINTS + 2).contains(&strip.len()),
            "inner strip carries 3..={} points",
            MAX_INNER_POINTS + 2
        );
        self.geometry = Some(Geometry::InnerArea { strip });
        self
    }

    /// Outer triangle strip: one full variant per container scale level.
    pub fn outer_area(mut self, variants: Vec<Option<Vec<PointD>>>) -> Self {
        self.geometry = Some(Geometry::OuterArea { variants });
        self
    }

    /// The metadata attached so far.
    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn geom_type(&self) -> GeomType {
        match self.geometry.as_ref().expect("feature geometry must be set") {
            Geometry::Point(_) => GeomType::Point,
            Geometry::InnerLine { .. } | Geometry::OuterLine { .. } => GeomType::Line,
            Geometry::InnerArea { .. } | Geometry::OuterArea { .. } => GeomType::Area,
        }
    }

    /// Serialise into a record blob, appending outer geometry to the
    /// per-scale streams.
    pub(crate) fn serialize(
        &self,
        cp: &GeometryCodingParams,
        scales_count: usize,
        geometry_streams: &mut [Vec<u8>],
        triangle_streams: &mut [Vec<u8>],
    ) -> SerializedFeature {
        assert!(
            !self.type_indices.is_empty(),
            "a feature carries at least one type"
        );
        assert!(scales_count <= 4, "the outer mask addresses at most 4 levels");
        assert_eq!(geometry_streams.len(), scales_count);
        assert_eq!(triangle_streams.len(), scales_count);

        let mut record = Vec::new();
        let mut limit_rect = RectD::empty();

        // Header byte.
        let mut header = self.geom_type().header_bits();
        header |= ((self.type_indices.len() - 1) as u8) << HEADER_TYPES_SHIFT;
        if !self.names.is_empty() {
            header |= HEADER_HAS_NAME;
        }
        if self.layer.is_some() {
            header |= HEADER_HAS_LAYER;
        }
        let addendum = self.addendum_byte();
        if addendum != 0 {
            header |= HEADER_HAS_ADDENDUM;
        }
        record.push(header);

        // Types.
        for &index in &self.type_indices {
            write_varint_u32(&mut record, index);
        }

        // Common params.
        if !self.names.is_empty() {
            let mut body = Vec::new();
            for (lang, name) in &self.names {
                body.push(*lang);
                write_string(&mut body, name);
            }
            write_varint_u64(&mut record, body.len() as u64);
            record.extend_from_slice(&body);
        }
        if let Some(layer) = self.layer {
            record.push(layer as u8);
        }
        if addendum != 0 {
            record.push(addendum);
            if let Some(house) = &self.house_number {
                write_string(&mut record, house);
            }
            if let Some(road_ref) = &self.road_ref {
                write_string(&mut record, road_ref);
            }
            if let Some(rank) = self.rank {
                record.push(rank);
            }
        }

        // Geometry.
        match self.geometry.as_ref().expect("feature geometry must be set") {
            Geometry::Point(center) => {
                save_point(&mut record, *center, cp);
                limit_rect.add_point(*center);
            }
            Geometry::InnerLine { points, markers } => {
                record.push(points.len() as u8);
                for chunk in markers.chunks(4) {
                    let mut byte = 0u8;
                    for (i, &marker) in chunk.iter().enumerate() {
                        byte |= marker << (2 * i);
                    }
                    record.push(byte);
                }
                save_point_run(&mut record, points, cp);
                for &p in points {
                    limit_rect.add_point(p);
                }
            }
            Geometry::OuterLine { variants } => {
                let (first, mask) = check_variants(variants, scales_count, true);
                record.push(mask << 4);
                save_point(&mut record, first, cp);
                for (i, variant) in variants.iter().enumerate() {
                    if let Some(points) = variant {
                        write_varint_u32(&mut record, geometry_streams[i].len() as u32);
                        let stream_cp = cp.with_base_point(first);
                        save_outer_run(&mut geometry_streams[i], &points[1..], &stream_cp);
                        for &p in points {
                            limit_rect.add_point(p);
                        }
                    }
                }
            }
            Geometry::InnerArea { strip } => {
                record.push((strip.len() - 2) as u8);
                save_point_run(&mut record, strip, cp);
                for &p in strip {
                    limit_rect.add_point(p);
                }
            }
            Geometry::OuterArea { variants } => {
                let (_, mask) = check_variants(variants, scales_count, false);
                record.push(mask << 4);
                for (i, variant) in variants.iter().enumerate() {
                    if let Some(strip) = variant {
                        write_varint_u32(&mut record, triangle_streams[i].len() as u32);
                        save_outer_run(&mut triangle_streams[i], strip, cp);
                        for &p in strip {
                            limit_rect.add_point(p);
                        }
                    }
                }
            }
        }

        SerializedFeature { record, limit_rect }
    }

    fn addendum_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.house_number.is_some() {
            byte |= ADDENDUM_HAS_HOUSE;
        }
        if self.road_ref.is_some() {
            byte |= ADDENDUM_HAS_REF;
        }
        if self.rank.is_some() {
            byte |= ADDENDUM_HAS_RANK;
        }
        byte
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_varint_u64(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// Validate outer variants and compute the presence mask.
///
/// Line variants must share their first point: the decoder re-bases the
/// stream deltas onto the single header-stored point.
fn check_variants(
    variants: &[Option<Vec<PointD>>],
    scales_count: usize,
    shared_first: bool,
) -> (PointD, u8) {
    assert_eq!(
        variants.len(),
        scales_count,
        "one variant slot per container scale level"
    );

    let mut mask = 0u8;
    let mut first: Option<PointD> = None;
    for (i, variant) in variants.iter().enumerate() {
        if let Some(points) = variant {
            assert!(points.len() >= 2, "an outer variant carries at least 2 points");
            mask |= 1 << i;
            match first {
                None => first = Some(points[0]),
                Some(f) if shared_first => {
                    assert_eq!(points[0], f, "outer line variants share their first point")
                }
                Some(_) => {}
            }
        }
    }
    let first = first.expect("at least one outer variant must be present");
    (first, mask)
}

#[cfg(test)]
mod tests {
    use super::super::{HEADER_MASK_GEOM, HEADER_MASK_TYPES_COUNT};
    use super::*;

    #[test]
    fn test_header_encodes_kind_count_and_flags() {
        let cp = GeometryCodingParams::default();
        let built = FeatureBuilder::new()
            .add_type(7)
            .add_type(9)
            .with_name(0, "x")
            .with_layer(-1)
            .with_rank(100)
            .point(PointD::new(1.0, 2.0))
            .serialize(&cp, 1, &mut [Vec::new()], &mut [Vec::new()]);

        let header = built.record[0];
        assert_eq!(header & HEADER_MASK_GEOM, 0b00);
        assert_eq!((header & HEADER_MASK_TYPES_COUNT) >> 2, 1);
        assert_ne!(header & HEADER_HAS_NAME, 0);
        assert_ne!(header & HEADER_HAS_LAYER, 0);
        assert_ne!(header & HEADER_HAS_ADDENDUM, 0);
    }

    #[test]
    fn test_point_limit_rect_is_center() {
        let cp = GeometryCodingParams::default();
        let built = FeatureBuilder::new()
            .add_type(1)
            .point(PointD::new(10.0, -20.0))
            .serialize(&cp, 1, &mut [Vec::new()], &mut [Vec::new()]);

        assert!((built.limit_rect.min_x - 10.0).abs() < 1e-9);
        assert!((built.limit_rect.max_y - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_outer_line_appends_streams_and_mask() {
        let cp = GeometryCodingParams::default();
        let first = PointD::new(5.0, 5.0);
        let coarse = vec![first, PointD::new(6.0, 6.0)];
        let fine = vec![first, PointD::new(5.5, 5.5), PointD::new(6.0, 6.0)];

        let mut geometry = vec![Vec::new(), Vec::new()];
        let mut triangles = vec![Vec::new(), Vec::new()];
        let built = FeatureBuilder::new()
            .add_type(1)
            .outer_line(vec![Some(coarse), Some(fine)])
            .serialize(&cp, 2, &mut geometry, &mut triangles);

        assert!(!built.record.is_empty());
        assert!(!geometry[0].is_empty());
        assert!(!geometry[1].is_empty());
        assert!(triangles.iter().all(Vec::is_empty));
    }

    #[test]
    #[should_panic(expected = "share their first point")]
    fn test_outer_line_rejects_diverging_first_points() {
        let cp = GeometryCodingParams::default();
        FeatureBuilder::new()
            .add_type(1)
            .outer_line(vec![
                Some(vec![PointD::new(0.0, 0.0), PointD::new(1.0, 1.0)]),
                Some(vec![PointD::new(0.5, 0.0), PointD::new(1.0, 1.0)]),
            ])
            .serialize(&cp, 2, &mut [Vec::new(), Vec::new()], &mut [Vec::new(), Vec::new()]);
    }

    #[test]
    #[should_panic(expected = "at least one type")]
    fn test_missing_types_rejected() {
        let cp = GeometryCodingParams::default();
        FeatureBuilder::new()
            .point(PointD::new(0.0, 0.0))
            .serialize(&cp, 1, &mut [Vec::new()], &mut [Vec::new()]);
    }
}
