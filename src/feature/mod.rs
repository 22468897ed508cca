//! Staged lazy decoding of binary feature records.
//!
//! A feature record is a variable-length byte blob: a header byte,
//! varint-coded type indices, common params (names, house number,
//! addendum fields), a bit-packed geometry prefix and finally the
//! geometry itself, either inline ("inner") for small features or offsets
//! into per-scale container streams ("outer") for large ones.
//!
//! [`Feature`] parses this lazily, one stage at a time:
//!
//! ```text
//! types ──► common ──► header2 ──► points / triangles
//!                                  (per requested scale)
//! metadata, meta-ids: independent side branches
//! ```
//!
//! Every `parse_*` drives the chain up to its own stage and is
//! idempotent; [`Feature::reset_geometry`] rolls back only the geometry
//! stages so the same record can be re-read at a different scale without
//! re-parsing types or names.

pub mod bits;
mod builder;
mod error;
mod metadata;
mod serial;

pub use builder::FeatureBuilder;
pub use error::DecodeError;
pub use metadata::{MetaField, Metadata};
pub use serial::{
    load_outer_run, load_point, load_point_run, save_outer_run, save_point, save_point_run,
    GeometryCodingParams, DEFAULT_COORD_BITS,
};

use smallvec::SmallVec;
use tracing::{error, warn};

use crate::container::{Classificator, FeatureId, LoadInfo, MetadataDeserializer};
use crate::coord::{PointD, RectD};

use bits::{BitReader, ByteReader};

// =============================================================================
// Header layout
// =============================================================================

pub(crate) const HEADER_MASK_GEOM: u8 = 0b0000_0011;
pub(crate) const HEADER_MASK_TYPES_COUNT: u8 = 0b0001_1100;
pub(crate) const HEADER_TYPES_SHIFT: u32 = 2;
pub(crate) const HEADER_HAS_NAME: u8 = 0b0010_0000;
pub(crate) const HEADER_HAS_LAYER: u8 = 0b0100_0000;
pub(crate) const HEADER_HAS_ADDENDUM: u8 = 0b1000_0000;

pub(crate) const ADDENDUM_HAS_HOUSE: u8 = 0b0000_0001;
pub(crate) const ADDENDUM_HAS_REF: u8 = 0b0000_0010;
pub(crate) const ADDENDUM_HAS_RANK: u8 = 0b0000_0100;

/// Most type indices one feature may carry.
pub const MAX_TYPES_COUNT: usize = 8;

/// Sentinel scale: the finest geometry the feature stores.
pub const BEST_GEOMETRY: i32 = -1;

/// Sentinel scale: the coarsest geometry the feature stores.
pub const WORST_GEOMETRY: i32 = -2;

/// Marks an absent per-scale geometry offset.
const INVALID_OFFSET: u32 = u32::MAX;

/// Geometry kind of a feature, from the header byte's two low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomType {
    Point,
    Line,
    Area,
}

impl GeomType {
    fn from_header(header: u8) -> Result<Self, DecodeError> {
        match header & HEADER_MASK_GEOM {
            0b00 => Ok(Self::Point),
            0b01 => Ok(Self::Line),
            0b10 => Ok(Self::Area),
            value => Err(DecodeError::InvalidGeomKind { value }),
        }
    }

    pub(crate) fn header_bits(self) -> u8 {
        match self {
            Self::Point => 0b00,
            Self::Line => 0b01,
            Self::Area => 0b10,
        }
    }
}

// =============================================================================
// Scale-to-index mapping
// =============================================================================

fn clamp_scale(load_info: &dyn LoadInfo, scale: i32) -> i32 {
    // Sentinels are negative and pass through untouched.
    let last = load_info.last_scale();
    if scale > last {
        last
    } else {
        scale
    }
}

/// Index of the container scale level serving `scale`.
///
/// After clamping through the container's last scale the request always
/// lands on a level, so this never fails.
fn scale_index(load_info: &dyn LoadInfo, scale: i32) -> usize {
    let count = load_info.scales_count();
    match clamp_scale(load_info, scale) {
        WORST_GEOMETRY => 0,
        BEST_GEOMETRY => count - 1,
        scale => {
            for i in 0..count {
                if scale <= load_info.scale(i) {
                    return i;
                }
            }
            count - 1
        }
    }
}

/// Index of the populated per-feature offset serving `scale`, `None`
/// when the feature stores no geometry at the level the scale maps to.
fn scale_index_with_offsets(
    load_info: &dyn LoadInfo,
    scale: i32,
    offsets: &[u32],
) -> Option<usize> {
    let count = offsets.len();
    if count == 0 {
        return None;
    }
    match clamp_scale(load_info, scale) {
        BEST_GEOMETRY => (0..count).rev().find(|&i| offsets[i] != INVALID_OFFSET),
        WORST_GEOMETRY => (0..count).find(|&i| offsets[i] != INVALID_OFFSET),
        scale => {
            for i in 0..load_info.scales_count() {
                if scale <= load_info.scale(i) {
                    // No scan past the mapped level: an unpopulated
                    // offset here means the caller falls back explicitly.
                    return (i < count && offsets[i] != INVALID_OFFSET).then_some(i);
                }
            }
            None
        }
    }
}

// =============================================================================
// Record helpers
// =============================================================================

fn read_string(
    src: &mut ByteReader<'_>,
    field: &'static str,
) -> Result<String, DecodeError> {
    let len = src.read_varint_u32()? as usize;
    let bytes = src.read_bytes(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| DecodeError::InvalidUtf8 { field })
}

fn read_name_blob(
    src: &mut ByteReader<'_>,
) -> Result<SmallVec<[(u8, String); 2]>, DecodeError> {
    let body_len = src.read_varint_u32()? as usize;
    let end = src.pos() + body_len;
    let mut names = SmallVec::new();
    while src.pos() < end {
        let lang = src.read_u8()?;
        let value = read_string(src, "name")?;
        names.push((lang, value));
    }
    if src.pos() != end {
        return Err(DecodeError::UnexpectedEof { offset: end });
    }
    Ok(names)
}

fn read_offsets(
    src: &mut ByteReader<'_>,
    mut mask: u8,
    scales_count: usize,
    out: &mut SmallVec<[u32; 4]>,
) -> Result<(), DecodeError> {
    debug_assert!(out.is_empty());
    out.resize(scales_count, INVALID_OFFSET);

    let full_mask = mask;
    let mut ind = 0usize;
    while mask > 0 {
        if mask & 0x01 != 0 {
            if ind >= scales_count {
                return Err(DecodeError::MaskOverflow {
                    mask: full_mask,
                    scales: scales_count,
                });
            }
            out[ind] = src.read_varint_u32()?;
        }
        ind += 1;
        mask >>= 1;
    }
    Ok(())
}

fn calc_rect(points: &[PointD], rect: &mut RectD) {
    for &p in points {
        rect.add_point(p);
    }
}

// =============================================================================
// Parse state
// =============================================================================

/// Which stages of the record have been parsed. Monotonic per feature
/// except through [`Feature::reset_geometry`].
#[derive(Debug, Clone, Copy, Default)]
struct ParsedFlags {
    types: bool,
    common: bool,
    header2: bool,
    points: bool,
    triangles: bool,
    metadata: bool,
    meta_ids: bool,
}

/// Byte offsets of later stages, recorded as earlier stages finish.
#[derive(Debug, Clone, Default)]
struct Offsets {
    common: usize,
    header2: usize,
    pts: SmallVec<[u32; 4]>,
    trg: SmallVec<[u32; 4]>,
}

/// Byte sizes of the inline parts of the record, for tuning reports.
#[derive(Debug, Clone, Copy, Default)]
struct InnerStats {
    points: u32,
    strips: u32,
}

/// Size report for one feature's geometry at one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeomStat {
    /// Coded byte size of the geometry read.
    pub bytes: u32,
    /// Number of decoded elements (points).
    pub elements: usize,
}

// =============================================================================
// Feature
// =============================================================================

/// One feature record, decoded lazily against its container.
pub struct Feature<'a> {
    load_info: &'a dyn LoadInfo,
    classificator: &'a dyn Classificator,
    metadata_source: &'a dyn MetadataDeserializer,

    id: FeatureId,
    data: Vec<u8>,
    header: u8,

    parsed: ParsedFlags,
    offsets: Offsets,
    inner_stats: InnerStats,

    types: SmallVec<[u32; MAX_TYPES_COUNT]>,
    names: SmallVec<[(u8, String); 2]>,
    house_number: String,
    road_ref: String,
    layer: i8,
    rank: u8,

    center: PointD,
    points: Vec<PointD>,
    triangles: Vec<PointD>,
    pts_simp_mask: u32,
    limit_rect: RectD,

    metadata: Metadata,
    meta_ids: Vec<(MetaField, u32)>,
}

impl<'a> Feature<'a> {
    /// Wrap a record buffer for decoding.
    ///
    /// Fails only on an empty buffer or an unknown geometry kind; all
    /// further validation happens as stages parse.
    pub fn new(
        load_info: &'a dyn LoadInfo,
        classificator: &'a dyn Classificator,
        metadata_source: &'a dyn MetadataDeserializer,
        id: FeatureId,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let header = *data.first().ok_or(DecodeError::EmptyRecord)?;
        GeomType::from_header(header)?;

        Ok(Self {
            load_info,
            classificator,
            metadata_source,
            id,
            data,
            header,
            parsed: ParsedFlags::default(),
            offsets: Offsets::default(),
            inner_stats: InnerStats::default(),
            types: SmallVec::new(),
            names: SmallVec::new(),
            house_number: String::new(),
            road_ref: String::new(),
            layer: 0,
            rank: 0,
            center: PointD::default(),
            points: Vec::new(),
            triangles: Vec::new(),
            pts_simp_mask: 0,
            limit_rect: RectD::empty(),
            metadata: Metadata::new(),
            meta_ids: Vec::new(),
        })
    }

    /// The feature's container id.
    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// Geometry kind, available without parsing.
    pub fn geom_type(&self) -> GeomType {
        // Validated in the constructor.
        match self.header & HEADER_MASK_GEOM {
            0b01 => GeomType::Line,
            0b10 => GeomType::Area,
            _ => GeomType::Point,
        }
    }

    /// Number of type indices the header declares.
    pub fn types_count(&self) -> usize {
        (((self.header & HEADER_MASK_TYPES_COUNT) >> HEADER_TYPES_SHIFT) + 1) as usize
    }

    fn has_name(&self) -> bool {
        self.header & HEADER_HAS_NAME != 0
    }

    fn has_layer(&self) -> bool {
        self.header & HEADER_HAS_LAYER != 0
    }

    fn has_addendum(&self) -> bool {
        self.header & HEADER_HAS_ADDENDUM != 0
    }

    // -------------------------------------------------------------------------
    // Parse stages
    // -------------------------------------------------------------------------

    /// Parse the type-index section.
    ///
    /// Indices the classificator cannot resolve are replaced by its stub
    /// type and logged; the feature is kept.
    pub fn parse_types(&mut self) -> Result<(), DecodeError> {
        if self.parsed.types {
            return Ok(());
        }

        let mut src = ByteReader::new(&self.data);
        src.seek(1)?;

        let count = (((self.header & HEADER_MASK_TYPES_COUNT) >> HEADER_TYPES_SHIFT) + 1) as usize;
        for _ in 0..count {
            let index = src.read_varint_u32()?;
            match self.classificator.type_for_index(index) {
                Some(t) => self.types.push(t),
                None => {
                    // Possible for newer containers with added types.
                    warn!(
                        feature = %self.id,
                        index,
                        "unresolvable type index, substituting stub type"
                    );
                    self.types.push(self.classificator.stub_type());
                }
            }
        }

        self.offsets.common = src.pos();
        self.parsed.types = true;
        Ok(())
    }

    /// Parse the common params: names, layer, addendum fields and (for
    /// point features) the centre point.
    pub fn parse_common(&mut self) -> Result<(), DecodeError> {
        if self.parsed.common {
            return Ok(());
        }
        self.parse_types()?;

        let cp = self.load_info.default_coding_params();
        let mut src = ByteReader::new(&self.data);
        src.seek(self.offsets.common)?;

        if self.has_name() {
            self.names = read_name_blob(&mut src)?;
        }
        if self.has_layer() {
            self.layer = src.read_u8()? as i8;
        }
        if self.has_addendum() {
            let addendum = src.read_u8()?;
            if addendum & ADDENDUM_HAS_HOUSE != 0 {
                self.house_number = read_string(&mut src, "house number")?;
            }
            if addendum & ADDENDUM_HAS_REF != 0 {
                self.road_ref = read_string(&mut src, "road ref")?;
            }
            if addendum & ADDENDUM_HAS_RANK != 0 {
                self.rank = src.read_u8()?;
            }
        }

        if self.geom_type() == GeomType::Point {
            self.center = load_point(&mut src, &cp)?;
            self.limit_rect.add_point(self.center);
        }

        self.offsets.header2 = src.pos();
        self.parsed.common = true;
        Ok(())
    }

    /// Parse the geometry prefix: inline geometry, or the per-scale
    /// offset tables for geometry stored in the container streams.
    pub fn parse_header2(&mut self) -> Result<(), DecodeError> {
        if self.parsed.header2 {
            return Ok(());
        }
        self.parse_common()?;

        let geom = self.geom_type();
        if geom == GeomType::Point {
            self.parsed.header2 = true;
            return Ok(());
        }

        let scales_count = self.load_info.scales_count();
        let cp = self.load_info.default_coding_params();

        let mut pts_count = 0u8;
        let mut pts_mask = 0u8;
        let mut trg_count = 0u8;
        let mut trg_mask = 0u8;

        let mut bits = BitReader::new(&self.data, self.offsets.header2);
        match geom {
            GeomType::Line => {
                pts_count = bits.read(4)?;
                if pts_count == 0 {
                    pts_mask = bits.read(4)?;
                } else if pts_count < 2 {
                    return Err(DecodeError::BadInnerCount { count: pts_count });
                }
            }
            GeomType::Area => {
                trg_count = bits.read(4)?;
                if trg_count == 0 {
                    trg_mask = bits.read(4)?;
                }
            }
            GeomType::Point => unreachable!(),
        }

        let mut src = ByteReader::new(&self.data);
        src.seek(bits.align())?;

        match geom {
            GeomType::Line => {
                if pts_count > 0 {
                    // Inner geometry: simplification mask bytes, then the
                    // delta-coded run.
                    let mask_bytes = (pts_count as usize).saturating_sub(2).div_ceil(4);
                    for i in 0..mask_bytes {
                        let byte = src.read_u8()?;
                        self.pts_simp_mask |= u32::from(byte) << (i << 3);
                    }

                    let start = src.pos();
                    load_point_run(&mut src, pts_count as usize, &cp, &mut self.points)?;
                    self.inner_stats.points = (src.pos() - start) as u32;
                } else {
                    // Outer geometry: the first point lives in the record,
                    // the rest in per-scale streams.
                    self.points.push(load_point(&mut src, &cp)?);
                    read_offsets(&mut src, pts_mask, scales_count, &mut self.offsets.pts)?;
                }
            }
            GeomType::Area => {
                if trg_count > 0 {
                    let start = src.pos();
                    load_point_run(
                        &mut src,
                        trg_count as usize + 2,
                        &cp,
                        &mut self.triangles,
                    )?;
                    self.inner_stats.strips = (src.pos() - start) as u32;
                } else {
                    read_offsets(&mut src, trg_mask, scales_count, &mut self.offsets.trg)?;
                }
            }
            GeomType::Point => unreachable!(),
        }

        self.parsed.header2 = true;
        Ok(())
    }

    /// Parse line geometry for the requested scale.
    ///
    /// Inner geometry is filtered through the simplification mask; when
    /// filtering would leave only the endpoints, the intermediates at
    /// the coarsest stored marker are re-included so the polyline keeps
    /// its shape at extreme simplification. Outer geometry falls back to
    /// the coarsest populated level when the mapped level is absent.
    ///
    /// Returns the number of stream bytes read (zero for inner
    /// geometry).
    pub fn parse_geometry(&mut self, scale: i32) -> Result<u32, DecodeError> {
        if self.parsed.points {
            return Ok(0);
        }
        self.parse_header2()?;

        let mut sz = 0u32;
        if self.geom_type() == GeomType::Line {
            let li = self.load_info;
            let count = self.points.len();
            if count < 2 {
                // Outer geometry.
                let ind = scale_index_with_offsets(li, scale, &self.offsets.pts)
                    .or_else(|| scale_index_with_offsets(li, WORST_GEOMETRY, &self.offsets.pts));
                match ind {
                    Some(ind) => {
                        let stream = li.geometry_bytes(ind)?;
                        let offset = self.offsets.pts[ind];
                        let mut src = ByteReader::new(stream);
                        src.seek(offset as usize).map_err(|_| {
                            DecodeError::BadStreamOffset {
                                offset,
                                len: stream.len(),
                            }
                        })?;

                        let cp = li.coding_params(ind).with_base_point(self.points[0]);
                        sz = load_outer_run(&mut src, &cp, &mut self.points)?;
                    }
                    None => self.points.clear(),
                }
            } else {
                // Filter inner geometry by the simplification mask.
                let scale_ind = scale_index(li, scale);
                debug_assert!(scale_ind < li.scales_count());

                let marker = |i: usize| ((self.pts_simp_mask >> (2 * (i - 1))) & 0x3) as usize;

                let mut filtered = Vec::with_capacity(count);
                filtered.push(self.points[0]);
                for i in 1..count - 1 {
                    if marker(i) <= scale_ind {
                        filtered.push(self.points[i]);
                    }
                }
                if filtered.len() == 1 {
                    // Everything simplified away: keep the coarsest stored
                    // level instead of collapsing to a segment.
                    if let Some(min_marker) = (1..count - 1).map(marker).min() {
                        for i in 1..count - 1 {
                            if marker(i) == min_marker {
                                filtered.push(self.points[i]);
                            }
                        }
                    }
                }
                filtered.push(self.points[count - 1]);

                self.points = filtered;
            }

            calc_rect(&self.points, &mut self.limit_rect);
        }

        self.parsed.points = true;
        Ok(sz)
    }

    /// Parse area geometry (a triangle strip) for the requested scale.
    ///
    /// Returns the number of stream bytes read (zero for inner
    /// geometry).
    pub fn parse_triangles(&mut self, scale: i32) -> Result<u32, DecodeError> {
        if self.parsed.triangles {
            return Ok(0);
        }
        self.parse_header2()?;

        let mut sz = 0u32;
        if self.geom_type() == GeomType::Area {
            let li = self.load_info;
            if self.triangles.is_empty() {
                let ind = scale_index_with_offsets(li, scale, &self.offsets.trg)
                    .or_else(|| scale_index_with_offsets(li, WORST_GEOMETRY, &self.offsets.trg));
                if let Some(ind) = ind {
                    let stream = li.triangle_bytes(ind)?;
                    let offset = self.offsets.trg[ind];
                    let mut src = ByteReader::new(stream);
                    src.seek(offset as usize)
                        .map_err(|_| DecodeError::BadStreamOffset {
                            offset,
                            len: stream.len(),
                        })?;

                    sz = load_outer_run(&mut src, &li.coding_params(ind), &mut self.triangles)?;
                }
            }

            calc_rect(&self.triangles, &mut self.limit_rect);
        }

        self.parsed.triangles = true;
        Ok(sz)
    }

    /// Parse both geometry branches for the requested scale.
    pub fn parse_geometry_and_triangles(&mut self, scale: i32) -> Result<(), DecodeError> {
        self.parse_geometry(scale)?;
        self.parse_triangles(scale)?;
        Ok(())
    }

    /// Roll back the geometry stages so a different scale can be parsed.
    ///
    /// Types and common params survive; only header2, points and
    /// triangles re-parse.
    pub fn reset_geometry(&mut self) {
        self.points.clear();
        self.triangles.clear();

        if self.geom_type() != GeomType::Point {
            self.limit_rect = RectD::empty();
        }

        self.parsed.header2 = false;
        self.parsed.points = false;
        self.parsed.triangles = false;
        self.offsets.pts.clear();
        self.offsets.trg.clear();
        self.pts_simp_mask = 0;
    }

    /// Materialise the feature's full metadata.
    ///
    /// A deserialiser failure is logged and the stage still completes
    /// with an empty result.
    pub fn parse_metadata(&mut self) {
        if self.parsed.metadata {
            return;
        }
        match self.metadata_source.metadata(self.id) {
            Ok(meta) => self.metadata = meta,
            Err(err) => error!(feature = %self.id, %err, "error reading metadata"),
        }
        self.parsed.metadata = true;
    }

    /// Read only the `(field, record id)` metadata index.
    pub fn parse_meta_ids(&mut self) {
        if self.parsed.meta_ids {
            return;
        }
        match self.metadata_source.meta_ids(self.id) {
            Ok(ids) => self.meta_ids = ids,
            Err(err) => error!(feature = %self.id, %err, "error reading metadata index"),
        }
        self.parsed.meta_ids = true;
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Resolved type identifiers.
    pub fn types(&mut self) -> Result<&[u32], DecodeError> {
        self.parse_types()?;
        Ok(&self.types)
    }

    /// Name in the given language, if stored.
    pub fn name(&mut self, lang: u8) -> Result<Option<&str>, DecodeError> {
        if !self.has_name() {
            return Ok(None);
        }
        self.parse_common()?;
        Ok(self
            .names
            .iter()
            .find(|(l, _)| *l == lang)
            .map(|(_, s)| s.as_str()))
    }

    /// All stored `(language, name)` pairs.
    pub fn names(&mut self) -> Result<&[(u8, String)], DecodeError> {
        self.parse_common()?;
        Ok(&self.names)
    }

    /// Draw layer; zero without parsing when the header says the field
    /// is absent.
    pub fn layer(&mut self) -> Result<i8, DecodeError> {
        if !self.has_layer() {
            return Ok(0);
        }
        self.parse_common()?;
        Ok(self.layer)
    }

    /// House number, empty if absent.
    pub fn house_number(&mut self) -> Result<&str, DecodeError> {
        self.parse_common()?;
        Ok(&self.house_number)
    }

    /// Road reference, empty if absent.
    pub fn road_ref(&mut self) -> Result<&str, DecodeError> {
        self.parse_common()?;
        Ok(&self.road_ref)
    }

    /// Importance rank, zero if absent.
    pub fn rank(&mut self) -> Result<u8, DecodeError> {
        self.parse_common()?;
        Ok(self.rank)
    }

    /// Centre of a point feature.
    pub fn center(&mut self) -> Result<PointD, DecodeError> {
        debug_assert_eq!(self.geom_type(), GeomType::Point);
        self.parse_common()?;
        Ok(self.center)
    }

    /// Number of polyline points; geometry must be parsed.
    pub fn points_count(&self) -> usize {
        debug_assert!(self.parsed.points);
        self.points.len()
    }

    /// One polyline point; geometry must be parsed.
    pub fn point(&self, i: usize) -> PointD {
        debug_assert!(self.parsed.points);
        self.points[i]
    }

    /// The polyline parsed so far.
    pub fn points(&self) -> &[PointD] {
        debug_assert!(self.parsed.points);
        &self.points
    }

    /// Triangle strip of an area feature at the requested scale.
    pub fn triangles_as_points(&mut self, scale: i32) -> Result<&[PointD], DecodeError> {
        self.parse_triangles(scale)?;
        Ok(&self.triangles)
    }

    /// Bounding rect of the geometry at the requested scale.
    ///
    /// Zero-area when the feature stores no geometry at that scale, so
    /// visibility checks treat it as invisible.
    pub fn limit_rect(&mut self, scale: i32) -> Result<RectD, DecodeError> {
        self.parse_geometry_and_triangles(scale)?;

        if self.triangles.is_empty()
            && self.points.is_empty()
            && self.geom_type() != GeomType::Point
        {
            self.limit_rect = RectD::zero();
        }
        Ok(self.limit_rect)
    }

    /// True if the feature decodes to no geometry at the requested
    /// scale.
    pub fn is_empty_geometry(&mut self, scale: i32) -> Result<bool, DecodeError> {
        self.parse_geometry_and_triangles(scale)?;
        Ok(match self.geom_type() {
            GeomType::Area => self.triangles.is_empty(),
            GeomType::Line => self.points.is_empty(),
            GeomType::Point => false,
        })
    }

    /// Coded size and element count of the line geometry at a scale.
    pub fn geometry_size(&mut self, scale: i32) -> Result<GeomStat, DecodeError> {
        let mut bytes = self.parse_geometry(scale)?;
        if bytes == 0 && !self.points.is_empty() {
            bytes = self.inner_stats.points;
        }
        Ok(GeomStat {
            bytes,
            elements: self.points.len(),
        })
    }

    /// Coded size and element count of the triangle geometry at a scale.
    pub fn triangles_size(&mut self, scale: i32) -> Result<GeomStat, DecodeError> {
        let mut bytes = self.parse_triangles(scale)?;
        if bytes == 0 && !self.triangles.is_empty() {
            bytes = self.inner_stats.strips;
        }
        Ok(GeomStat {
            bytes,
            elements: self.triangles.len(),
        })
    }

    /// The fully-materialised metadata map.
    pub fn metadata(&mut self) -> &Metadata {
        self.parse_metadata();
        &self.metadata
    }

    /// One metadata field, hydrating a single record on demand.
    ///
    /// Prefers already-materialised metadata; otherwise consults the
    /// id index and pulls just the one record.
    pub fn metadata_field(&mut self, field: MetaField) -> Option<&str> {
        self.parse_meta_ids();

        if !self.metadata.has(field) {
            if let Some(&(_, id)) = self.meta_ids.iter().find(|(f, _)| *f == field) {
                match self.metadata_source.meta_by_id(id) {
                    Ok(value) => {
                        self.metadata.set(field, value);
                    }
                    Err(err) => {
                        error!(feature = %self.id, %field, %err, "error hydrating metadata record")
                    }
                }
            }
        }
        self.metadata.get(field)
    }

    /// True if the feature has the metadata field, checking the id index
    /// without pulling record bodies.
    pub fn has_metadata_field(&mut self, field: MetaField) -> bool {
        self.parse_meta_ids();
        self.metadata.has(field) || self.meta_ids.iter().any(|(f, _)| *f == field)
    }

    /// Multi-line description of the parsed feature, for logs.
    pub fn debug_string(&mut self, scale: i32) -> Result<String, DecodeError> {
        use std::fmt::Write;

        self.parse_common()?;
        let mut out = String::from("types:");
        for t in &self.types {
            let _ = write!(out, " {t}");
        }

        self.parse_geometry_and_triangles(scale)?;
        let key_point = match self.geom_type() {
            GeomType::Point => Some(self.center),
            GeomType::Line => self.points.first().copied(),
            GeomType::Area => self.triangles.first().copied(),
        };
        if let Some(p) = key_point {
            let _ = write!(out, "\nkey point: {p}");
        }
        Ok(out)
    }
}
