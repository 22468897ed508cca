//! Delta coding of geometry points.
//!
//! Points are quantised onto an unsigned integer grid
//! ([`GeometryCodingParams`]) and stored as deltas: each point is coded
//! relative to its predecessor (the first relative to the params' base
//! point). A delta is the bit-interleave of the two zigzagged axis
//! deltas, written as one varint.
//!
//! Inner geometry is a plain delta chain inside the record. Outer
//! geometry lives in a per-scale stream as a point-count varint followed
//! by a delta chain; outer *line* streams are decoded against coding
//! params re-based onto the feature's header-stored first point, outer
//! *area* streams against the container default base.

use crate::coord::{PointD, PointU, MERCATOR_MIN, MERCATOR_RANGE};

use super::bits::{
    bitwise_merge, bitwise_split, write_varint_u64, zigzag_decode, zigzag_encode, ByteReader,
};
use super::error::DecodeError;

/// Default grid resolution in bits per axis.
pub const DEFAULT_COORD_BITS: u8 = 30;

/// Quantisation parameters for point coding.
///
/// `coord_bits` fixes the grid resolution (`2^coord_bits` cells per
/// axis over the mercator span); `base` anchors the first delta of a
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryCodingParams {
    coord_bits: u8,
    base: PointU,
}

impl GeometryCodingParams {
    /// Create params with the given resolution and a base at the grid
    /// origin.
    pub fn new(coord_bits: u8) -> Self {
        debug_assert!(coord_bits > 0 && coord_bits <= 31);
        Self {
            coord_bits,
            base: PointU::new(0, 0),
        }
    }

    /// Grid resolution in bits per axis.
    pub fn coord_bits(&self) -> u8 {
        self.coord_bits
    }

    /// Base point of the delta chain.
    pub fn base(&self) -> PointU {
        self.base
    }

    /// Re-base the chain onto a mercator point.
    ///
    /// Outer line streams are coded against the feature's first point
    /// rather than the container default, so the first stream delta
    /// stays small.
    pub fn with_base_point(mut self, p: PointD) -> Self {
        self.base = self.to_grid(p);
        self
    }

    /// Largest representable grid coordinate.
    fn grid_max(&self) -> u32 {
        if self.coord_bits == 31 {
            u32::MAX >> 1
        } else {
            (1u32 << self.coord_bits) - 1
        }
    }

    /// Quantise a mercator point onto the grid.
    pub fn to_grid(&self, p: PointD) -> PointU {
        let max = self.grid_max() as f64;
        let scale = max / MERCATOR_RANGE;
        let x = ((p.x - MERCATOR_MIN) * scale).round().clamp(0.0, max) as u32;
        let y = ((p.y - MERCATOR_MIN) * scale).round().clamp(0.0, max) as u32;
        PointU::new(x, y)
    }

    /// Map a grid point back onto the mercator plane.
    pub fn from_grid(&self, p: PointU) -> PointD {
        let scale = MERCATOR_RANGE / self.grid_max() as f64;
        PointD::new(
            MERCATOR_MIN + f64::from(p.x) * scale,
            MERCATOR_MIN + f64::from(p.y) * scale,
        )
    }

    /// Half a grid cell: the worst-case quantisation error per axis.
    pub fn precision(&self) -> f64 {
        MERCATOR_RANGE / self.grid_max() as f64 / 2.0
    }
}

impl Default for GeometryCodingParams {
    fn default() -> Self {
        Self::new(DEFAULT_COORD_BITS)
    }
}

// =============================================================================
// Single points
// =============================================================================

/// Code one grid point relative to `base`.
pub fn encode_delta(curr: PointU, base: PointU) -> u64 {
    let dx = i64::from(curr.x) - i64::from(base.x);
    let dy = i64::from(curr.y) - i64::from(base.y);
    bitwise_merge(zigzag_encode(dx) as u32, zigzag_encode(dy) as u32)
}

/// Inverse of [`encode_delta`].
pub fn decode_delta(value: u64, base: PointU) -> PointU {
    let (zx, zy) = bitwise_split(value);
    let dx = zigzag_decode(u64::from(zx));
    let dy = zigzag_decode(u64::from(zy));
    PointU::new(
        (i64::from(base.x) + dx) as u32,
        (i64::from(base.y) + dy) as u32,
    )
}

/// Read one point coded against the params' base.
pub fn load_point(src: &mut ByteReader<'_>, cp: &GeometryCodingParams) -> Result<PointD, DecodeError> {
    let value = src.read_varint_u64()?;
    Ok(cp.from_grid(decode_delta(value, cp.base())))
}

/// Write one point coded against the params' base.
pub fn save_point(out: &mut Vec<u8>, p: PointD, cp: &GeometryCodingParams) {
    write_varint_u64(out, encode_delta(cp.to_grid(p), cp.base()));
}

// =============================================================================
// Point runs
// =============================================================================

/// Read a delta chain of `count` points starting from the params' base.
pub fn load_point_run(
    src: &mut ByteReader<'_>,
    count: usize,
    cp: &GeometryCodingParams,
    out: &mut Vec<PointD>,
) -> Result<(), DecodeError> {
    let mut prev = cp.base();
    out.reserve(count);
    for _ in 0..count {
        let value = src.read_varint_u64()?;
        let curr = decode_delta(value, prev);
        out.push(cp.from_grid(curr));
        prev = curr;
    }
    Ok(())
}

/// Write a delta chain starting from the params' base.
pub fn save_point_run(out: &mut Vec<u8>, points: &[PointD], cp: &GeometryCodingParams) {
    let mut prev = cp.base();
    for &p in points {
        let curr = cp.to_grid(p);
        write_varint_u64(out, encode_delta(curr, prev));
        prev = curr;
    }
}

/// Read an outer geometry stream record: a point-count varint followed
/// by a delta chain.
///
/// Returns the number of stream bytes consumed.
pub fn load_outer_run(
    src: &mut ByteReader<'_>,
    cp: &GeometryCodingParams,
    out: &mut Vec<PointD>,
) -> Result<u32, DecodeError> {
    let start = src.pos();
    let count = src.read_varint_u32()? as usize;
    load_point_run(src, count, cp, out)?;
    Ok((src.pos() - start) as u32)
}

/// Write an outer geometry stream record.
pub fn save_outer_run(out: &mut Vec<u8>, points: &[PointD], cp: &GeometryCodingParams) {
    write_varint_u64(out, points.len() as u64);
    save_point_run(out, points, cp);
}
