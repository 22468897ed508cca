//! Error types for feature record decoding.

use thiserror::Error;

/// Errors that can occur while decoding a feature record or its
/// geometry streams.
///
/// A corrupt record never takes its tile down: the reader task logs the
/// error, skips the feature and moves on. Stream errors abort the tile
/// without retry.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The record or stream ended before a read completed.
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },

    /// A varint ran past its maximum encoded length.
    #[error("varint exceeds {bits}-bit range at byte {offset}")]
    VarintOverflow { offset: usize, bits: u32 },

    /// The header byte carries a geometry kind outside the known set.
    #[error("invalid geometry kind {value:#04x} in header byte")]
    InvalidGeomKind { value: u8 },

    /// A string field held bytes that are not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// The record buffer was empty.
    #[error("empty feature record")]
    EmptyRecord,

    /// The geometry prefix carried an inner point count the format
    /// forbids (a one-point polyline).
    #[error("malformed geometry prefix: inner point count {count}")]
    BadInnerCount { count: u8 },

    /// The outer-geometry mask addresses more scale levels than the
    /// container stores.
    #[error("outer mask {mask:#06b} addresses more levels than container stores ({scales})")]
    MaskOverflow { mask: u8, scales: usize },

    /// The container has no geometry stream at the given scale index.
    #[error("no geometry stream for scale index {index}")]
    MissingStream { index: usize },

    /// An offset into a geometry stream pointed past its end.
    #[error("offset {offset} outside geometry stream of {len} bytes")]
    BadStreamOffset { offset: u32, len: usize },

    /// Reading the container backing store failed.
    #[error("container read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata deserializer rejected its blob.
    #[error("metadata record unavailable: {0}")]
    Metadata(String),
}
