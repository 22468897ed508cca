//! Interfaces to the map container and its catalogues.
//!
//! The reader core does not own a file format: it decodes feature
//! records and geometry streams that some container implementation hands
//! it. This module defines that boundary:
//!
//! - [`LoadInfo`]: the container's coding parameters, per-scale
//!   geometry/triangle streams and scale table
//! - [`FeatureSource`]: iteration over feature records overlapping a
//!   rectangle
//! - [`Classificator`]: the external catalogue resolving type indices
//! - [`MetadataDeserializer`]: the external metadata section reader
//!
//! [`MemoryContainer`] is a complete in-memory implementation fed by the
//! feature builder; the integration tests run the whole pipeline against
//! it.

mod memory;

pub use memory::{IdentityClassificator, MemoryContainer, MemoryContainerBuilder};

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::coord::RectD;
use crate::feature::{DecodeError, GeometryCodingParams, MetaField, Metadata};

/// Identifier of one feature within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Container-level data needed to decode a feature record.
///
/// A production container backs the byte accessors with mapped file
/// sections; offsets stored in feature records index into them.
pub trait LoadInfo: Send + Sync {
    /// Coding params for point features and inner geometry.
    fn default_coding_params(&self) -> GeometryCodingParams;

    /// Coding params of one per-scale geometry stream.
    fn coding_params(&self, scale_index: usize) -> GeometryCodingParams {
        let _ = scale_index;
        self.default_coding_params()
    }

    /// Number of geometry scale levels the container stores.
    fn scales_count(&self) -> usize;

    /// The coded scale value of one level.
    fn scale(&self, index: usize) -> i32;

    /// The container's finest coded scale.
    ///
    /// Oversized scale requests clamp through this; world-coastline
    /// containers stop well short of the grid's finest level.
    fn last_scale(&self) -> i32 {
        self.scale(self.scales_count() - 1)
    }

    /// The outer line-geometry stream of one scale level.
    fn geometry_bytes(&self, scale_index: usize) -> Result<&[u8], DecodeError>;

    /// The outer triangle stream of one scale level.
    fn triangle_bytes(&self, scale_index: usize) -> Result<&[u8], DecodeError>;
}

/// Iteration over feature records overlapping a rectangle.
pub trait FeatureSource: Send + Sync {
    /// Invoke `f` for every feature whose limit rect intersects `rect`
    /// at the given scale.
    ///
    /// The callback returns [`ControlFlow::Break`] to stop early (the
    /// reader task uses this for cooperative cancellation); an `Err`
    /// from the source itself signals an I/O failure and aborts the
    /// iteration.
    fn for_each(
        &self,
        rect: &RectD,
        scale: i32,
        f: &mut dyn FnMut(FeatureId, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), DecodeError>;
}

/// The external catalogue mapping type indices in feature records to
/// stable type identifiers.
pub trait Classificator: Send + Sync {
    /// Resolve a record's type index, `None` if the catalogue does not
    /// know it (newer container than catalogue).
    fn type_for_index(&self, index: u32) -> Option<u32>;

    /// The well-known placeholder type substituted for unresolvable
    /// indices.
    fn stub_type(&self) -> u32;
}

/// Reader of the container's metadata section.
pub trait MetadataDeserializer: Send + Sync {
    /// Materialise the full metadata of one feature.
    fn metadata(&self, feature: FeatureId) -> Result<Metadata, DecodeError>;

    /// The `(field, record id)` index of one feature, without pulling
    /// record bodies.
    fn meta_ids(&self, feature: FeatureId) -> Result<Vec<(MetaField, u32)>, DecodeError>;

    /// Pull a single metadata record body by id.
    fn meta_by_id(&self, id: u32) -> Result<String, DecodeError>;
}

/// The bundle of container collaborators a reader task decodes against.
#[derive(Clone)]
pub struct MapModel {
    pub source: Arc<dyn FeatureSource>,
    pub load_info: Arc<dyn LoadInfo>,
    pub classificator: Arc<dyn Classificator>,
    pub metadata: Arc<dyn MetadataDeserializer>,
}

impl MapModel {
    /// Bundle the four collaborators.
    pub fn new(
        source: Arc<dyn FeatureSource>,
        load_info: Arc<dyn LoadInfo>,
        classificator: Arc<dyn Classificator>,
        metadata: Arc<dyn MetadataDeserializer>,
    ) -> Self {
        Self {
            source,
            load_info,
            classificator,
            metadata,
        }
    }
}

impl fmt::Debug for MapModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapModel")
            .field("scales_count", &self.load_info.scales_count())
            .finish()
    }
}
