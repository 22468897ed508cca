//! The per-tile read routine.
//!
//! One task reads one tile: it queries the feature source for records
//! overlapping the tile's mercator rectangle, decodes each record to the
//! tile's scale and appends the result to the engine context. Between
//! features and between decode stages it polls its [`TileInfo`]'s
//! cancellation flag; a cancelled task releases the tile's memory share
//! and returns without finishing the iteration.
//!
//! Failure stays local: a corrupt record is logged and skipped, a
//! container I/O error aborts this tile only. The manager is not told;
//! the next viewport pass re-enqueues the tile if it is still visible.

use std::ops::ControlFlow;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, error, warn};

use crate::container::{FeatureId, MapModel};
use crate::engine::{DecodedFeature, EngineContext, FeatureGeometry};
use crate::feature::{DecodeError, Feature, GeomType};

use super::mem_index::MemoryIndex;
use super::pool::Routine;
use super::tile_info::TileInfo;

/// Reads one tile's features and feeds them to the engine.
pub struct TileReaderTask {
    tile_info: Arc<TileInfo>,
    mem_index: Arc<MemoryIndex>,
    model: MapModel,
    context: Arc<dyn EngineContext>,
}

impl TileReaderTask {
    /// Parameterise a task for one tile.
    pub fn new(
        tile_info: Arc<TileInfo>,
        mem_index: Arc<MemoryIndex>,
        model: MapModel,
        context: Arc<dyn EngineContext>,
    ) -> Self {
        Self {
            tile_info,
            mem_index,
            model,
            context,
        }
    }

    fn read_tile(&self) {
        let key = self.tile_info.key();
        if self.tile_info.is_cancelled() {
            self.tile_info.release_ticket();
            return;
        }
        self.tile_info.ensure_ticket(&self.mem_index);

        let rect = key.mercator_rect();
        let scale = key.z;
        debug!(tile = %key, "reading tile");

        let mut delivered = 0usize;
        let result = self.model.source.for_each(&rect, scale, &mut |id, bytes| {
            if self.tile_info.is_cancelled() {
                return ControlFlow::Break(());
            }

            match decode_feature(&self.model, &self.tile_info, id, bytes, scale) {
                Ok(Some(feature)) => {
                    self.tile_info.record_bytes(bytes.len() as u64);
                    self.context.append_feature(key, feature);
                    delivered += 1;
                }
                Ok(None) => {
                    // Cancelled mid-decode, or invisible at this scale.
                }
                Err(err) => {
                    warn!(tile = %key, feature = %id, %err, "skipping corrupt feature");
                }
            }
            ControlFlow::Continue(())
        });

        match result {
            Ok(()) if self.tile_info.is_cancelled() => {
                debug!(tile = %key, delivered, "tile read cancelled")
            }
            Ok(()) => debug!(tile = %key, delivered, "tile read complete"),
            // No retry: the tile stays read-attempted until the viewport
            // brings it back.
            Err(err) => error!(tile = %key, %err, "tile read aborted"),
        }

        self.tile_info.release_ticket();
    }
}

impl Routine for TileReaderTask {
    fn run(&mut self) {
        self.read_tile();
    }
}

/// Decode one record to the tile's scale.
///
/// Returns `Ok(None)` when the tile was cancelled between stages or the
/// feature has no geometry at this scale.
fn decode_feature(
    model: &MapModel,
    tile_info: &TileInfo,
    id: FeatureId,
    bytes: &[u8],
    scale: i32,
) -> Result<Option<DecodedFeature>, DecodeError> {
    let mut feature = Feature::new(
        &*model.load_info,
        &*model.classificator,
        &*model.metadata,
        id,
        bytes.to_vec(),
    )?;

    feature.parse_common()?;
    if tile_info.is_cancelled() {
        return Ok(None);
    }

    let geometry = match feature.geom_type() {
        GeomType::Point => FeatureGeometry::Point(feature.center()?),
        GeomType::Line => {
            feature.parse_geometry(scale)?;
            FeatureGeometry::Line(feature.points().to_vec())
        }
        GeomType::Area => FeatureGeometry::Area(feature.triangles_as_points(scale)?.to_vec()),
    };
    if geometry.is_empty() {
        return Ok(None);
    }

    let limit_rect = feature.limit_rect(scale)?;
    let types = SmallVec::from_slice(feature.types()?);
    let layer = feature.layer()?;
    let rank = feature.rank()?;

    Ok(Some(DecodedFeature {
        id,
        types,
        layer,
        rank,
        geometry,
        limit_rect,
    }))
}
