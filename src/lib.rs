//! vectile: viewport-driven tile reading for a vector map renderer.
//!
//! The crate watches a logical camera on the Web-Mercator plane and
//! keeps a rendering engine supplied with decoded vector features, one
//! quadtree tile at a time:
//!
//! - [`scales`] maps a viewport to a tile scale and enumerates the grid
//!   cells it covers
//! - [`reader`] diffs viewport changes against the live tile set and
//!   decodes tiles on a bounded worker pool with cooperative
//!   cancellation
//! - [`feature`] is the staged lazy decoder for the binary feature
//!   records, including per-scale level-of-detail selection
//! - [`container`] and [`engine`] define the boundaries to the map
//!   container below and the graphics back-end above
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vectile::container::MapModel;
//! use vectile::coord::{RectD, Viewport};
//! use vectile::reader::ReadManager;
//!
//! let model: MapModel = open_container()?;
//! let mut manager = ReadManager::new(engine_context, model);
//!
//! // On every camera change:
//! let viewport = Viewport::axis_aligned(RectD::new(37.5, 55.5, 37.7, 55.8));
//! manager.update_coverage(&viewport, &mut descriptor);
//!
//! // On shutdown:
//! manager.stop();
//! ```

pub mod container;
pub mod coord;
pub mod engine;
pub mod feature;
pub mod reader;
pub mod scales;

pub use container::{FeatureId, MapModel};
pub use coord::{PointD, RectD, TileKey, Viewport};
pub use engine::{CoverageDescriptor, DecodedFeature, EngineContext, FeatureGeometry};
pub use feature::{DecodeError, Feature, FeatureBuilder, GeomType};
pub use reader::{ReadManager, ReadManagerConfig};
