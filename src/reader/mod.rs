//! The tile reading subsystem.
//!
//! Four pieces cooperate to keep the engine fed with exactly the tiles
//! the camera can see:
//!
//! - [`ReadManager`]: diffs each viewport change against the live tile
//!   set and drives the pool (control thread only)
//! - [`TileReaderTask`]: decodes one tile's features on a pool worker
//! - [`WorkerPool`]: bounded threads over a front/back task deque
//! - [`MemoryIndex`] / [`TileInfo`]: shared accounting and the per-tile
//!   cancellation flag
//!
//! Decoded tiles are never cached across viewport changes: an evicted
//! tile that comes back is simply read again.

mod manager;
mod mem_index;
mod pool;
mod task;
mod tile_info;

pub use manager::{ReadManager, ReadManagerConfig};
pub use mem_index::{MemoryIndex, MemoryTicket};
pub use pool::{Routine, WorkerPool};
pub use task::TileReaderTask;
pub use tile_info::TileInfo;
