//! Viewport-driven scheduling of tile reads.
//!
//! The read manager owns the live tile set and the worker pool. On every
//! camera change it enumerates the tiles the new viewport covers, diffs
//! them against the live set and turns the difference into pool
//! operations:
//!
//! - tiles that left the viewport are cancelled and their engine
//!   artefacts dropped
//! - tiles that stay are re-enqueued at the *front* of the queue, so
//!   in-view work preempts the freshly scheduled tiles behind it
//! - tiles that entered are enqueued at the back
//!
//! A scale change or a disjoint jump skips the diff entirely: everything
//! is cancelled and the new cover is scheduled from scratch.
//!
//! The manager runs on a single control thread and is not thread-safe
//! for concurrent updates; workers never touch the live set.

use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::container::MapModel;
use crate::coord::{TileKey, Viewport};
use crate::engine::{CoverageDescriptor, EngineContext};
use crate::scales;

use super::mem_index::MemoryIndex;
use super::pool::WorkerPool;
use super::task::TileReaderTask;
use super::tile_info::TileInfo;

/// Configuration of the read manager.
#[derive(Debug, Clone, Default)]
pub struct ReadManagerConfig {
    /// Worker thread count override. Defaults to
    /// `max(available cores - 2, 1)`, leaving room for the render and
    /// control threads.
    pub worker_threads: Option<usize>,
}

impl ReadManagerConfig {
    /// Override the worker thread count.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}

fn read_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(2)
        .max(1)
}

/// Maintains the live tile set for the current viewport.
pub struct ReadManager {
    context: Arc<dyn EngineContext>,
    model: MapModel,
    mem_index: Arc<MemoryIndex>,
    pool: WorkerPool,
    tiles: BTreeMap<TileKey, Arc<TileInfo>>,
    current_viewport: Option<Viewport>,
}

impl ReadManager {
    /// Create a manager with the default worker count.
    pub fn new(context: Arc<dyn EngineContext>, model: MapModel) -> Self {
        Self::with_config(context, model, ReadManagerConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(
        context: Arc<dyn EngineContext>,
        model: MapModel,
        config: ReadManagerConfig,
    ) -> Self {
        let threads = config.worker_threads.unwrap_or_else(read_count);
        info!(threads, "starting tile read manager");
        Self {
            context,
            model,
            mem_index: Arc::new(MemoryIndex::new()),
            pool: WorkerPool::new(threads),
            tiles: BTreeMap::new(),
            current_viewport: None,
        }
    }

    /// Process a camera change.
    ///
    /// An update with an unchanged viewport is a no-op: no pool
    /// mutation, no descriptor calls.
    pub fn update_coverage(&mut self, viewport: &Viewport, descriptor: &mut dyn CoverageDescriptor) {
        if self.current_viewport.as_ref() == Some(viewport) {
            return;
        }

        let new_tiles = scales::enumerate_tiles(viewport);
        let reset = match &self.current_viewport {
            None => true,
            Some(old) => scales::must_reset(old, viewport),
        };

        if reset {
            debug!(tiles = new_tiles.len(), "full tile reset");
            for info in self.tiles.values() {
                info.cancel();
            }
            self.tiles.clear();

            for &key in &new_tiles {
                self.push_task_back(key);
            }
            descriptor.drop_all();
        } else {
            // Tiles that went out of the viewport.
            let outdated: SmallVec<[Arc<TileInfo>; 8]> = self
                .tiles
                .values()
                .filter(|info| !new_tiles.contains(&info.key()))
                .cloned()
                .collect();

            // Tiles that came into the viewport.
            let incoming: SmallVec<[TileKey; 8]> = new_tiles
                .iter()
                .filter(|key| !self.tiles.contains_key(key))
                .copied()
                .collect();

            debug!(
                outdated = outdated.len(),
                surviving = self.tiles.len() - outdated.len(),
                incoming = incoming.len(),
                "incremental coverage update"
            );

            let mut outdated_keys: SmallVec<[TileKey; 16]> = SmallVec::new();
            for info in &outdated {
                info.cancel();
                self.tiles.remove(&info.key());
                outdated_keys.push(info.key());
            }
            descriptor.drop_tiles(&outdated_keys);

            // Re-prioritise the survivors: their fresh tasks run before
            // the incoming tiles queued behind them. The survivor is not
            // cancelled, so its original task may still run too; engine
            // delivery is idempotent per (tile, feature id).
            for info in self.tiles.values() {
                self.push_task_front(info);
            }
            for &key in &incoming {
                self.push_task_back(key);
            }
        }

        self.current_viewport = Some(*viewport);
    }

    /// Cancel everything and join the workers, discarding queued tasks.
    pub fn stop(&mut self) {
        for info in self.tiles.values() {
            info.cancel();
        }
        self.tiles.clear();
        self.pool.stop();
    }

    /// Keys of the tiles currently scheduled or running.
    pub fn live_tiles(&self) -> Vec<TileKey> {
        self.tiles.keys().copied().collect()
    }

    /// The shared memory-pressure index.
    pub fn memory_index(&self) -> &Arc<MemoryIndex> {
        &self.mem_index
    }

    /// Tasks waiting in the pool queue.
    pub fn queued_tasks(&self) -> usize {
        self.pool.queued()
    }

    fn push_task_back(&mut self, key: TileKey) {
        let info = Arc::new(TileInfo::new(key));
        self.tiles.insert(key, Arc::clone(&info));
        self.pool.push_back(Box::new(self.make_task(info)));
    }

    fn push_task_front(&self, info: &Arc<TileInfo>) {
        self.pool.push_front(Box::new(self.make_task(Arc::clone(info))));
    }

    fn make_task(&self, info: Arc<TileInfo>) -> TileReaderTask {
        TileReaderTask::new(
            info,
            Arc::clone(&self.mem_index),
            self.model.clone(),
            Arc::clone(&self.context),
        )
    }
}

impl Drop for ReadManager {
    fn drop(&mut self) {
        self.stop();
    }
}
