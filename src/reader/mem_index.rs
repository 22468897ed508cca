//! Shared memory-pressure accounting for in-flight tiles.
//!
//! Every reader task charges the bytes it decodes against a
//! [`MemoryIndex`] shared across the pool, under a per-tile
//! [`MemoryTicket`]. Releasing the ticket, on completion or on
//! cancellation, forgets the tile's share, so the index always reflects
//! what the live tiles currently hold.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::coord::TileKey;

/// Byte accounting shared by all reader tasks.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    tiles: Mutex<BTreeMap<TileKey, u64>>,
}

impl MemoryIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a ticket for one tile.
    ///
    /// The tile appears in the index immediately, with zero bytes.
    pub fn acquire(self: &Arc<Self>, tile: TileKey) -> MemoryTicket {
        self.tiles.lock().entry(tile).or_insert(0);
        MemoryTicket {
            index: Arc::clone(self),
            tile,
        }
    }

    fn add(&self, tile: TileKey, bytes: u64) {
        if let Some(entry) = self.tiles.lock().get_mut(&tile) {
            *entry += bytes;
        }
    }

    fn forget(&self, tile: TileKey) {
        self.tiles.lock().remove(&tile);
    }

    /// Total bytes charged across all live tiles.
    pub fn total_bytes(&self) -> u64 {
        self.tiles.lock().values().sum()
    }

    /// Bytes charged by one tile, zero if it holds no ticket.
    pub fn tile_bytes(&self, tile: &TileKey) -> u64 {
        self.tiles.lock().get(tile).copied().unwrap_or(0)
    }

    /// Number of tiles currently holding a ticket.
    pub fn tiles_count(&self) -> usize {
        self.tiles.lock().len()
    }
}

/// One tile's share of the [`MemoryIndex`].
///
/// Dropping the ticket releases the share; an explicit
/// [`MemoryTicket::release`] reads better at cancellation checkpoints.
#[derive(Debug)]
pub struct MemoryTicket {
    index: Arc<MemoryIndex>,
    tile: TileKey,
}

impl MemoryTicket {
    /// Charge decoded bytes against the tile.
    pub fn add(&self, bytes: u64) {
        self.index.add(self.tile, bytes);
    }

    /// Release the tile's share back to the index.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for MemoryTicket {
    fn drop(&mut self) {
        self.index.forget(self.tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> TileKey {
        TileKey::new(x, 0, 10)
    }

    #[test]
    fn test_acquire_charges_zero() {
        let index = Arc::new(MemoryIndex::new());
        let ticket = index.acquire(key(1));

        assert_eq!(index.tiles_count(), 1);
        assert_eq!(index.total_bytes(), 0);
        drop(ticket);
    }

    #[test]
    fn test_add_accumulates() {
        let index = Arc::new(MemoryIndex::new());
        let ticket = index.acquire(key(1));
        ticket.add(100);
        ticket.add(50);

        assert_eq!(index.tile_bytes(&key(1)), 150);
        assert_eq!(index.total_bytes(), 150);
        drop(ticket);
    }

    #[test]
    fn test_release_forgets_tile() {
        let index = Arc::new(MemoryIndex::new());
        let a = index.acquire(key(1));
        let b = index.acquire(key(2));
        a.add(10);
        b.add(20);

        a.release();
        assert_eq!(index.tiles_count(), 1);
        assert_eq!(index.total_bytes(), 20);
        assert_eq!(index.tile_bytes(&key(1)), 0);

        drop(b);
        assert_eq!(index.total_bytes(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let index = Arc::new(MemoryIndex::new());
        {
            let ticket = index.acquire(key(3));
            ticket.add(5);
        }
        assert_eq!(index.tiles_count(), 0);
    }
}
