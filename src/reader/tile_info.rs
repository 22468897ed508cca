//! Per-tile work handle.
//!
//! A [`TileInfo`] is created when the read manager decides to read a
//! tile and shared between the manager's live set and the reader task(s)
//! on the pool. The cancellation flag is the only cross-thread signal:
//! monotonic, set once by the control thread, polled by workers at their
//! checkpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::coord::TileKey;

use super::mem_index::{MemoryIndex, MemoryTicket};

/// Handle to in-flight or completed work for one tile.
#[derive(Debug)]
pub struct TileInfo {
    key: TileKey,
    cancelled: AtomicBool,
    /// The tile's share of the memory index, attached by the first
    /// reader task to start.
    ticket: Mutex<Option<MemoryTicket>>,
}

impl TileInfo {
    /// Create a live, un-cancelled handle.
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            cancelled: AtomicBool::new(false),
            ticket: Mutex::new(None),
        }
    }

    /// The tile this handle reads.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Cancel the tile and release its memory share promptly.
    ///
    /// Monotonic: once set the flag never clears. Safe to call from the
    /// control thread while workers run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        *self.ticket.lock() = None;
    }

    /// Poll the cancellation flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Open the tile's memory ticket, unless one is already held or the
    /// tile is cancelled.
    ///
    /// A surviving tile re-enqueued by the manager can briefly run two
    /// tasks; the second call finds the slot taken and leaves the first
    /// task's accounting alone.
    pub(crate) fn ensure_ticket(&self, index: &Arc<MemoryIndex>) {
        let mut slot = self.ticket.lock();
        if !self.is_cancelled() && slot.is_none() {
            *slot = Some(index.acquire(self.key));
        }
    }

    /// Charge decoded bytes against the attached ticket, if any.
    pub(crate) fn record_bytes(&self, bytes: u64) {
        if let Some(ticket) = self.ticket.lock().as_ref() {
            ticket.add(bytes);
        }
    }

    /// Release the memory share at a task exit.
    pub(crate) fn release_ticket(&self) {
        *self.ticket.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryIndex;
    use std::sync::Arc;

    #[test]
    fn test_cancel_is_monotonic() {
        let info = TileInfo::new(TileKey::new(1, 2, 10));
        assert!(!info.is_cancelled());
        info.cancel();
        assert!(info.is_cancelled());
        info.cancel();
        assert!(info.is_cancelled());
    }

    #[test]
    fn test_cancel_releases_ticket() {
        let index = Arc::new(MemoryIndex::new());
        let info = TileInfo::new(TileKey::new(1, 2, 10));

        info.ensure_ticket(&index);
        info.record_bytes(64);
        assert_eq!(index.total_bytes(), 64);

        info.cancel();
        assert_eq!(index.tiles_count(), 0);
    }

    #[test]
    fn test_ensure_after_cancel_opens_nothing() {
        let index = Arc::new(MemoryIndex::new());
        let info = TileInfo::new(TileKey::new(1, 2, 10));

        info.cancel();
        info.ensure_ticket(&index);
        assert_eq!(index.tiles_count(), 0);
    }

    #[test]
    fn test_second_ensure_keeps_first_accounting() {
        let index = Arc::new(MemoryIndex::new());
        let info = TileInfo::new(TileKey::new(1, 2, 10));

        info.ensure_ticket(&index);
        info.record_bytes(10);
        // A second task of the same tile finds the slot taken; the
        // accounting of the first stays.
        info.ensure_ticket(&index);
        assert_eq!(index.tile_bytes(&info.key()), 10);

        info.release_ticket();
        assert_eq!(index.tiles_count(), 0);
    }
}
