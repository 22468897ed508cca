//! Viewport-to-tile-grid mapping.
//!
//! The read manager schedules work in units of tiles: cells of a regular
//! quadtree grid laid over the mercator plane. This module decides which
//! grid the camera is looking at ([`tile_scale`]), which of its cells the
//! camera can see ([`enumerate_tiles`]), and when a camera change is
//! drastic enough that diffing the previous cover is pointless
//! ([`must_reset`]).

use std::collections::BTreeSet;

use crate::coord::{cell_size, TileKey, Viewport, MERCATOR_RANGE};

/// Finest tile scale the grid supports.
pub const MAX_TILE_SCALE: i32 = 19;

/// Coarsest tile scale the grid supports.
pub const MIN_TILE_SCALE: i32 = 1;

/// The tile scale appropriate for a viewport.
///
/// Chooses the finest scale whose cells are no smaller than the
/// viewport's longest clip-rect side, then steps one level finer so a
/// viewport is typically covered by a small handful of cells rather than
/// one. Pure: equal viewports always map to equal scales.
pub fn tile_scale(viewport: &Viewport) -> i32 {
    let clip = viewport.clip_rect();
    let longest = clip.width().max(clip.height());
    if longest <= 0.0 {
        return MAX_TILE_SCALE;
    }
    let scale = (MERCATOR_RANGE / longest).log2().floor() as i32 + 1;
    scale.clamp(MIN_TILE_SCALE, MAX_TILE_SCALE)
}

/// Enumerate every tile whose cell intersects the viewport's rotated
/// polygon, at the viewport's tile scale.
///
/// Walks the integer grid enclosed by the clip rectangle and keeps a
/// cell only if its axis-aligned rectangle intersects the rotated
/// polygon, so a rotated camera does not pull in the corner cells of its
/// own bounding box.
pub fn enumerate_tiles(viewport: &Viewport) -> BTreeSet<TileKey> {
    let scale = tile_scale(viewport);
    let size = cell_size(scale);
    let clip = viewport.clip_rect();

    let min_x = (clip.min_x / size).floor() as i32;
    let max_x = (clip.max_x / size).ceil() as i32;
    let min_y = (clip.min_y / size).floor() as i32;
    let max_y = (clip.max_y / size).ceil() as i32;

    let mut tiles = BTreeSet::new();
    for y in min_y..max_y {
        for x in min_x..max_x {
            let key = TileKey::new(x, y, scale);
            if viewport.intersects_rect(&key.mercator_rect()) {
                tiles.insert(key);
            }
        }
    }
    tiles
}

/// True if the camera moved so far that the previous tile cover must be
/// discarded wholesale instead of diffed.
///
/// Fires when the tile scale changes or when the old and new polygons no
/// longer overlap at all.
pub fn must_reset(old: &Viewport, new: &Viewport) -> bool {
    tile_scale(old) != tile_scale(new) || !old.intersects(new)
}
