//! LRU cache of decoded blocks, keyed by block origin.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::geometry::Point;

/// Holds recently decoded blocks so that tile requests walking across a block
/// row do not repeat the seek-read-decode cycle for every overlapping tile.
///
/// Capacity is one full row of blocks; a raster scan then decodes each block
/// exactly once. The cache can be disabled, in which case lookups always miss
/// and insertions are dropped.
pub(crate) struct BlockCache {
  blocks: LruCache<Point, Vec<u8>>,
  enabled: bool,
}

impl BlockCache {
  /// A cache sized to hold `blocks_per_row` decoded blocks, initially
  /// disabled.
  pub fn new(blocks_per_row: u32) -> Self {
    let capacity = NonZeroUsize::new(blocks_per_row.max(1) as usize).unwrap();
    BlockCache {
      blocks: LruCache::new(capacity),
      enabled: false,
    }
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.blocks.clear();
    }
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn get(&mut self, origin: Point) -> Option<&Vec<u8>> {
    if !self.enabled {
      return None;
    }
    self.blocks.get(&origin)
  }

  pub fn put(&mut self, origin: Point, data: Vec<u8>) {
    if self.enabled {
      self.blocks.put(origin, data);
    }
  }

  /// Drops every cached block; the enable switch is unaffected.
  pub fn clear(&mut self) {
    self.blocks.clear();
  }

  /// Re-sizes the cache for a different block grid, dropping current
  /// contents.
  pub fn resize(&mut self, blocks_per_row: u32) {
    self.blocks.clear();
    let capacity = NonZeroUsize::new(blocks_per_row.max(1) as usize).unwrap();
    self.blocks.resize(capacity);
  }
}
