use crate::{
  error::{RasterFormatError, RasterResult},
  geometry::{Point, Rect},
  layout::{Compression, ImageLayout, MaskTable, ReadMode, VQ_BLOCK_SIZE},
};

/// Height of one read strip for single-block images.
///
/// A single-block image is not pulled into memory whole; it is read in
/// full-width strips so large images behave like general rasters.
pub(crate) const STRIP_HEIGHT: u32 = 64;

/// Computed values for addressing blocks within one image entry.
///
/// `cache_width`/`cache_height` are the pixel dimensions of one decode unit:
/// the declared block for blocked images, one full-width strip for
/// single-block images.
#[derive(Debug)]
pub(crate) struct BlockGrid {
  read_mode: ReadMode,
  data_offset: u64,
  image_rect: Rect,
  cache_width: u32,
  cache_height: u32,
  grid_cols: u32,
  /// Block count as declared by the layout, not the strip count.
  declared_blocks: u64,
  bands: u32,
  bits_per_sample: u32,
  /// Stream stride unit of one block: per band for band-sequential modes,
  /// the whole pixel-interleaved block otherwise.
  block_size: u64,
  /// Bytes issued by one full read call.
  read_size: u64,
}

impl BlockGrid {
  pub fn from_layout(layout: &ImageLayout, read_mode: ReadMode, bands: u32) -> RasterResult<Self> {
    if layout.width == 0 || layout.height == 0 {
      return Err(RasterFormatError::InvalidDimensions(layout.width, layout.height).into());
    }
    if layout.block_width == 0 || layout.block_height == 0 {
      return Err(
        RasterFormatError::InvalidBlockDimensions(layout.block_width, layout.block_height).into(),
      );
    }
    // Wide arithmetic: the products can exceed u32 for large declared grids.
    if u64::from(layout.blocks_per_row) * u64::from(layout.block_width) < u64::from(layout.width)
      || u64::from(layout.blocks_per_col) * u64::from(layout.block_height)
        < u64::from(layout.height)
    {
      return Err(RasterFormatError::InconsistentBlockGrid.into());
    }

    let single_block = !layout.multi_block();
    let strip_mode = matches!(read_mode, ReadMode::Bib | ReadMode::Bip | ReadMode::Bir);

    let (cache_width, cache_height, grid_cols) = if strip_mode {
      let strip = STRIP_HEIGHT.min(layout.height);
      (layout.width, strip, 1)
    } else {
      (layout.block_width, layout.block_height, layout.blocks_per_row)
    };

    let image_rect = Rect::from_origin_size(Point::new(0, 0), layout.width, layout.height);

    let bits = layout.bits_per_sample;
    let vq = matches!(layout.compression, Compression::Vq | Compression::VqMasked);
    // Sub-byte depths round up to whole bytes.
    let bytes_block = if vq {
      VQ_BLOCK_SIZE
    } else {
      (u64::from(layout.block_width) * u64::from(layout.block_height) * u64::from(bits))
        .div_ceil(8)
    };
    let bytes_strip =
      (u64::from(cache_width) * u64::from(cache_height) * u64::from(bits)).div_ceil(8);

    let mut block_size = bytes_block;
    let mut read_size = bytes_block;
    match read_mode {
      ReadMode::BsqBlock | ReadMode::BibBlock => {}
      ReadMode::Bib => {
        read_size = bytes_strip;
      }
      ReadMode::BipBlock | ReadMode::BirBlock => {
        block_size *= u64::from(bands);
        read_size *= u64::from(bands);
      }
      ReadMode::Bip | ReadMode::Bir => {
        block_size *= u64::from(bands);
        read_size = bytes_strip * u64::from(bands);
      }
    }

    let declared_blocks = if single_block {
      1
    } else {
      u64::from(layout.blocks_per_row) * u64::from(layout.blocks_per_col)
    };

    Ok(BlockGrid {
      read_mode,
      data_offset: layout.data_offset,
      image_rect,
      cache_width,
      cache_height,
      grid_cols,
      declared_blocks,
      bands,
      bits_per_sample: bits,
      block_size,
      read_size,
    })
  }

  pub fn cache_width(&self) -> u32 {
    self.cache_width
  }

  pub fn cache_height(&self) -> u32 {
    self.cache_height
  }

  pub fn grid_cols(&self) -> u32 {
    self.grid_cols
  }

  pub fn image_rect(&self) -> Rect {
    self.image_rect
  }

  pub fn read_size(&self) -> u64 {
    self.read_size
  }

  /// The rectangle the block at `origin` nominally covers; may extend past
  /// the image bounds for edge blocks.
  pub fn block_rect_at(&self, origin: Point) -> Rect {
    Rect::from_origin_size(origin, self.cache_width, self.cache_height)
  }

  /// Index of the block containing `origin` in the stream's block ordering.
  ///
  /// Blocked images number row-major across the grid; strip-read images
  /// number strips top to bottom.
  pub fn block_number(&self, origin: Point) -> u64 {
    let bx = u64::from(origin.x as u32 / self.cache_width);
    let by = u64::from(origin.y as u32 / self.cache_height);
    match self.read_mode {
      ReadMode::BibBlock | ReadMode::BipBlock | ReadMode::BirBlock | ReadMode::BsqBlock => {
        by * u64::from(self.grid_cols) + bx
      }
      ReadMode::Bib | ReadMode::Bip | ReadMode::Bir => by,
    }
  }

  /// Per-band stride within one block's span of the stream.
  fn band_offset(&self) -> u64 {
    match self.read_mode {
      ReadMode::BsqBlock => self.declared_blocks * self.block_size,
      _ => self.block_size,
    }
  }

  /// Stride between consecutive blocks in the stream.
  fn block_offset(&self) -> u64 {
    let unit = if self.declared_blocks == 1 { self.read_size } else { self.block_size };
    match self.read_mode {
      ReadMode::BibBlock | ReadMode::Bib => unit * u64::from(self.bands),
      _ => unit,
    }
  }

  /// Stream offset of the block at `origin` for `band`.
  ///
  /// Returns `None` when the mask table marks the block as not physically
  /// stored; the caller treats the block as blank.
  pub fn position(&self, origin: Point, band: u32, mask: Option<&MaskTable>) -> Option<u64> {
    let n = self.block_number(origin);
    let mut pos = self.data_offset;
    if let Some(m) = mask {
      pos += m.offset(n, band)?;
    }
    let masked = mask.is_some();

    match self.read_mode {
      ReadMode::BibBlock => {
        if masked {
          pos += self.band_offset() * u64::from(band);
        } else {
          pos += n * self.block_offset() + self.band_offset() * u64::from(band);
        }
      }
      ReadMode::Bib => {
        pos += n * self.read_size + self.band_offset() * u64::from(band);
      }
      ReadMode::BsqBlock => {
        if !masked {
          pos += n * self.block_offset() + self.band_offset() * u64::from(band);
        }
      }
      ReadMode::BipBlock | ReadMode::BirBlock | ReadMode::Bip | ReadMode::Bir => {
        if !masked {
          pos += n * self.block_offset();
        }
      }
    }
    Some(pos)
  }

  /// Byte count to read for the block at `origin`, reduced when the block
  /// extends past the image bounds.
  ///
  /// Only vertical clipping shrinks the read: rows are stored at full block
  /// width, so horizontally clipped edge blocks still read whole rows.
  pub fn partial_read_size(&self, origin: Point) -> u64 {
    let rect = self.block_rect_at(origin);
    if rect.completely_within(&self.image_rect) {
      return self.read_size;
    }
    let clip = match rect.clip_to(&self.image_rect) {
      Some(c) => c,
      None => return 0,
    };
    let mut result = (u64::from(self.cache_width)
      * u64::from(clip.height())
      * u64::from(self.bits_per_sample))
    .div_ceil(8);
    match self.read_mode {
      ReadMode::BipBlock | ReadMode::BirBlock | ReadMode::Bip | ReadMode::Bir => {
        result *= u64::from(self.bands);
      }
      _ => {}
    }
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::ImageLayout;

  fn layout_256x256x3_bsq() -> ImageLayout {
    ImageLayout {
      width: 256,
      height: 256,
      bands: 3,
      bits_per_sample: 8,
      block_width: 64,
      block_height: 64,
      blocks_per_row: 4,
      blocks_per_col: 4,
      imode: 'S',
      data_offset: 1000,
      ..Default::default()
    }
  }

  #[test]
  fn bsq_block_positions() {
    let layout = layout_256x256x3_bsq();
    let grid = BlockGrid::from_layout(&layout, ReadMode::BsqBlock, 3).unwrap();

    let origin = Point::new(64, 64);
    assert_eq!(grid.block_number(origin), 5);

    // All blocks of band 0 precede band 1: dataStart + blocks*blockBytes*band
    // + blockNumber*blockBytes.
    let block_bytes = 64 * 64;
    let expected = 1000 + 16 * block_bytes * 1 + 5 * block_bytes;
    assert_eq!(grid.position(origin, 1, None), Some(expected));
    assert_eq!(grid.position(Point::new(0, 0), 0, None), Some(1000));
  }

  #[test]
  fn bib_block_positions() {
    let layout = ImageLayout { imode: 'B', ..layout_256x256x3_bsq() };
    let grid = BlockGrid::from_layout(&layout, ReadMode::BibBlock, 3).unwrap();

    // Bands of one block are contiguous; blocks stride by bands*blockBytes.
    let block_bytes = 64 * 64u64;
    assert_eq!(grid.position(Point::new(0, 0), 2, None), Some(1000 + 2 * block_bytes));
    assert_eq!(
      grid.position(Point::new(64, 64), 1, None),
      Some(1000 + 5 * 3 * block_bytes + block_bytes)
    );
  }

  #[test]
  fn bip_block_positions() {
    let layout = ImageLayout { imode: 'P', ..layout_256x256x3_bsq() };
    let grid = BlockGrid::from_layout(&layout, ReadMode::BipBlock, 3).unwrap();

    // One interleaved read covers all bands.
    let block_bytes = 64 * 64 * 3u64;
    assert_eq!(grid.read_size(), block_bytes);
    assert_eq!(grid.position(Point::new(128, 0), 0, None), Some(1000 + 2 * block_bytes));
  }

  #[test]
  fn strip_numbering_for_single_block() {
    let layout = ImageLayout {
      width: 512,
      height: 300,
      bands: 1,
      bits_per_sample: 8,
      block_width: 512,
      block_height: 300,
      blocks_per_row: 1,
      blocks_per_col: 1,
      imode: 'B',
      ..Default::default()
    };
    let grid = BlockGrid::from_layout(&layout, ReadMode::Bib, 1).unwrap();

    assert_eq!(grid.cache_width(), 512);
    assert_eq!(grid.cache_height(), STRIP_HEIGHT);
    assert_eq!(grid.block_number(Point::new(0, 128)), 2);
    // Strips are sequential in the stream.
    let strip_bytes = 512 * 64u64;
    assert_eq!(grid.position(Point::new(0, 128), 0, None), Some(2 * strip_bytes));
    // Last strip is short: 300 - 4*64 = 44 rows.
    assert_eq!(grid.partial_read_size(Point::new(0, 256)), 512 * 44);
  }

  #[test]
  fn partial_read_smaller_than_nominal() {
    let layout = ImageLayout {
      width: 100,
      height: 100,
      bands: 1,
      block_width: 64,
      block_height: 64,
      blocks_per_row: 2,
      blocks_per_col: 2,
      imode: 'S',
      ..Default::default()
    };
    let grid = BlockGrid::from_layout(&layout, ReadMode::BsqBlock, 1).unwrap();

    assert_eq!(grid.partial_read_size(Point::new(0, 0)), 64 * 64);
    // Bottom row blocks carry only 36 valid rows, read at full block width.
    assert_eq!(grid.partial_read_size(Point::new(0, 64)), 64 * 36);
    assert_eq!(grid.partial_read_size(Point::new(64, 64)), 64 * 36);
    // Right-edge block at full height still reads whole rows.
    assert_eq!(grid.partial_read_size(Point::new(64, 0)), 64 * 64);
  }

  #[test]
  fn sub_byte_partial_reads_round_up_to_whole_bytes() {
    let layout = ImageLayout {
      width: 4,
      height: 99,
      bands: 1,
      bits_per_sample: 1,
      block_width: 4,
      block_height: 64,
      blocks_per_row: 1,
      blocks_per_col: 2,
      imode: 'B',
      compression: Compression::PackedBits,
      ..Default::default()
    };
    let grid = BlockGrid::from_layout(&layout, ReadMode::BibBlock, 1).unwrap();

    // 4 * 64 bits = exactly 32 bytes for a full block.
    assert_eq!(grid.read_size(), 32);
    // The last block holds 35 valid rows: 140 bits round up to 18 bytes.
    assert_eq!(grid.partial_read_size(Point::new(0, 64)), 18);
  }

  #[test]
  fn huge_grids_validate_in_wide_arithmetic() {
    // blocks_per_row * block_width exceeds u32 but covers the image.
    let layout = ImageLayout {
      width: 1 << 30,
      height: 1 << 30,
      bands: 1,
      block_width: 1 << 20,
      block_height: 1 << 20,
      blocks_per_row: 1 << 13,
      blocks_per_col: 1 << 13,
      imode: 'S',
      ..Default::default()
    };
    assert!(BlockGrid::from_layout(&layout, ReadMode::BsqBlock, 1).is_ok());
  }

  #[test]
  fn masked_absent_block() {
    use crate::layout::{MaskTable, BLOCK_ABSENT};

    let layout = ImageLayout {
      width: 128,
      height: 64,
      bands: 1,
      block_width: 64,
      block_height: 64,
      blocks_per_row: 2,
      blocks_per_col: 1,
      imode: 'B',
      ..Default::default()
    };
    let grid = BlockGrid::from_layout(&layout, ReadMode::BibBlock, 1).unwrap();
    let mask = MaskTable::new(vec![vec![0], vec![BLOCK_ABSENT]]);

    assert_eq!(grid.position(Point::new(0, 0), 0, Some(&mask)), Some(0));
    assert_eq!(grid.position(Point::new(64, 0), 0, Some(&mask)), None);
  }

  #[test]
  fn inconsistent_grid_rejected() {
    let layout = ImageLayout {
      width: 300,
      height: 300,
      bands: 1,
      block_width: 64,
      block_height: 64,
      blocks_per_row: 4, // 4 * 64 < 300
      blocks_per_col: 5,
      imode: 'S',
      ..Default::default()
    };
    assert!(BlockGrid::from_layout(&layout, ReadMode::BsqBlock, 1).is_err());
  }

  #[test]
  fn position_agrees_with_incremental_walk() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let layout = layout_256x256x3_bsq();
    let grid = BlockGrid::from_layout(&layout, ReadMode::BsqBlock, 3).unwrap();
    let block_bytes = 64 * 64u64;

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..64 {
      let bx = rng.gen_range(0..4);
      let by = rng.gen_range(0..4);
      let band = rng.gen_range(0..3u32);
      let origin = Point::new(bx * 64, by * 64);

      // Walk block numbers incrementally from zero.
      let mut walked = 0u64;
      for _ in 0..grid.block_number(origin) {
        walked += 1;
      }
      let expected = 1000 + u64::from(band) * 16 * block_bytes + walked * block_bytes;
      assert_eq!(grid.position(origin, band, None), Some(expected));
    }
  }
}
