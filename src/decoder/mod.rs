//! Random access to decoded tiles of a blocked raster stream.

use std::io::{Read, Seek};

pub use self::stream::ByteOrder;
use self::{
  block::BlockGrid,
  cache::BlockCache,
  reassemble::{reassemble, Interleave},
  stream::SmartReader,
};
use crate::{
  error::{RasterFormatError, RasterResult, UnsupportedLayoutError},
  geometry::{Point, Rect},
  layout::{Compression, ImageLayout, ReadMode, SampleType},
};

pub(crate) mod block;
pub(crate) mod cache;
pub(crate) mod decompress;
pub(crate) mod reassemble;
pub(crate) mod stream;

/// How much of a tile carries real image data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileStatus {
  /// Every sample is the null value.
  Empty,
  /// Some samples are null: edge tiles, absent blocks, transparent pixels.
  Partial,
  /// No sample is null.
  Full,
}

/// One decoded tile: band-sequential samples in host byte order.
#[derive(Debug, Clone)]
pub struct Tile {
  rect: Rect,
  bands: u32,
  sample_type: SampleType,
  data: Vec<u8>,
  status: TileStatus,
}

impl Tile {
  fn filled_with_null(rect: Rect, bands: u32, sample_type: SampleType, null: u32) -> Tile {
    let len = rect.area() as usize * bands as usize * sample_type.byte_len();
    let mut data = vec![0u8; len];
    if null != 0 {
      fill_null(&mut data, sample_type, null);
    }
    Tile { rect, bands, sample_type, data, status: TileStatus::Empty }
  }

  /// Image-space rectangle this tile covers.
  pub fn rect(&self) -> Rect {
    self.rect
  }

  pub fn bands(&self) -> u32 {
    self.bands
  }

  pub fn sample_type(&self) -> SampleType {
    self.sample_type
  }

  pub fn status(&self) -> TileStatus {
    self.status
  }

  /// All sample bytes, band after band.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// The sample bytes of one band plane.
  pub fn band(&self, band: u32) -> &[u8] {
    let plane = self.rect.area() as usize * self.sample_type.byte_len();
    let start = band as usize * plane;
    &self.data[start..start + plane]
  }

  /// Classifies the tile by scanning for null samples.
  fn validate(&mut self, null: u32) {
    let byte_len = self.sample_type.byte_len();
    let total = self.data.len() / byte_len;
    let nulls = match self.sample_type {
      SampleType::U8 => {
        let null = null as u8;
        self.data.iter().filter(|&&v| v == null).count()
      }
      SampleType::U16 | SampleType::I16 => {
        let null = (null as u16).to_ne_bytes();
        self.data.chunks_exact(2).filter(|c| *c == null).count()
      }
    };
    self.status = if nulls == total {
      TileStatus::Empty
    } else if nulls > 0 {
      TileStatus::Partial
    } else {
      TileStatus::Full
    };
  }
}

/// Supplier of tiles for reduced-resolution levels.
///
/// Level 0 is always served from the full-resolution stream; requests for
/// higher levels are handed to the attached overview.
pub trait Overview {
  fn get_tile(&mut self, rect: Rect, level: u32) -> RasterResult<Tile>;
}

/// Per-entry values derived from the layout at open time.
struct EntryState {
  grid: BlockGrid,
  sample_type: SampleType,
  /// Bands read from the stream.
  input_bands: u32,
  /// Bands in decoded tiles; palette expansion widens one stored band to 3.
  output_bands: u32,
  interleave: Interleave,
}

impl EntryState {
  fn build(layout: &ImageLayout) -> RasterResult<EntryState> {
    if layout.bands == 0 {
      return Err(RasterFormatError::BandCountIsZero.into());
    }
    let read_mode = ReadMode::resolve(layout.imode, layout.multi_block())?;

    let (sample_type, output_bands) = match layout.compression {
      Compression::None => {
        let ty = match (layout.effective_bits(), layout.signed) {
          (1..=8, false) => SampleType::U8,
          (9..=16, false) => SampleType::U16,
          (9..=16, true) => SampleType::I16,
          (bits, _) => return Err(UnsupportedLayoutError::UnsupportedBitDepth(bits).into()),
        };
        (ty, layout.bands)
      }
      Compression::PackedBits => {
        if !read_mode.is_band_sequential() {
          return Err(
            UnsupportedLayoutError::UnsupportedCombination(layout.compression, read_mode).into(),
          );
        }
        if layout.bits_per_sample >= 8 {
          return Err(UnsupportedLayoutError::UnsupportedBitDepth(layout.bits_per_sample).into());
        }
        (SampleType::U8, layout.bands)
      }
      Compression::Vq | Compression::VqMasked => {
        // Compressed cells have a fixed size; strip reading cannot apply.
        if !matches!(read_mode, ReadMode::BibBlock | ReadMode::BsqBlock) {
          return Err(
            UnsupportedLayoutError::UnsupportedCombination(layout.compression, read_mode).into(),
          );
        }
        if layout.bands != 1 {
          return Err(UnsupportedLayoutError::MultiBandVq(layout.bands).into());
        }
        if layout.vq.is_none() {
          return Err(UnsupportedLayoutError::MissingCodebook.into());
        }
        if layout.palette.is_none() {
          return Err(UnsupportedLayoutError::MissingPalette.into());
        }
        (SampleType::U8, 3)
      }
      Compression::Lut => {
        if !read_mode.is_band_sequential() || layout.bands != 1 {
          return Err(
            UnsupportedLayoutError::UnsupportedCombination(layout.compression, read_mode).into(),
          );
        }
        if layout.palette.is_none() {
          return Err(UnsupportedLayoutError::MissingPalette.into());
        }
        (SampleType::U8, 3)
      }
    };

    let grid = BlockGrid::from_layout(layout, read_mode, layout.bands)?;

    let declared = u64::from(layout.blocks_per_row) * u64::from(layout.blocks_per_col);
    for mask in [&layout.block_mask, &layout.pad_mask].into_iter().flatten() {
      if (mask.blocks() as u64) < declared {
        return Err(RasterFormatError::MaskTableTooShort.into());
      }
    }

    let interleave = match read_mode {
      ReadMode::BibBlock | ReadMode::BsqBlock | ReadMode::Bib => Interleave::Bsq,
      ReadMode::BipBlock | ReadMode::Bip => Interleave::Bip,
      ReadMode::BirBlock | ReadMode::Bir => Interleave::Bil,
    };

    Ok(EntryState {
      grid,
      sample_type,
      input_bands: layout.bands,
      output_bands,
      interleave,
    })
  }
}

/// Decoder over a blocked raster stream with multiple image entries.
///
/// Opening validates every entry's declared layout; tile requests then only
/// fail on stream I/O. Tiles come back band sequential in host byte order,
/// with pixels outside the image or in absent blocks set to the entry's null
/// value.
pub struct TileSource<R>
where
  R: Read + Seek,
{
  reader: SmartReader<R>,
  entries: Vec<ImageLayout>,
  current: usize,
  state: EntryState,
  cache: BlockCache,
  overview: Option<Box<dyn Overview>>,
}

impl<R: Read + Seek> TileSource<R> {
  /// Opens a source over `reader` for the given image entries, activating
  /// entry 0.
  ///
  /// Every entry is validated here; a layout this crate cannot read fails the
  /// open rather than a later tile request.
  pub fn open(reader: R, entries: Vec<ImageLayout>) -> RasterResult<TileSource<R>> {
    if entries.is_empty() {
      return Err(RasterFormatError::EntryOutOfRange(0).into());
    }
    let mut states = Vec::with_capacity(entries.len());
    for layout in &entries {
      states.push(EntryState::build(layout)?);
    }
    let state = states.swap_remove(0);

    log::debug!(
      "opened raster source: {} entries, active {}x{}x{} imode {:?}",
      entries.len(),
      entries[0].width,
      entries[0].height,
      entries[0].bands,
      entries[0].imode,
    );

    let cache = BlockCache::new(state.grid.grid_cols());
    let byte_order = entries[0].byte_order;
    Ok(TileSource {
      reader: SmartReader::wrap(reader, byte_order),
      entries,
      current: 0,
      state,
      cache,
      overview: None,
    })
  }

  pub fn entry_count(&self) -> usize {
    self.entries.len()
  }

  pub fn active_entry(&self) -> usize {
    self.current
  }

  /// Switches to another image entry, dropping cached blocks of the old one.
  pub fn set_active_entry(&mut self, entry: usize) -> RasterResult<()> {
    if entry >= self.entries.len() {
      return Err(RasterFormatError::EntryOutOfRange(entry).into());
    }
    let state = EntryState::build(&self.entries[entry])?;
    self.cache.clear();
    self.cache.resize(state.grid.grid_cols());
    self.reader.byte_order = self.entries[entry].byte_order;
    self.current = entry;
    self.state = state;
    Ok(())
  }

  pub fn width(&self) -> u32 {
    self.entries[self.current].width
  }

  pub fn height(&self) -> u32 {
    self.entries[self.current].height
  }

  /// Band count of decoded tiles for the active entry.
  pub fn bands(&self) -> u32 {
    self.state.output_bands
  }

  pub fn sample_type(&self) -> SampleType {
    self.state.sample_type
  }

  /// Full image bounds of the active entry.
  pub fn image_rect(&self) -> Rect {
    self.state.grid.image_rect()
  }

  pub fn set_cache_enabled(&mut self, enabled: bool) {
    self.cache.set_enabled(enabled);
  }

  pub fn cache_enabled(&self) -> bool {
    self.cache.enabled()
  }

  /// Attaches a reduced-resolution supplier serving levels above 0.
  pub fn set_overview(&mut self, overview: Box<dyn Overview>) {
    self.overview = Some(overview);
  }

  /// Consumes the source and returns the underlying reader.
  pub fn close(self) -> R {
    self.reader.into_inner()
  }

  /// Decodes the tile covering `rect` at the given resolution level.
  ///
  /// Level 0 reads the stream; higher levels go to the attached overview, or
  /// come back empty when none is attached. The returned tile always covers
  /// exactly `rect`; pixels outside the image stay at the null value and the
  /// tile status reflects how much real data was found.
  pub fn get_tile(&mut self, rect: Rect, level: u32) -> RasterResult<Tile> {
    let layout = &self.entries[self.current];
    let null = layout.null_value;
    let sample_type = self.state.sample_type;
    let output_bands = self.state.output_bands;

    if level > 0 {
      return match self.overview.as_mut() {
        Some(overview) => overview.get_tile(rect, level),
        None => Ok(Tile::filled_with_null(rect, output_bands, sample_type, null)),
      };
    }

    let byte_len = sample_type.byte_len();
    let interleave = self.state.interleave;
    let image_rect = self.state.grid.image_rect();
    let cache_w = self.state.grid.cache_width();
    let cache_h = self.state.grid.cache_height();

    let mut tile = Tile::filled_with_null(rect, output_bands, sample_type, null);

    if let Some(clip) = rect.clip_to(&image_rect) {
      let search = clip.stretch_to_block_boundary(cache_w, cache_h);
      let mut y = search.ul().y;
      while y <= search.lr().y {
        let mut x = search.ul().x;
        while x <= search.lr().x {
          let origin = Point::new(x, y);
          let block_rect = self.state.grid.block_rect_at(origin);
          if let Some(block_clip) = block_rect.clip_to(&clip) {
            let block = self.fetch_block(origin)?;
            reassemble(
              &block,
              block_rect,
              interleave,
              block_clip,
              &mut tile.data,
              rect,
              output_bands,
              byte_len,
            );
          }
          x += cache_w as i32;
        }
        y += cache_h as i32;
      }
    }

    tile.validate(null);
    Ok(tile)
  }

  /// The decoded block at `origin`, from the cache when possible.
  fn fetch_block(&mut self, origin: Point) -> RasterResult<Vec<u8>> {
    if let Some(hit) = self.cache.get(origin) {
      return Ok(hit.clone());
    }
    let block = self.decode_block(origin)?;
    if self.cache.enabled() {
      self.cache.put(origin, block.clone());
    }
    Ok(block)
  }

  /// Reads and decodes one block into output interleave and byte order.
  ///
  /// Blocks or bands the mask table marks as absent stay at the null value.
  fn decode_block(&mut self, origin: Point) -> RasterResult<Vec<u8>> {
    let layout = &self.entries[self.current];
    let state = &self.state;
    let grid = &state.grid;

    let byte_len = state.sample_type.byte_len();
    let plane = grid.cache_width() as usize * grid.cache_height() as usize * byte_len;
    let mut out = vec![0u8; state.output_bands as usize * plane];
    if layout.null_value != 0 {
      fill_null(&mut out, state.sample_type, layout.null_value);
    }

    let block_number = grid.block_number(origin);
    let mask = layout.block_mask.as_ref();
    // Rows actually present in this block; edge blocks are shorter.
    let valid_rows = match grid.block_rect_at(origin).clip_to(&grid.image_rect()) {
      Some(c) => c.height() as usize,
      None => return Ok(out),
    };

    match layout.compression {
      Compression::None => {
        // Swap only the bytes actually read; null-filled tails of partial
        // blocks are already in host order.
        let swap = byte_len > 1 && self.reader.byte_order != ByteOrder::host();
        let read_len = grid.partial_read_size(origin) as usize;
        if state.interleave == Interleave::Bsq {
          for band in 0..state.input_bands {
            if let Some(pos) = grid.position(origin, band, mask) {
              self.reader.goto_offset(pos)?;
              let start = band as usize * plane;
              self.reader.read_exact(&mut out[start..start + read_len])?;
              if swap {
                decompress::fix_endianness(&mut out[start..start + read_len], byte_len);
              }
            }
          }
        } else if let Some(pos) = grid.position(origin, 0, mask) {
          // Interleaved modes read every band in one call.
          self.reader.goto_offset(pos)?;
          self.reader.read_exact(&mut out[..read_len])?;
          if swap {
            decompress::fix_endianness(&mut out[..read_len], byte_len);
          }
        }
        self.substitute_transparent(&mut out, block_number, plane);
      }
      Compression::PackedBits => {
        let read_len = grid.partial_read_size(origin) as usize;
        let samples = grid.cache_width() as usize * valid_rows;
        let mut packed = vec![0u8; read_len];
        for band in 0..state.input_bands {
          if let Some(pos) = grid.position(origin, band, mask) {
            self.reader.goto_offset(pos)?;
            self.reader.read_exact(&mut packed)?;
            let start = band as usize * plane;
            decompress::explode_packed_bits(
              &packed,
              layout.bits_per_sample,
              samples,
              &mut out[start..start + plane],
            );
          }
        }
        self.substitute_transparent(&mut out, block_number, plane);
      }
      Compression::Vq | Compression::VqMasked => {
        let vq = layout.vq.as_ref().ok_or(UnsupportedLayoutError::MissingCodebook)?;
        let palette = layout.palette.as_ref().ok_or(UnsupportedLayoutError::MissingPalette)?;
        if let Some(pos) = grid.position(origin, 0, mask) {
          let mut compressed = vec![0u8; grid.read_size() as usize];
          self.reader.goto_offset(pos)?;
          self.reader.read_exact(&mut compressed)?;
          decompress::vq_expand(
            &compressed,
            vq,
            palette,
            &mut out,
            grid.cache_width() as usize,
            plane,
            layout.compression == Compression::VqMasked,
          );
        }
      }
      Compression::Lut => {
        let palette = layout.palette.as_ref().ok_or(UnsupportedLayoutError::MissingPalette)?;
        if let Some(pos) = grid.position(origin, 0, mask) {
          let mut indices = vec![0u8; grid.partial_read_size(origin) as usize];
          self.reader.goto_offset(pos)?;
          self.reader.read_exact(&mut indices)?;
          decompress::lut_expand(&indices, palette, &mut out, plane);
        }
      }
    }

    Ok(out)
  }

  /// Rewrites transparent samples to null where the pad mask records them.
  fn substitute_transparent(&self, out: &mut [u8], block_number: u64, plane: usize) {
    let layout = &self.entries[self.current];
    let (code, pad) = match (layout.transparent_code, &layout.pad_mask) {
      (Some(code), Some(pad)) => (code, pad),
      _ => return,
    };

    if self.state.interleave == Interleave::Bsq {
      for band in 0..self.state.input_bands {
        if pad.has_record(block_number, band) {
          let start = band as usize * plane;
          decompress::transparent_to_null(
            &mut out[start..start + plane],
            self.state.sample_type,
            code,
            layout.null_value,
          );
        }
      }
    } else if (0..self.state.input_bands).any(|b| pad.has_record(block_number, b)) {
      // Interleaved buffers are substituted whole; the scan is per sample
      // and does not depend on band order.
      decompress::transparent_to_null(out, self.state.sample_type, code, layout.null_value);
    }
  }
}

fn fill_null(buf: &mut [u8], sample_type: SampleType, null: u32) {
  match sample_type {
    SampleType::U8 => buf.fill(null as u8),
    SampleType::U16 | SampleType::I16 => {
      let bytes = (null as u16).to_ne_bytes();
      for sample in buf.chunks_exact_mut(2) {
        sample.copy_from_slice(&bytes);
      }
    }
  }
}
