//! Pre-parsed image layout values.
//!
//! Everything in this module is produced by the container-header collaborator
//! and consumed read-only by the decoder. The decoder itself never parses
//! header bytes.

use std::sync::Arc;

use crate::{
  decoder::stream::ByteOrder,
  error::{RasterResult, UnsupportedLayoutError},
};

/// Offset value marking a block the mask table declares as not physically stored.
pub const BLOCK_ABSENT: u64 = 0xffff_ffff;

/// Compressed size of one vector-quantized block cell in bytes.
///
/// RPF products store 256x256 blocks as 64x64 12-bit codewords.
pub const VQ_BLOCK_SIZE: u64 = 6144;

/// Per-block encoding of the pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
  /// Raw samples at full byte or word width.
  None,
  /// Samples narrower than 8 bits, packed contiguously most-significant-bit first.
  PackedBits,
  /// Vector quantization (compression code C4).
  Vq,
  /// Vector quantization with transparent kernels (compression code M4).
  VqMasked,
  /// Single-band palette-indexed imagery expanded through the LUT.
  Lut,
}

/// Physical access pattern, resolved once at open time from the interleave
/// symbol and the block count.
///
/// The `*Block` variants apply when the image is split into more than one
/// block. A single-block image is read in full-width strips instead, except
/// for band-sequential data which collapses onto [`ReadMode::BsqBlock`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadMode {
  /// Band interleaved by block, blocked image.
  BibBlock,
  /// Band interleaved by pixel, blocked image.
  BipBlock,
  /// Band interleaved by row, blocked image.
  BirBlock,
  /// Band sequential, blocked image.
  BsqBlock,
  /// Band interleaved by block, single-block image read as strips.
  Bib,
  /// Band interleaved by pixel, single-block image read as strips.
  Bip,
  /// Band interleaved by row, single-block image read as strips.
  Bir,
}

impl ReadMode {
  /// Maps the interleave symbol to the read mode for this image.
  ///
  /// Fails with [`UnsupportedLayoutError::UnknownInterleave`] for symbols
  /// outside `B`, `P`, `R`, `S`.
  pub fn resolve(imode: char, multi_block: bool) -> RasterResult<ReadMode> {
    let mode = match (imode, multi_block) {
      ('B', true) => ReadMode::BibBlock,
      ('P', true) => ReadMode::BipBlock,
      ('R', true) => ReadMode::BirBlock,
      ('B', false) => ReadMode::Bib,
      ('P', false) => ReadMode::Bip,
      ('R', false) => ReadMode::Bir,
      // A band-sequential single block degenerates to the blocked layout
      // with a 1x1 grid.
      ('S', _) => ReadMode::BsqBlock,
      (c, _) => return Err(UnsupportedLayoutError::UnknownInterleave(c).into()),
    };
    Ok(mode)
  }

  /// True for the modes whose stream stores each band contiguously, so block
  /// reads are issued per band.
  pub(crate) fn is_band_sequential(self) -> bool {
    matches!(self, ReadMode::BibBlock | ReadMode::BsqBlock | ReadMode::Bib)
  }
}

/// Width of a decoded sample in memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleType {
  U8,
  U16,
  I16,
}

impl SampleType {
  pub fn byte_len(self) -> usize {
    match self {
      SampleType::U8 => 1,
      SampleType::U16 | SampleType::I16 => 2,
    }
  }
}

/// Per-block-per-band byte offsets for sparse (masked) images.
///
/// Records are indexed `[block_number][band]`; the value [`BLOCK_ABSENT`]
/// marks a block that is not physically present in the stream.
#[derive(Debug, Clone)]
pub struct MaskTable {
  records: Vec<Vec<u64>>,
}

impl MaskTable {
  pub fn new(records: Vec<Vec<u64>>) -> Self {
    MaskTable { records }
  }

  /// The stored byte offset, or `None` when the record marks the block absent
  /// or the table carries no record for it.
  pub fn offset(&self, block: u64, band: u32) -> Option<u64> {
    let off = *self.records.get(block as usize)?.get(band as usize)?;
    if off == BLOCK_ABSENT {
      None
    } else {
      Some(off)
    }
  }

  /// True when the record for this block and band is present (not the absent
  /// sentinel). For pad-pixel masks this means the block contains
  /// transparent-coded pixels.
  pub fn has_record(&self, block: u64, band: u32) -> bool {
    self.offset(block, band).is_some()
  }

  pub fn blocks(&self) -> usize {
    self.records.len()
  }
}

/// The shared codebook of a vector-quantized entry.
///
/// One codeword expands to `rows.len()` output pixel rows of
/// `values_per_lookup` palette indices each. Row `r` of codeword `w` is
/// `rows[r][w * values_per_lookup ..][.. values_per_lookup]`.
#[derive(Debug)]
pub struct CodebookTable {
  rows: Vec<Vec<u8>>,
  values_per_lookup: usize,
}

impl CodebookTable {
  pub fn new(rows: Vec<Vec<u8>>, values_per_lookup: usize) -> Self {
    assert!(!rows.is_empty() && values_per_lookup > 0);
    CodebookTable { rows, values_per_lookup }
  }

  /// Output pixel rows per codeword. Format metadata, not derivable from the
  /// codeword width.
  pub fn row_count(&self) -> usize {
    self.rows.len()
  }

  pub fn values_per_lookup(&self) -> usize {
    self.values_per_lookup
  }

  pub(crate) fn kernel_row(&self, row: usize, codeword: u32) -> &[u8] {
    let start = codeword as usize * self.values_per_lookup;
    &self.rows[row][start..start + self.values_per_lookup]
  }
}

/// Index-to-color palette with three output channels.
#[derive(Debug)]
pub struct PaletteLut {
  entries: Vec<[u8; 3]>,
}

impl PaletteLut {
  pub fn new(entries: Vec<[u8; 3]>) -> Self {
    assert!(!entries.is_empty());
    PaletteLut { entries }
  }

  #[inline]
  pub fn color(&self, index: u8) -> [u8; 3] {
    self.entries[index as usize]
  }
}

/// Vector-quantization parameters from the compression header.
#[derive(Debug, Clone)]
pub struct VqParams {
  pub codebook: Arc<CodebookTable>,
  /// Bit width of one packed codeword.
  pub code_bit_length: u32,
  /// Codewords per block row.
  pub codes_per_row: u32,
  /// Codeword rows per block.
  pub code_rows: u32,
}

/// The declared layout of one image entry, as parsed by the header
/// collaborator. Immutable once a source is open on it.
#[derive(Debug, Clone)]
pub struct ImageLayout {
  pub width: u32,
  pub height: u32,
  pub bands: u32,
  /// Storage bits per sample per band; governs on-disk block sizes.
  pub bits_per_sample: u32,
  /// Significant bits per sample when narrower than storage (0 = same).
  pub actual_bits_per_sample: u32,
  pub signed: bool,
  pub block_width: u32,
  pub block_height: u32,
  pub blocks_per_row: u32,
  pub blocks_per_col: u32,
  /// Interleave symbol: `B`, `P`, `R` or `S`.
  pub imode: char,
  pub compression: Compression,
  pub byte_order: ByteOrder,
  /// Stream offset of the first block of this entry.
  pub data_offset: u64,
  /// The value blank pixels take in decoded output.
  pub null_value: u32,
  /// Sample value coding transparent pixels, when the entry declares one.
  pub transparent_code: Option<u32>,
  /// Sparse-block offsets, present for masked (M*) images.
  pub block_mask: Option<MaskTable>,
  /// Pad-pixel records marking which block/band pairs carry transparent pixels.
  pub pad_mask: Option<MaskTable>,
  pub vq: Option<VqParams>,
  pub palette: Option<Arc<PaletteLut>>,
}

impl Default for ImageLayout {
  fn default() -> Self {
    ImageLayout {
      width: 0,
      height: 0,
      bands: 1,
      bits_per_sample: 8,
      actual_bits_per_sample: 0,
      signed: false,
      block_width: 0,
      block_height: 0,
      blocks_per_row: 1,
      blocks_per_col: 1,
      imode: 'B',
      compression: Compression::None,
      byte_order: ByteOrder::BigEndian,
      data_offset: 0,
      null_value: 0,
      transparent_code: None,
      block_mask: None,
      pad_mask: None,
      vq: None,
      palette: None,
    }
  }
}

impl ImageLayout {
  pub fn multi_block(&self) -> bool {
    self.blocks_per_row * self.blocks_per_col > 1
  }

  /// Significant bits, falling back to the storage width.
  pub fn effective_bits(&self) -> u32 {
    if self.actual_bits_per_sample > 0 {
      self.actual_bits_per_sample
    } else {
      self.bits_per_sample
    }
  }
}
