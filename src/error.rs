use std::{error::Error, fmt, io};

use crate::layout::{Compression, ReadMode};

/// Result of an image decoding process
pub type RasterResult<T> = Result<T, RasterError>;

/// The common error type for everything this crate can fail on.
#[derive(Debug)]
pub enum RasterError {
  /// The layout or stream contents are internally inconsistent.
  FormatError(RasterFormatError),
  /// The declared layout describes a file this crate cannot read.
  UnsupportedError(UnsupportedLayoutError),
  /// An I/O error occurred while seeking or reading block data.
  IoError(io::Error),
}

impl fmt::Display for RasterError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RasterError::FormatError(e) => write!(f, "format error: {e}"),
      RasterError::UnsupportedError(e) => write!(f, "unsupported layout: {e}"),
      RasterError::IoError(e) => write!(f, "i/o error: {e}"),
    }
  }
}

impl Error for RasterError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      RasterError::FormatError(e) => Some(e),
      RasterError::UnsupportedError(e) => Some(e),
      RasterError::IoError(e) => Some(e),
    }
  }
}

impl From<io::Error> for RasterError {
  fn from(err: io::Error) -> RasterError {
    RasterError::IoError(err)
  }
}

impl From<RasterFormatError> for RasterError {
  fn from(err: RasterFormatError) -> RasterError {
    RasterError::FormatError(err)
  }
}

impl From<UnsupportedLayoutError> for RasterError {
  fn from(err: UnsupportedLayoutError) -> RasterError {
    RasterError::UnsupportedError(err)
  }
}

/// An inconsistency in the declared image layout.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterFormatError {
  InvalidDimensions(u32, u32),
  InvalidBlockDimensions(u32, u32),
  BandCountIsZero,
  /// The block grid does not cover the declared image bounds.
  InconsistentBlockGrid,
  /// A mask table has fewer records than the image has blocks or bands.
  MaskTableTooShort,
  /// No image entry exists at the requested index.
  EntryOutOfRange(usize),
}

impl fmt::Display for RasterFormatError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RasterFormatError::InvalidDimensions(w, h) => write!(f, "invalid dimensions {w}x{h}"),
      RasterFormatError::InvalidBlockDimensions(w, h) => {
        write!(f, "invalid block dimensions {w}x{h}")
      }
      RasterFormatError::BandCountIsZero => write!(f, "band count is zero"),
      RasterFormatError::InconsistentBlockGrid => {
        write!(f, "block grid does not cover the image bounds")
      }
      RasterFormatError::MaskTableTooShort => {
        write!(f, "mask table is shorter than the block grid")
      }
      RasterFormatError::EntryOutOfRange(n) => write!(f, "image entry {n} out of range"),
    }
  }
}

impl Error for RasterFormatError {}

/// A declared interleave/compression/bit-depth combination this crate does not read.
///
/// Raised at open time only; an open source never produces this error.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsupportedLayoutError {
  /// The interleave symbol is not one of `B`, `P`, `R`, `S`.
  UnknownInterleave(char),
  UnsupportedBitDepth(u32),
  /// The compression kind cannot be combined with the resolved read mode.
  UnsupportedCombination(Compression, ReadMode),
  /// Vector-quantized imagery with more than one stored band.
  MultiBandVq(u32),
  /// Vector-quantized entry without codebook parameters.
  MissingCodebook,
  /// Palette-expanded entry without a palette.
  MissingPalette,
}

impl fmt::Display for UnsupportedLayoutError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnsupportedLayoutError::UnknownInterleave(c) => {
        write!(f, "unrecognized interleave symbol {c:?}")
      }
      UnsupportedLayoutError::UnsupportedBitDepth(n) => {
        write!(f, "unsupported bit depth {n}")
      }
      UnsupportedLayoutError::UnsupportedCombination(c, m) => {
        write!(f, "compression {c:?} cannot be read in mode {m:?}")
      }
      UnsupportedLayoutError::MultiBandVq(n) => {
        write!(f, "vector-quantized imagery must be single band, found {n}")
      }
      UnsupportedLayoutError::MissingCodebook => write!(f, "no codebook supplied"),
      UnsupportedLayoutError::MissingPalette => write!(f, "no palette supplied"),
    }
  }
}

impl Error for UnsupportedLayoutError {}
