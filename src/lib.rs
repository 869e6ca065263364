//! Random-access decoding of NITF-style blocked raster imagery.
//!
//! A raster entry is stored as a grid of fixed-size blocks in one of four
//! interleave orders, optionally compressed (vector quantization, packed
//! sub-byte samples, palette indices) and optionally sparse through block
//! mask tables. [`TileSource`] decodes arbitrary rectangles of such an entry
//! into band-sequential tiles in host byte order, caching decoded blocks so
//! reads that walk the image do not repeat work.
//!
//! Header parsing is out of scope: the caller supplies one [`ImageLayout`]
//! per image entry, as parsed from the container format.

pub use self::{
  decoder::{ByteOrder, Overview, Tile, TileSource, TileStatus},
  error::{RasterError, RasterFormatError, RasterResult, UnsupportedLayoutError},
};

pub mod decoder;
mod error;
pub mod geometry;
pub mod layout;

pub use self::layout::ImageLayout;
