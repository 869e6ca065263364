//! All IO functionality needed for block decoding

use std::io::{self, Read, Seek};

/// Byte order of the stored sample data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
  /// little endian byte order
  LittleEndian,
  /// big endian byte order
  BigEndian,
}

impl ByteOrder {
  /// The byte order of the machine running this code.
  pub fn host() -> ByteOrder {
    if cfg!(target_endian = "little") {
      ByteOrder::LittleEndian
    } else {
      ByteOrder::BigEndian
    }
  }
}

/// Reader that is aware of the byte order.
#[derive(Debug)]
pub(crate) struct SmartReader<R> {
  reader: R,
  pub byte_order: ByteOrder,
}

impl<R> SmartReader<R> {
  /// Wraps a reader
  pub fn wrap(reader: R, byte_order: ByteOrder) -> SmartReader<R> {
    SmartReader { reader, byte_order }
  }

  pub fn into_inner(self) -> R {
    self.reader
  }
}

impl<R: Read + Seek> SmartReader<R> {
  pub fn goto_offset(&mut self, offset: u64) -> io::Result<()> {
    self.seek(io::SeekFrom::Start(offset)).map(|_| ())
  }
}

impl<R: Read> Read for SmartReader<R> {
  #[inline]
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.reader.read(buf)
  }
}

impl<R: Read + Seek> Seek for SmartReader<R> {
  #[inline]
  fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
    self.reader.seek(pos)
  }
}
