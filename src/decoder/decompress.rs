//! Pure buffer-to-buffer decode transforms.
//!
//! Every function here is stateless: bytes in, samples out. Precondition
//! violations (undersized buffers, codeword widths inconsistent with the
//! codebook) are caller bugs and assert rather than returning errors.

use crate::layout::{PaletteLut, SampleType, VqParams};

/// Codeword value that may mark a fully transparent kernel in masked VQ.
const VQ_TRANSPARENT_CODEWORD: u32 = 4095;
/// Palette index coding transparency in masked VQ kernels.
const VQ_NULL_INDEX: u8 = 216;
/// Pixel value substituted for transparent VQ kernels.
const VQ_NULL_PIXEL: u8 = 0;

/// Reader over samples packed contiguously at sub-byte or unaligned bit
/// widths, most significant bit first.
pub(crate) struct PackedBitsReader<'a> {
  data: &'a [u8],
  bits: u32,
}

impl<'a> PackedBitsReader<'a> {
  pub fn new(data: &'a [u8], bits: u32) -> Self {
    assert!(bits >= 1 && bits <= 32, "packed sample width {bits} out of range");
    PackedBitsReader { data, bits }
  }

  /// The sample at `index`, widened to a u32.
  pub fn get(&self, index: usize) -> u32 {
    let mut value = 0u32;
    let start = index * self.bits as usize;
    for bit in start..start + self.bits as usize {
      let byte = self.data[bit >> 3];
      value = (value << 1) | u32::from((byte >> (7 - (bit & 7))) & 1);
    }
    value
  }
}

/// Expands `count` sub-byte packed samples from `src` into one byte each.
///
/// Extraction stops exactly at `count`; trailing pad bits in the final source
/// byte are never read as data.
pub(crate) fn explode_packed_bits(src: &[u8], bits: u32, count: usize, dst: &mut [u8]) {
  assert!(bits < 8, "packed expansion is for sub-byte samples, got {bits}");
  assert!(src.len() * 8 >= count * bits as usize, "packed source too small");
  assert!(dst.len() >= count, "destination too small for {count} samples");

  let packed = PackedBitsReader::new(src, bits);
  for (i, out) in dst.iter_mut().take(count).enumerate() {
    *out = packed.get(i) as u8;
  }
}

/// Expands one palette-indexed block: each source byte becomes a 3-channel
/// color across the three band-sequential planes of `dst`.
pub(crate) fn lut_expand(src: &[u8], palette: &PaletteLut, dst: &mut [u8], band_len: usize) {
  assert!(src.len() <= band_len, "more indices than output band samples");
  assert!(dst.len() >= 3 * band_len, "destination smaller than three bands");

  let (r, rest) = dst.split_at_mut(band_len);
  let (g, rest) = rest.split_at_mut(band_len);
  let b = &mut rest[..band_len];
  for (i, &index) in src.iter().enumerate() {
    let color = palette.color(index);
    r[i] = color[0];
    g[i] = color[1];
    b[i] = color[2];
  }
}

/// Expands one vector-quantized block into the three band-sequential planes
/// of `dst`.
///
/// Each packed codeword selects a kernel of `row_count` x `values_per_lookup`
/// palette indices from the codebook; indices pass through the palette into
/// the output bands. With `masked` set, a codeword of 4095 whose kernel is
/// entirely the null index expands to the null pixel instead (MIL-PRF-89041A
/// transparent kernels).
pub(crate) fn vq_expand(
  src: &[u8], vq: &VqParams, palette: &PaletteLut, dst: &mut [u8], dest_width: usize,
  band_len: usize, masked: bool,
) {
  let rows = vq.codebook.row_count();
  let cols = vq.codebook.values_per_lookup();
  let code_rows = vq.code_rows as usize;
  let codes_per_row = vq.codes_per_row as usize;

  assert!(dst.len() >= 3 * band_len, "destination smaller than three bands");
  assert!(
    code_rows * rows * dest_width <= band_len && codes_per_row * cols <= dest_width,
    "codebook geometry exceeds destination band"
  );
  assert!(
    src.len() * 8 >= code_rows * codes_per_row * vq.code_bit_length as usize,
    "compressed source smaller than the codeword grid"
  );

  let packed = PackedBitsReader::new(src, vq.code_bit_length);
  let mut code_index = 0usize;

  for cy in 0..code_rows {
    let dest_row_base = cy * rows * dest_width;
    for cx in 0..codes_per_row {
      let dest_base = dest_row_base + cx * cols;
      let codeword = packed.get(code_index);
      code_index += 1;

      let transparent = masked
        && codeword == VQ_TRANSPARENT_CODEWORD
        && (0..rows).all(|r| {
          vq.codebook.kernel_row(r, codeword).iter().all(|&v| v == VQ_NULL_INDEX)
        });

      for r in 0..rows {
        let kernel = vq.codebook.kernel_row(r, codeword);
        let line = dest_base + r * dest_width;
        for (c, &index) in kernel.iter().enumerate() {
          let color = if transparent {
            [VQ_NULL_PIXEL; 3]
          } else {
            palette.color(index)
          };
          dst[line + c] = color[0];
          dst[band_len + line + c] = color[1];
          dst[2 * band_len + line + c] = color[2];
        }
      }
    }
  }
}

/// Reverses the byte order of every sample in `buf` in place.
///
/// A no-op for single-byte samples; callers only invoke this when the
/// declared byte order differs from the host.
pub(crate) fn fix_endianness(buf: &mut [u8], byte_len: usize) {
  if byte_len <= 1 {
    return;
  }
  for sample in buf.chunks_exact_mut(byte_len) {
    sample.reverse();
  }
}

/// Rewrites samples equal to the transparent code to the null value, over one
/// band's decoded samples.
pub(crate) fn transparent_to_null(
  band: &mut [u8], sample_type: SampleType, transparent: u32, null: u32,
) {
  match sample_type {
    SampleType::U8 => {
      let transparent = transparent as u8;
      let null = null as u8;
      for v in band.iter_mut() {
        if *v == transparent {
          *v = null;
        }
      }
    }
    SampleType::U16 | SampleType::I16 => {
      let transparent = (transparent as u16).to_ne_bytes();
      let null = (null as u16).to_ne_bytes();
      for v in band.chunks_exact_mut(2) {
        if v == transparent {
          v.copy_from_slice(&null);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::layout::CodebookTable;

  #[test]
  fn packed_bits_msb_first() {
    // 101 110 011 000 ...: 3-bit samples 5, 6, 3, 0.
    let data = [0b1011_1001, 0b1000_0000];
    let packed = PackedBitsReader::new(&data, 3);
    assert_eq!(packed.get(0), 5);
    assert_eq!(packed.get(1), 6);
    assert_eq!(packed.get(2), 3);
    assert_eq!(packed.get(3), 0);
  }

  #[test]
  fn packed_bits_spanning_bytes() {
    let data = [0xff, 0x00, 0xff];
    let packed = PackedBitsReader::new(&data, 12);
    assert_eq!(packed.get(0), 0xff0);
    assert_eq!(packed.get(1), 0x0ff);
  }

  #[test]
  fn explode_stops_at_count() {
    // Six 2-bit samples in two bytes: 0, 1, 2, 3, 1, 2 then pad bits.
    let src = [0b0001_1011, 0b0110_1111];
    let mut dst = [0xaau8; 8];
    explode_packed_bits(&src, 2, 6, &mut dst);
    assert_eq!(&dst[..6], &[0, 1, 2, 3, 1, 2]);
    // Samples past count are untouched.
    assert_eq!(&dst[6..], &[0xaa, 0xaa]);
  }

  #[test]
  fn lut_expands_three_channels() {
    let mut entries = vec![[0u8; 3]; 256];
    entries[7] = [10, 20, 30];
    entries[9] = [40, 50, 60];
    let palette = PaletteLut::new(entries);

    let src = [7u8, 9, 7];
    let mut dst = vec![0u8; 12];
    lut_expand(&src, &palette, &mut dst, 4);
    assert_eq!(&dst[..3], &[10, 40, 10]);
    assert_eq!(&dst[4..7], &[20, 50, 20]);
    assert_eq!(&dst[8..11], &[30, 60, 30]);
  }

  fn test_vq_params() -> VqParams {
    // Two codewords expanding to 2x2 kernels.
    let codebook = CodebookTable::new(
      vec![
        vec![1, 2, 3, 4], // row 0: codeword 0 -> [1,2], codeword 1 -> [3,4]
        vec![5, 6, 7, 8], // row 1
      ],
      2,
    );
    VqParams {
      codebook: Arc::new(codebook),
      code_bit_length: 1,
      codes_per_row: 2,
      code_rows: 1,
    }
  }

  #[test]
  fn vq_expands_kernels_through_palette() {
    let mut entries = vec![[0u8; 3]; 256];
    for i in 0..=8u8 {
      entries[i as usize] = [i * 10, i * 10 + 1, i * 10 + 2];
    }
    let palette = PaletteLut::new(entries);
    let vq = test_vq_params();

    // Codewords 1, 0 across one code row; dest is 4 wide, 2 tall.
    let src = [0b1000_0000u8];
    let mut dst = vec![0u8; 3 * 8];
    vq_expand(&src, &vq, &palette, &mut dst, 4, 8, false);

    // Band 0, row 0: codeword 1 row 0 = [3,4], codeword 0 row 0 = [1,2].
    assert_eq!(&dst[..4], &[30, 40, 10, 20]);
    // Band 0, row 1: codeword 1 row 1 = [7,8], codeword 0 row 1 = [5,6].
    assert_eq!(&dst[4..8], &[70, 80, 50, 60]);
    // Band 1 carries the +1 channel.
    assert_eq!(&dst[8..12], &[31, 41, 11, 21]);
  }

  #[test]
  fn masked_vq_transparent_kernel() {
    // Single 12-bit codeword space where 4095 maps to an all-null kernel.
    let mut row0 = vec![0u8; 4096 * 2];
    let mut row1 = vec![0u8; 4096 * 2];
    row0[0] = 1;
    row0[1] = 2;
    row1[0] = 5;
    row1[1] = 6;
    for c in 0..2 {
      row0[4095 * 2 + c] = VQ_NULL_INDEX;
      row1[4095 * 2 + c] = VQ_NULL_INDEX;
    }
    let vq = VqParams {
      codebook: Arc::new(CodebookTable::new(vec![row0, row1], 2)),
      code_bit_length: 12,
      codes_per_row: 2,
      code_rows: 1,
    };

    let mut entries = vec![[0xeeu8; 3]; 256];
    entries[1] = [11, 11, 11];
    entries[2] = [22, 22, 22];
    entries[5] = [55, 55, 55];
    entries[6] = [66, 66, 66];
    let palette = PaletteLut::new(entries);

    // Codewords: 4095 then 0.
    let src = [0xff, 0xf0, 0x00];
    let mut dst = vec![0xaau8; 3 * 8];
    vq_expand(&src, &vq, &palette, &mut dst, 4, 8, true);

    // Transparent kernel becomes the null pixel, not the palette color of 216.
    assert_eq!(&dst[..2], &[VQ_NULL_PIXEL, VQ_NULL_PIXEL]);
    assert_eq!(&dst[4..6], &[VQ_NULL_PIXEL, VQ_NULL_PIXEL]);
    // Codeword 0 expands normally.
    assert_eq!(&dst[2..4], &[11, 22]);
    assert_eq!(&dst[6..8], &[55, 66]);
  }

  #[test]
  fn masked_vq_4095_with_real_pixels_is_kept() {
    // Codeword 4095 whose kernel contains a non-null index stays opaque.
    let mut row0 = vec![0u8; 4096];
    row0[4095] = 3;
    let vq = VqParams {
      codebook: Arc::new(CodebookTable::new(vec![row0], 1)),
      code_bit_length: 12,
      codes_per_row: 1,
      code_rows: 1,
    };
    let mut entries = vec![[0u8; 3]; 256];
    entries[3] = [33, 34, 35];
    let palette = PaletteLut::new(entries);

    let src = [0xff, 0xf0];
    let mut dst = vec![0u8; 3];
    vq_expand(&src, &vq, &palette, &mut dst, 1, 1, true);
    assert_eq!(dst, [33, 34, 35]);
  }

  #[test]
  fn endianness_swap_u16() {
    let mut buf = [0x12, 0x34, 0xab, 0xcd];
    fix_endianness(&mut buf, 2);
    assert_eq!(buf, [0x34, 0x12, 0xcd, 0xab]);
    let mut bytes = [1u8, 2, 3];
    fix_endianness(&mut bytes, 1);
    assert_eq!(bytes, [1, 2, 3]);
  }

  #[test]
  fn transparent_substitution_u8() {
    let mut band = [3u8, 7, 3, 0];
    transparent_to_null(&mut band, SampleType::U8, 3, 255);
    assert_eq!(band, [255, 7, 255, 0]);
  }

  #[test]
  fn transparent_substitution_u16() {
    let mut band = Vec::new();
    for v in [100u16, 2047, 100] {
      band.extend_from_slice(&v.to_ne_bytes());
    }
    transparent_to_null(&mut band, SampleType::U16, 2047, 0);
    let out: Vec<u16> = band.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect();
    assert_eq!(out, [100, 0, 100]);
  }
}
