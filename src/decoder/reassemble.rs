//! Copies decoded block pixels into the band-sequential output tile.

use crate::geometry::Rect;

/// Sample ordering of a decoded block buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Interleave {
  /// Band sequential: complete planes, one band after another.
  Bsq,
  /// Band interleaved by pixel: all bands of one pixel together.
  Bip,
  /// Band interleaved by line: one row per band, then the next row.
  Bil,
}

/// Copies the pixels of `clip` from a decoded block into the output tile.
///
/// `src` covers `src_rect` in the given interleave; `dst` covers `dst_rect`
/// band sequentially. `clip` must lie inside both rectangles. Rows of
/// band-sequential and line-interleaved sources copy as contiguous runs;
/// pixel-interleaved sources deinterleave sample by sample.
pub(crate) fn reassemble(
  src: &[u8], src_rect: Rect, interleave: Interleave, clip: Rect, dst: &mut [u8], dst_rect: Rect,
  bands: u32, byte_len: usize,
) {
  debug_assert!(clip.completely_within(&src_rect) && clip.completely_within(&dst_rect));

  let src_w = src_rect.width() as usize;
  let src_h = src_rect.height() as usize;
  let dst_w = dst_rect.width() as usize;
  let dst_plane = dst_rect.area() as usize;
  let bands = bands as usize;
  let clip_w = clip.width() as usize;

  for band in 0..bands {
    for y in clip.ul().y..=clip.lr().y {
      let sy = (y - src_rect.ul().y) as usize;
      let sx = (clip.ul().x - src_rect.ul().x) as usize;
      let dy = (y - dst_rect.ul().y) as usize;
      let dx = (clip.ul().x - dst_rect.ul().x) as usize;
      let dst_off = (band * dst_plane + dy * dst_w + dx) * byte_len;

      match interleave {
        Interleave::Bsq => {
          let src_off = ((band * src_h + sy) * src_w + sx) * byte_len;
          let run = clip_w * byte_len;
          dst[dst_off..dst_off + run].copy_from_slice(&src[src_off..src_off + run]);
        }
        Interleave::Bil => {
          let src_off = ((sy * bands + band) * src_w + sx) * byte_len;
          let run = clip_w * byte_len;
          dst[dst_off..dst_off + run].copy_from_slice(&src[src_off..src_off + run]);
        }
        Interleave::Bip => {
          for x in 0..clip_w {
            let src_off = ((sy * src_w + sx + x) * bands + band) * byte_len;
            let out = dst_off + x * byte_len;
            dst[out..out + byte_len].copy_from_slice(&src[src_off..src_off + byte_len]);
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Point;

  fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
    Rect::from_origin_size(Point { x, y }, w, h)
  }

  #[test]
  fn bsq_copies_rows() {
    // 2x2 source with two bands, copied whole into a 2x2 destination.
    let src = [1u8, 2, 3, 4, 11, 12, 13, 14];
    let mut dst = [0u8; 8];
    let r = rect(0, 0, 2, 2);
    reassemble(&src, r, Interleave::Bsq, r, &mut dst, r, 2, 1);
    assert_eq!(dst, src);
  }

  #[test]
  fn bip_deinterleaves() {
    // 2x1 source, two bands interleaved by pixel.
    let src = [1u8, 11, 2, 12];
    let mut dst = [0u8; 4];
    let r = rect(0, 0, 2, 1);
    reassemble(&src, r, Interleave::Bip, r, &mut dst, r, 2, 1);
    assert_eq!(dst, [1, 2, 11, 12]);
  }

  #[test]
  fn bil_deinterleaves_lines() {
    // 2x2 source, two bands interleaved by line.
    let src = [1u8, 2, 11, 12, 3, 4, 13, 14];
    let mut dst = [0u8; 8];
    let r = rect(0, 0, 2, 2);
    reassemble(&src, r, Interleave::Bil, r, &mut dst, r, 2, 1);
    assert_eq!(dst, [1, 2, 3, 4, 11, 12, 13, 14]);
  }

  #[test]
  fn clipped_copy_lands_at_offset() {
    // A 4x4 single-band block at (0,0); tile covers (2,2)-(5,5); only the
    // overlapping 2x2 corner moves.
    let src: Vec<u8> = (0..16).collect();
    let mut dst = vec![0xffu8; 16];
    let src_rect = rect(0, 0, 4, 4);
    let dst_rect = rect(2, 2, 4, 4);
    let clip = rect(2, 2, 2, 2);
    reassemble(&src, src_rect, Interleave::Bsq, clip, &mut dst, dst_rect, 1, 1);
    assert_eq!(&dst[..2], &[10, 11]);
    assert_eq!(&dst[4..6], &[14, 15]);
    assert_eq!(dst[2], 0xff);
  }

  #[test]
  fn two_byte_samples_copy_whole() {
    let src = [0x12u8, 0x34, 0x56, 0x78];
    let mut dst = [0u8; 4];
    let r = rect(0, 0, 2, 1);
    reassemble(&src, r, Interleave::Bsq, r, &mut dst, r, 1, 2);
    assert_eq!(dst, src);
  }
}
