//! Aligned bulk-zero (and bulk-fill) utility.
//!
//! Wide stores are used where available as long as the observable result is
//! identical to a scalar byte-by-byte write. The machine word is the "wide"
//! unit here rather than an explicit SIMD crate: the unaligned head and tail
//! are filled byte-by-byte, the aligned middle is filled one `usize` at a
//! time.

use std::mem::size_of;

/// Writes `byte_value` into the `length` bytes starting at `buffer`.
///
/// # Safety
///
/// `buffer` must be valid for writes of `length` bytes. No memory outside
/// `[buffer, buffer + length)` is touched.
pub unsafe fn bulk_set(buffer: *mut u8, byte_value: u8, length: usize) {
  const WORD: usize = size_of::<usize>();

  let start = buffer as usize;
  let end = start + length;

  let aligned_start = super::align::align_up(start, WORD).min(end);
  let aligned_end = (end & !(WORD - 1)).max(aligned_start);

  let head_len = aligned_start - start;
  // SAFETY: `head_len <= length`, caller guarantees `buffer` is valid for `length` bytes.
  unsafe {
    std::ptr::write_bytes(buffer, byte_value, head_len);
  }

  if aligned_end > aligned_start {
    let word = splat_word(byte_value);
    let words_ptr = aligned_start as *mut usize;
    let word_count = (aligned_end - aligned_start) / WORD;
    // SAFETY: `aligned_start..aligned_end` lies within `[buffer, buffer+length)` and is
    // word-aligned by construction; each of `word_count` words is in bounds.
    unsafe {
      for i in 0..word_count {
        words_ptr.add(i).write(word);
      }
    }
  }

  let tail_len = end - aligned_end;
  if tail_len > 0 {
    // SAFETY: `aligned_end..end` lies within `[buffer, buffer+length)`.
    unsafe {
      std::ptr::write_bytes(aligned_end as *mut u8, byte_value, tail_len);
    }
  }
}

#[inline]
fn splat_word(byte_value: u8) -> usize {
  usize::from_ne_bytes([byte_value; size_of::<usize>()])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_byte_for_small_buffers() {
    for len in 0..64 {
      let mut buf = vec![0xFFu8; len];
      // SAFETY: `buf` is valid for `len` bytes.
      unsafe { bulk_set(buf.as_mut_ptr(), 0x42, len) };
      assert!(buf.iter().all(|&b| b == 0x42));
    }
  }

  #[test]
  fn does_not_touch_bytes_outside_the_range() {
    let mut buf = vec![0xAAu8; 256];
    let sentinel_before = buf[15];
    let sentinel_after = buf[48];
    // SAFETY: writing into the sub-slice [16, 48).
    unsafe { bulk_set(buf.as_mut_ptr().add(16), 0x00, 32) };
    assert_eq!(buf[15], sentinel_before);
    assert_eq!(buf[48], sentinel_after);
    assert!(buf[16..48].iter().all(|&b| b == 0x00));
  }

  #[test]
  fn handles_unaligned_start_and_length() {
    let mut buf = vec![0u8; 100];
    // SAFETY: offset 3, length 61 stays within the 100-byte buffer.
    unsafe { bulk_set(buf.as_mut_ptr().add(3), 0x7F, 61) };
    assert!(buf[..3].iter().all(|&b| b == 0));
    assert!(buf[3..64].iter().all(|&b| b == 0x7F));
    assert!(buf[64..].iter().all(|&b| b == 0));
  }
}
