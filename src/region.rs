//! OS region provider.
//!
//! Acquires and releases page-aligned, zero-initialized, anonymous memory
//! ranges via `mmap`/`munmap`. The pool allocator needs several
//! independently releasable regions, which a single growing program break
//! cannot provide, so allocation is backed by `mmap` directly.
//!
//! `OsRegion` owns its mapping exclusively; there is no aliasing. Dropping it
//! unmaps the memory, so using `base()` after the region is dropped is
//! undefined by construction (the memory stops existing).

use std::io;
use std::ptr::NonNull;

use crate::error::RegionError;

/// A single page-aligned, zero-initialized anonymous mapping.
///
/// `size` is always a multiple of the OS page size and at least the number
/// of bytes requested at [`OsRegion::acquire`].
pub struct OsRegion {
  base: NonNull<u8>,
  size: usize,
}

// SAFETY: `OsRegion` exclusively owns an anonymous mapping. The bytes it
// points at are only ever touched through `&self`/`&mut self` methods that
// the allocators serialize with their own mutexes; no thread-local state is
// involved in the mapping itself.
unsafe impl Send for OsRegion {}
unsafe impl Sync for OsRegion {}

impl OsRegion {
  /// Acquires a fresh, zero-initialized, page-aligned mapping of at least
  /// `bytes` bytes.
  ///
  /// Rounds `bytes` up to a whole number of pages. Fails only if the OS
  /// refuses the mapping.
  pub fn acquire(bytes: usize) -> Result<Self, RegionError> {
    let page_size = page_size();
    let mapped_len = round_up_to_page(bytes.max(1), page_size);

    // SAFETY: a fixed, well-known set of flags requesting a private,
    // anonymous, read-write mapping. `mmap` either returns a valid
    // pointer to `mapped_len` fresh, zeroed bytes or `MAP_FAILED`, which
    // is checked below before constructing `OsRegion`.
    let ptr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        mapped_len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
      )
    };

    if ptr == libc::MAP_FAILED {
      let source = io::Error::last_os_error();
      tracing::debug!(requested = bytes, mapped_len, error = %source, "mmap failed");
      return Err(RegionError::MapFailed {
        requested: bytes,
        source,
      });
    }

    tracing::debug!(requested = bytes, mapped_len, base = ?ptr, "acquired OS region");

    // SAFETY: checked non-null (not `MAP_FAILED`) above.
    let base = unsafe { NonNull::new_unchecked(ptr as *mut u8) };
    Ok(Self {
      base,
      size: mapped_len,
    })
  }

  /// Base address of the mapping.
  #[inline]
  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  /// Usable byte count of the mapping (a whole number of pages, at least
  /// the amount requested at `acquire`).
  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }
}

impl Drop for OsRegion {
  fn drop(&mut self) {
    tracing::debug!(base = ?self.base, size = self.size, "releasing OS region");
    // SAFETY: `self.base`/`self.size` describe exactly the mapping made
    // by `mmap` in `acquire`; nothing else in the crate holds a copy of
    // this pointer past the allocator's own internal bookkeeping, and
    // that bookkeeping is dropped together with the region.
    unsafe {
      libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.size);
    }
  }
}

fn page_size() -> usize {
  // SAFETY: `sysconf` with `_SC_PAGESIZE` has no preconditions.
  let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
  if size <= 0 { 4096 } else { size as usize }
}

fn round_up_to_page(bytes: usize, page_size: usize) -> usize {
  crate::align::align_up(bytes, page_size)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn acquire_rounds_up_to_page_multiple() {
    let region = OsRegion::acquire(1).expect("mmap should succeed for 1 byte");
    assert_eq!(region.size() % page_size(), 0);
    assert!(region.size() >= 1);
  }

  #[test]
  fn acquired_memory_is_zeroed_and_writable() {
    let mut region = OsRegion::acquire(4096).expect("mmap should succeed");
    // SAFETY: region owns `size()` writable bytes.
    let slice = unsafe { std::slice::from_raw_parts_mut(region.base().as_ptr(), region.size()) };
    assert!(slice.iter().all(|&b| b == 0));
    slice[0] = 0xAB;
    assert_eq!(slice[0], 0xAB);
  }

  #[test]
  fn base_is_page_aligned() {
    let region = OsRegion::acquire(8192).expect("mmap should succeed");
    assert_eq!(region.base().as_ptr() as usize % page_size(), 0);
  }
}
