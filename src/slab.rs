//! Fixed-size slab allocator.
//!
//! Hands out equal-sized objects from one preallocated, page-backed region,
//! using an intrusive singly-linked free list stored inside the free cells
//! themselves.
//!
//! ## Cell layout
//!
//! The first 32 bytes of every cell are reserved as a header. While a cell
//! is free, its first machine word holds the address of the next free cell
//! (or `0`, the sentinel for "no more free cells"). User payload begins at
//! `cell + 32`.
//!
//! ```text
//!   ┌──────────────── cell_size bytes ─────────────────┐
//!   │ header (32 bytes)        │       payload          │
//!   │ [next: usize][  ...  ]   │  cell_size - 32 bytes  │
//!   └──────────────────────────┴────────────────────────┘
//!          ▲
//!          └── only meaningful while the cell is free
//! ```

use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::Mutex;

use crate::align::align_up;
use crate::bulk::bulk_set;
use crate::error::SlabError;
use crate::region::OsRegion;

/// Size, in bytes, of the header reserved at the front of every cell.
pub const CELL_HEADER_SIZE: usize = 32;

/// The 16-byte multiple every cell's payload is rounded up to.
pub const PAYLOAD_ALIGN: usize = 16;

/// Sentinel free-list value meaning "no free cell".
const EMPTY: usize = 0;

struct SlabState {
  free_head: usize,
}

/// A fixed-size-object allocator backed by a single OS-mapped region.
///
/// Every public operation is serialized by one mutex: the intrusive
/// free-list pop/push happens entirely while holding it, so concurrent
/// callers simply queue on the lock rather than racing.
pub struct SlabAllocator {
  region: OsRegion,
  cell_size: usize,
  capacity: usize,
  state: Mutex<SlabState>,
}

impl SlabAllocator {
  /// Initializes a slab of `capacity` cells, each holding at least
  /// `object_size` bytes.
  ///
  /// `object_size` is rounded up to a 16-byte multiple and then, if still
  /// smaller than [`CELL_HEADER_SIZE`], raised to it — every cell must be
  /// able to hold the header's intrusive link regardless of how small the
  /// caller's objects are.
  pub fn new(capacity: usize, object_size: usize) -> Result<Self, SlabError> {
    if capacity == 0 {
      return Err(SlabError::ZeroCapacity);
    }
    let min_object = size_of::<usize>();
    if object_size < min_object {
      return Err(SlabError::ObjectTooSmall {
        given: object_size,
        min: min_object,
      });
    }

    let mut cell_size = align_up(object_size, PAYLOAD_ALIGN);
    if cell_size < CELL_HEADER_SIZE {
      cell_size = CELL_HEADER_SIZE;
    }

    let region = OsRegion::acquire(cell_size * capacity)?;

    // SAFETY: the region owns `cell_size * capacity` fresh bytes; no
    // other reference to it exists yet.
    unsafe {
      Self::rebuild_free_list(region.base(), cell_size, capacity);
    }

    let free_head = region.base().as_ptr() as usize;

    tracing::debug!(capacity, cell_size, "slab initialized");

    Ok(Self {
      region,
      cell_size,
      capacity,
      state: Mutex::new(SlabState { free_head }),
    })
  }

  /// Usable payload size of each cell (`cell_size - 32`).
  pub fn object_size(&self) -> usize {
    self.cell_size - CELL_HEADER_SIZE
  }

  /// Number of cells in the slab.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Pops the head of the free list and returns a pointer to its payload,
  /// or `None` if the slab is exhausted.
  pub fn alloc(&self) -> Option<NonNull<u8>> {
    let mut state = self.state.lock().unwrap();
    if state.free_head == EMPTY {
      return None;
    }

    let cell_addr = state.free_head;
    // SAFETY: `cell_addr` is the head of our own free list; its first
    // word holds the next-link written either at init, at a prior
    // `free`, or by `rebuild_free_list`.
    let next = unsafe { (cell_addr as *const usize).read() };
    state.free_head = next;

    let user_ptr = cell_addr + CELL_HEADER_SIZE;
    // SAFETY: `cell_addr` lies within the region and `user_ptr` is
    // therefore non-null.
    Some(unsafe { NonNull::new_unchecked(user_ptr as *mut u8) })
  }

  /// Returns a previously allocated cell to the free list.
  ///
  /// `ptr` must have been returned by [`Self::alloc`] on this allocator
  /// and not already freed. Double-free is not detected.
  pub fn free(&self, ptr: NonNull<u8>) {
    let cell_addr = ptr.as_ptr() as usize - CELL_HEADER_SIZE;
    let mut state = self.state.lock().unwrap();
    // SAFETY: `cell_addr` is a cell address within our region (caller
    // contract); writing its header link is in bounds.
    unsafe {
      (cell_addr as *mut usize).write(state.free_head);
    }
    state.free_head = cell_addr;
  }

  /// Returns the slab to a freshly-initialized state: every cell is free
  /// again and every byte of the region reads zero.
  ///
  /// Zeroing happens before the free list is rebuilt — doing it in the
  /// reverse order would immediately erase the next-links the rebuild just
  /// wrote, breaking every subsequent `alloc` after the first. Payload
  /// bytes (`cell + 32` onward) are untouched by the rebuild either way,
  /// so every returned object still reads zero while the list stays
  /// intact.
  pub fn reset(&self) {
    let mut state = self.state.lock().unwrap();
    // SAFETY: the region is exclusively owned by this allocator and is
    // `cell_size * capacity` bytes long.
    unsafe {
      bulk_set(self.region.base().as_ptr(), 0, self.cell_size * self.capacity);
      Self::rebuild_free_list(self.region.base(), self.cell_size, self.capacity);
    }
    state.free_head = self.region.base().as_ptr() as usize;
    tracing::debug!(capacity = self.capacity, "slab reset");
  }

  /// Writes the address of cell `i + 1` into the first word of cell `i`,
  /// for every `i` in `[0, capacity - 1)`, and the empty sentinel into the
  /// last cell — the same layout `new` establishes.
  ///
  /// # Safety
  ///
  /// `base` must be valid for `cell_size * capacity` bytes.
  unsafe fn rebuild_free_list(base: NonNull<u8>, cell_size: usize, capacity: usize) {
    let base_addr = base.as_ptr() as usize;
    for i in 0..capacity {
      let cell_addr = base_addr + i * cell_size;
      let next = if i + 1 < capacity {
        base_addr + (i + 1) * cell_size
      } else {
        EMPTY
      };
      // SAFETY: `cell_addr` is within `[base, base + cell_size * capacity)`.
      unsafe {
        (cell_addr as *mut usize).write(next);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_zero_capacity() {
    assert!(matches!(
      SlabAllocator::new(0, 64),
      Err(SlabError::ZeroCapacity)
    ));
  }

  #[test]
  fn rejects_object_size_below_a_machine_word() {
    assert!(matches!(
      SlabAllocator::new(4, 1),
      Err(SlabError::ObjectTooSmall { .. })
    ));
  }

  #[test]
  fn alloc_returns_16_byte_aligned_pointers() {
    let slab = SlabAllocator::new(8, 40).unwrap();
    for _ in 0..8 {
      let ptr = slab.alloc().expect("capacity not yet exhausted");
      assert_eq!(ptr.as_ptr() as usize % 16, 0);
    }
  }

  #[test]
  fn outstanding_allocations_do_not_overlap() {
    let slab = SlabAllocator::new(16, 48).unwrap();
    let object_size = slab.object_size();
    let mut ptrs = Vec::new();
    for _ in 0..16 {
      ptrs.push(slab.alloc().unwrap().as_ptr() as usize);
    }
    ptrs.sort_unstable();
    for window in ptrs.windows(2) {
      assert!(window[1] - window[0] >= object_size);
    }
  }

  // S5: capacity = 3, object_size = 64.
  #[test]
  fn s5_capacity_bound_and_reuse_after_free() {
    let slab = SlabAllocator::new(3, 64).unwrap();

    let a = slab.alloc().unwrap();
    let _b = slab.alloc().unwrap();
    let _c = slab.alloc().unwrap();
    assert!(slab.alloc().is_none(), "fourth alloc must fail");

    slab.free(a);
    assert!(slab.alloc().is_some(), "freeing one cell allows one more alloc");
    assert!(slab.alloc().is_none(), "capacity is still bounded at 3");
  }

  // S6: fill, reset without freeing, everything reusable and zeroed.
  #[test]
  fn s6_reset_reclaims_capacity_and_zeroes_payload() {
    let slab = SlabAllocator::new(4, 64).unwrap();
    let mut ptrs = Vec::new();
    for _ in 0..4 {
      let ptr = slab.alloc().unwrap();
      // SAFETY: payload is `object_size()` bytes, freshly allocated.
      unsafe {
        std::ptr::write_bytes(ptr.as_ptr(), 0xFF, slab.object_size());
      }
      ptrs.push(ptr);
    }
    assert!(slab.alloc().is_none());

    slab.reset();

    let mut reused = Vec::new();
    for _ in 0..4 {
      let ptr = slab.alloc().expect("full capacity available after reset");
      // SAFETY: payload is `object_size()` bytes.
      let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), slab.object_size()) };
      assert!(bytes.iter().all(|&b| b == 0));
      reused.push(ptr);
    }
    assert!(slab.alloc().is_none());
  }

  #[test]
  fn round_trip_alloc_free_succeeds_indefinitely() {
    let slab = SlabAllocator::new(2, 32).unwrap();
    for _ in 0..10_000 {
      let a = slab.alloc().unwrap();
      let b = slab.alloc().unwrap();
      assert!(slab.alloc().is_none());
      slab.free(a);
      slab.free(b);
    }
  }

  #[test]
  fn free_list_has_no_cycles() {
    let slab = SlabAllocator::new(32, 32).unwrap();
    let state = slab.state.lock().unwrap();
    let mut seen = std::collections::HashSet::new();
    let mut current = state.free_head;
    let mut steps = 0;
    while current != EMPTY {
      assert!(seen.insert(current), "cycle detected in free list");
      // SAFETY: test-internal access to a cell we know is on the free list.
      current = unsafe { (current as *const usize).read() };
      steps += 1;
      assert!(steps <= slab.capacity, "free list longer than capacity");
    }
  }
}
