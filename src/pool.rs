//! Variable-size, variable-alignment pool allocator.
//!
//! Hands out allocations from a growing chain of OS-backed regions using a
//! bump-pointer policy within each region, plus a first-fit free list with
//! splitting and coalescing across returned blocks.
//!
//! ## Block layout
//!
//! Every allocation is preceded by a 32-byte [`BlockHeader`]. The user
//! pointer returned to the caller is always `header address + 32`.
//!
//! ```text
//!   ┌──────── BlockHeader (32 bytes) ────────┬──────── payload ────────┐
//!   │ payload_size │ padding_before_payload   │                         │
//!   │              │ next_free (free only)    │     payload_size bytes  │
//!   └──────────────┴──────────────────────────┴─────────────────────────┘
//! ```
//!
//! `next_free` is only meaningful while the block sits on the free list;
//! live blocks never have it read.

use std::ptr::NonNull;
use std::sync::Mutex;

use crate::align::{align_up, is_valid_alignment};
use crate::bulk::bulk_set;
use crate::error::PoolError;
use crate::region::OsRegion;
use crate::spinlock::SpinLock;

/// Size, in bytes, of the header placed before every allocation.
pub const BLOCK_HEADER_SIZE: usize = 32;

/// The minimum leftover payload a free-list match must have, beyond the
/// requested size and a new header, to be worth splitting into a remainder
/// block.
const MIN_SPLIT_REMAINDER: usize = 16;

/// Sentinel free-list / "no next region" value.
const EMPTY: usize = 0;

#[repr(C)]
struct BlockHeader {
  payload_size: usize,
  padding_before_payload: usize,
  next_free: usize,
  _reserved: usize,
}

const _: () = assert!(std::mem::size_of::<BlockHeader>() == BLOCK_HEADER_SIZE);

struct PoolRegion {
  os: OsRegion,
  bump_offset: usize,
}

struct PoolState {
  regions: Vec<PoolRegion>,
  free_head: usize,
}

/// A variable-size allocator over a growing chain of OS-mapped regions.
///
/// Every public operation takes the coarse mutex first; free-list mutation
/// additionally takes the fine-grained [`SpinLock`] while already holding
/// it. The nested lock is provably redundant under the coarse mutex, but
/// the two stay distinct by design rather than being collapsed into one.
pub struct PoolAllocator {
  initial_region_size: usize,
  state: Mutex<PoolState>,
  free_list_lock: SpinLock,
}

impl PoolAllocator {
  /// Initializes a pool with one region of `initial_region_size` bytes.
  ///
  /// `mmap`-backed regions are always page-aligned, which is a stronger
  /// guarantee than the 16-byte alignment the usable base needs, so no
  /// extra alignment step is needed here.
  pub fn new(initial_region_size: usize) -> Result<Self, PoolError> {
    if initial_region_size == 0 {
      return Err(PoolError::ZeroRegionSize);
    }

    let os = OsRegion::acquire(initial_region_size)?;
    debug_assert_eq!(os.base().as_ptr() as usize % 16, 0);

    tracing::debug!(initial_region_size, "pool initialized");

    Ok(Self {
      initial_region_size,
      state: Mutex::new(PoolState {
        regions: vec![PoolRegion { os, bump_offset: 0 }],
        free_head: EMPTY,
      }),
      free_list_lock: SpinLock::new(),
    })
  }

  /// Number of regions currently in the chain.
  pub fn region_count(&self) -> usize {
    self.state.lock().unwrap().regions.len()
  }

  /// Allocates `size` bytes aligned to `alignment` (a power of two).
  ///
  /// Tries, in order: a first-fit match on the free list (splitting the
  /// match if the remainder is large enough to be useful), then bump
  /// allocation within an existing region, then growing the chain by one
  /// region and retrying the bump there. Returns `None` on any
  /// precondition violation or if growth is refused by the OS — both
  /// collapse to the same sentinel.
  pub fn alloc(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
    if size == 0 || !is_valid_alignment(alignment) {
      return None;
    }

    let mut state = self.state.lock().unwrap();

    {
      let _guard = self.free_list_lock.lock();
      if let Some(ptr) = Self::first_fit(&mut state, size, alignment) {
        return Some(ptr);
      }
    }

    for idx in 0..state.regions.len() {
      if let Some(ptr) = Self::bump_in_region(&mut state.regions[idx], size, alignment) {
        return Some(ptr);
      }
    }

    let grow_size = self
      .initial_region_size
      .max(size + BLOCK_HEADER_SIZE + alignment);
    let os = match OsRegion::acquire(grow_size) {
      Ok(os) => os,
      Err(err) => {
        tracing::debug!(error = %err, size, alignment, "pool growth failed");
        return None;
      }
    };

    state.regions.push(PoolRegion { os, bump_offset: 0 });
    tracing::debug!(
      grow_size,
      region_count = state.regions.len(),
      "pool grew by one region"
    );

    let idx = state.regions.len() - 1;
    Self::bump_in_region(&mut state.regions[idx], size, alignment)
  }

  /// Returns a previously allocated block to the free list, then runs
  /// coalescing over the whole free list.
  ///
  /// `ptr` must have been returned by [`Self::alloc`] on this allocator
  /// and not already freed.
  pub fn free(&self, ptr: NonNull<u8>) {
    let header_addr = ptr.as_ptr() as usize - BLOCK_HEADER_SIZE;

    let mut state = self.state.lock().unwrap();
    let _guard = self.free_list_lock.lock();

    // SAFETY: `header_addr` is the header of a block this allocator
    // previously handed out (caller contract).
    let header = unsafe { &mut *(header_addr as *mut BlockHeader) };
    header.next_free = state.free_head;
    state.free_head = header_addr;

    Self::coalesce(&mut state);
  }

  /// Returns the pool to a freshly-initialized state (free list cleared,
  /// every region's bump offset reset to 0, every region's bytes zeroed),
  /// without releasing any region — the chain length survives a reset.
  pub fn reset(&self) {
    let mut state = self.state.lock().unwrap();
    state.free_head = EMPTY;
    for region in &mut state.regions {
      region.bump_offset = 0;
      // SAFETY: the region is exclusively owned by this allocator and
      // is `os.size()` bytes long.
      unsafe {
        bulk_set(region.os.base().as_ptr(), 0, region.os.size());
      }
    }
  }

  /// First-fit search over the free list. Only a block whose *payload
  /// address* (not merely some aligned sub-range) satisfies `alignment`
  /// is considered a match — a deliberate choice, not an oversight.
  fn first_fit(state: &mut PoolState, size: usize, alignment: usize) -> Option<NonNull<u8>> {
    let mut prev: usize = EMPTY;
    let mut current = state.free_head;

    while current != EMPTY {
      // SAFETY: `current` is a free-list header address written by
      // this allocator (either at `free` time or by a prior split).
      let header = unsafe { &mut *(current as *mut BlockHeader) };
      let candidate_payload = current + BLOCK_HEADER_SIZE;
      let next = header.next_free;

      if candidate_payload % alignment == 0 && header.payload_size >= size {
        if prev == EMPTY {
          state.free_head = next;
        } else {
          // SAFETY: `prev` is the previously-visited free-list header.
          let prev_header = unsafe { &mut *(prev as *mut BlockHeader) };
          prev_header.next_free = next;
        }

        if header.payload_size >= size + BLOCK_HEADER_SIZE + MIN_SPLIT_REMAINDER {
          let remainder_addr = current + BLOCK_HEADER_SIZE + size;
          let remainder_payload_size = header.payload_size - size - BLOCK_HEADER_SIZE;
          header.payload_size = size;

          // SAFETY: `remainder_addr` lies within the original
          // block, which this allocator owns.
          let remainder = unsafe { &mut *(remainder_addr as *mut BlockHeader) };
          remainder.payload_size = remainder_payload_size;
          remainder.padding_before_payload = 0;
          remainder.next_free = state.free_head;
          state.free_head = remainder_addr;
        }

        header.next_free = EMPTY;
        return NonNull::new(candidate_payload as *mut u8);
      }

      prev = current;
      current = next;
    }

    None
  }

  /// Attempts a bump allocation within a single region.
  fn bump_in_region(region: &mut PoolRegion, size: usize, alignment: usize) -> Option<NonNull<u8>> {
    let base = region.os.base().as_ptr() as usize;
    let raw = base + region.bump_offset;
    let aligned_payload = align_up(raw + BLOCK_HEADER_SIZE, alignment);
    let padding = aligned_payload - (raw + BLOCK_HEADER_SIZE);
    let required = BLOCK_HEADER_SIZE + padding + size;

    if region.bump_offset + required > region.os.size() {
      return None;
    }

    let header_addr = aligned_payload - BLOCK_HEADER_SIZE;
    // SAFETY: `header_addr..aligned_payload + size` was just shown to
    // fit within the region.
    let header = unsafe { &mut *(header_addr as *mut BlockHeader) };
    header.payload_size = size;
    header.padding_before_payload = padding;
    header.next_free = EMPTY;

    region.bump_offset += required;
    NonNull::new(aligned_payload as *mut u8)
  }

  /// Sorts the free list by address and merges every run of physically
  /// adjacent blocks into one, then rebuilds the chain in ascending
  /// address order.
  fn coalesce(state: &mut PoolState) {
    let mut addrs = Vec::new();
    let mut current = state.free_head;
    while current != EMPTY {
      // SAFETY: walking our own free list.
      let header = unsafe { &*(current as *const BlockHeader) };
      addrs.push(current);
      current = header.next_free;
    }
    addrs.sort_unstable();

    let mut merged: Vec<usize> = Vec::with_capacity(addrs.len());
    for addr in addrs {
      // SAFETY: `addr` is a free-list header.
      let payload_size = unsafe { (*(addr as *const BlockHeader)).payload_size };
      if let Some(&last) = merged.last() {
        // SAFETY: `last` was pushed from the same walk above.
        let last_header = unsafe { &mut *(last as *mut BlockHeader) };
        if last + BLOCK_HEADER_SIZE + last_header.payload_size == addr {
          last_header.payload_size += BLOCK_HEADER_SIZE + payload_size;
          continue;
        }
      }
      merged.push(addr);
    }

    for window in merged.windows(2) {
      // SAFETY: both entries are surviving free-list headers.
      let header = unsafe { &mut *(window[0] as *mut BlockHeader) };
      header.next_free = window[1];
    }
    if let Some(&last) = merged.last() {
      // SAFETY: `last` is a surviving free-list header.
      let header = unsafe { &mut *(last as *mut BlockHeader) };
      header.next_free = EMPTY;
    }

    state.free_head = merged.first().copied().unwrap_or(EMPTY);
  }
}
