//! Error types for the region provider and both allocators.
//!
//! All allocator-facing failures are precondition violations or OS resource
//! exhaustion, and are surfaced at init/growth time. `alloc` itself never
//! returns an `Err` — an empty/no-fit result is `None`, not an error (see
//! `pool::PoolAllocator::alloc` and `slab::SlabAllocator::alloc`).

use std::io;

use thiserror::Error;

/// Failure acquiring or releasing an OS-backed memory region.
#[derive(Debug, Error)]
pub enum RegionError {
  /// The underlying `mmap` call failed.
  #[error("failed to map {requested} bytes from the OS: {source}")]
  MapFailed {
    requested: usize,
    #[source]
    source: io::Error,
  },
}

/// Failure constructing a [`crate::slab::SlabAllocator`].
#[derive(Debug, Error)]
pub enum SlabError {
  /// `capacity` was zero.
  #[error("slab capacity must be at least 1")]
  ZeroCapacity,

  /// `object_size` was too small to hold the intrusive free-list link.
  #[error("object_size {given} is smaller than a machine word ({min})")]
  ObjectTooSmall { given: usize, min: usize },

  /// The OS refused to back the slab's region.
  #[error("slab region allocation failed")]
  Region(#[from] RegionError),
}

/// Failure constructing a [`crate::pool::PoolAllocator`] or growing its
/// region chain.
#[derive(Debug, Error)]
pub enum PoolError {
  /// `initial_region_size` was zero.
  #[error("initial_region_size must be at least 1")]
  ZeroRegionSize,

  /// The OS refused to back a pool region (at init or at growth time).
  #[error("pool region allocation failed")]
  Region(#[from] RegionError),
}
