//! # slabpool - fixed-size and variable-size pool allocators
//!
//! This crate provides two user-space allocators for workloads that need
//! predictable, low-latency allocation of many short-lived objects with
//! explicit pool ownership and bulk reset semantics:
//!
//! - [`SlabAllocator`] hands out fixed-size objects from a single
//!   preallocated, page-backed region, using an intrusive singly-linked free
//!   list stored inside the objects themselves.
//! - [`PoolAllocator`] hands out variable-size, variable-alignment objects
//!   from a growing chain of regions, bump-allocating within each region and
//!   falling back to a first-fit free list (with splitting and coalescing)
//!   for returned blocks.
//!
//! ## Overview
//!
//! ```text
//!   SlabAllocator (fixed-size cells, intrusive free list):
//!
//!   ┌────────────────────────────────────────────────────────────┐
//!   │  [cell 0][cell 1][cell 2][cell 3] ... [cell N-1]            │
//!   │     ▲        free_head chains the free cells together      │
//!   └────────────────────────────────────────────────────────────┘
//!
//!   PoolAllocator (bump within a region, first-fit free list across them):
//!
//!   ┌──────────── region 0 ────────────┐ ┌──────── region 1 ────────┐
//!   │ [hdr|data][hdr|data]  free space  │ │   free space             │
//!   └──────────────────────▲────────────┘ └──────────────────────────┘
//!                     bump_offset                  (grown on demand)
//! ```
//!
//! ## Crate structure
//!
//! ```text
//!   slabpool
//!   ├── align      - alignment arithmetic shared by both allocators
//!   ├── bulk       - aligned bulk-zero utility, used by reset paths
//!   ├── region     - OS region provider (mmap/munmap)
//!   ├── spinlock   - bounded busy-wait lock for the pool's free-list path
//!   ├── error      - error types
//!   ├── slab       - SlabAllocator
//!   └── pool       - PoolAllocator
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use slabpool::{SlabAllocator, PoolAllocator};
//!
//! let slab = SlabAllocator::new(64, 48).expect("slab init failed");
//! let object = slab.alloc().expect("slab has free cells");
//! slab.free(object);
//!
//! let pool = PoolAllocator::new(4096).expect("pool init failed");
//! let buffer = pool.alloc(256, 16).expect("pool alloc failed");
//! pool.free(buffer);
//! ```
//!
//! ## Concurrency
//!
//! Both allocators are independently thread-safe: each serializes its public
//! operations behind a coarse mutex (the pool additionally nests a
//! fine-grained spin lock around free-list mutation — see [`spinlock`]).
//! There is no lock-free path and no cross-instance coordination. A spin
//! lock that cannot make progress within its bounded budget aborts the
//! process rather than deadlocking or returning a recoverable error.
//!
//! ## Safety
//!
//! Both allocators confine their raw-pointer and intrusive-free-list
//! aliasing to their own modules; the public API only ever hands callers a
//! [`std::ptr::NonNull<u8>`] to their own payload. Callers must not mutate
//! the 32 bytes preceding a returned pointer and must return the exact
//! address handed back by `alloc` to `free` (no double-free detection is
//! performed).

pub mod align;
pub mod bulk;
pub mod error;
pub mod pool;
pub mod region;
pub mod slab;
pub mod spinlock;

pub use pool::PoolAllocator;
pub use slab::SlabAllocator;
