//! Multi-thread exercise of both allocators.
//!
//! Unit tests in `src/slab.rs`/`src/pool.rs` cover single-threaded
//! scenarios directly. This integration test instead hammers one shared
//! allocator from several real OS threads, since both allocators are
//! documented as thread-safe and deserve more than a single-threaded
//! free-list walk.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use slabpool::{PoolAllocator, SlabAllocator};

#[test]
fn slab_survives_concurrent_alloc_free_from_many_threads() {
  const CAPACITY: usize = 256;
  const THREADS: usize = 8;
  const ROUNDS: usize = 2_000;

  let slab = Arc::new(SlabAllocator::new(CAPACITY, 64).unwrap());

  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let slab = Arc::clone(&slab);
      thread::spawn(move || {
        for _ in 0..ROUNDS {
          if let Some(ptr) = slab.alloc() {
            // Touch the payload to catch any aliasing bug between
            // concurrently-held cells.
            // SAFETY: payload is `object_size()` bytes, exclusively
            // owned until `free` below.
            unsafe {
              ptr.as_ptr().write_bytes(0xAB, slab.object_size());
            }
            slab.free(ptr);
          }
        }
      })
    })
    .collect();

  for h in handles {
    h.join().unwrap();
  }

  // The slab must still be internally consistent: every cell is
  // allocatable again and the free list is acyclic.
  let mut allocated = Vec::new();
  for _ in 0..CAPACITY {
    allocated.push(slab.alloc().expect("full capacity should be available"));
  }
  assert!(slab.alloc().is_none());

  let mut addrs = HashSet::new();
  for ptr in &allocated {
    assert!(addrs.insert(ptr.as_ptr() as usize), "duplicate cell handed out");
  }
}

#[test]
fn pool_survives_concurrent_alloc_free_from_many_threads() {
  const THREADS: usize = 8;
  const ROUNDS: usize = 2_000;

  let pool = Arc::new(PoolAllocator::new(1 << 16).unwrap());

  let handles: Vec<_> = (0..THREADS)
    .map(|i| {
      let pool = Arc::clone(&pool);
      thread::spawn(move || {
        let size = 16 + (i % 4) * 16;
        for _ in 0..ROUNDS {
          if let Some(ptr) = pool.alloc(size, 16) {
            // SAFETY: payload is `size` bytes, exclusively owned
            // until `free` below.
            unsafe {
              ptr.as_ptr().write_bytes(0xCD, size);
            }
            pool.free(ptr);
          }
        }
      })
    })
    .collect();

  for h in handles {
    h.join().unwrap();
  }

  // The pool should still be able to service a fresh allocation of every
  // size any worker used, without the growth path panicking or the
  // free-list spin lock ever hitting its fatal backstop.
  for i in 0..THREADS {
    let size = 16 + (i % 4) * 16;
    assert!(pool.alloc(size, 16).is_some());
  }
}
