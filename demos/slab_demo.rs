//! Interactive walkthrough of [`slabpool::SlabAllocator`].
//!
//! Run with `cargo run --example slab_demo`. Prints state, then demonstrates
//! an operation, mirroring the slab's fixed-capacity, free-list-driven
//! model.

use slabpool::SlabAllocator;

fn main() {
  tracing_subscriber::fmt::init();

  let capacity = 4;
  let object_size = 64;
  let slab = SlabAllocator::new(capacity, object_size).expect("slab init failed");
  println!(
    "[init] capacity = {capacity}, object_size = {}, usable per cell = {}",
    object_size,
    slab.object_size()
  );

  let mut handles = Vec::new();
  for i in 0..capacity {
    match slab.alloc() {
      Some(ptr) => {
        println!("[alloc {i}] got {ptr:?}");
        handles.push(ptr);
      }
      None => println!("[alloc {i}] slab exhausted"),
    }
  }

  println!(
    "[alloc {capacity}] expect exhaustion: {:?}",
    slab.alloc()
  );

  let freed = handles.pop().unwrap();
  slab.free(freed);
  println!("[free] returned {freed:?} to the free list");

  println!(
    "[alloc again] reuses the freed cell: {:?}",
    slab.alloc()
  );

  slab.reset();
  println!("[reset] full capacity available again, all bytes zeroed");
  for i in 0..capacity {
    let ptr = slab.alloc().expect("capacity restored by reset");
    println!("[alloc after reset {i}] {ptr:?}");
  }
}
