//! Interactive walkthrough of [`slabpool::PoolAllocator`].
//!
//! Run with `cargo run --example pool_demo`. Demonstrates bump allocation,
//! growth, freeing, and coalescing.

use slabpool::PoolAllocator;

fn main() {
  tracing_subscriber::fmt::init();

  let pool = PoolAllocator::new(4096).expect("pool init failed");
  println!("[init] 1 region of 4096 bytes, region_count = {}", pool.region_count());

  let a = pool.alloc(64, 16).expect("alloc should succeed");
  let b = pool.alloc(64, 16).expect("alloc should succeed");
  println!("[alloc] a = {a:?}, b = {b:?}");

  pool.free(a);
  pool.free(b);
  println!("[free] a and b freed and coalesced into one block");

  let reused = pool
    .alloc(64 + 32 + 64, 16)
    .expect("coalesced block satisfies the combined request");
  println!("[alloc] combined-size request reused the coalesced block: {reused:?}");

  println!(
    "[grow] requesting 5000 bytes, larger than the initial region, region_count before = {}",
    pool.region_count()
  );
  let big = pool.alloc(5000, 16).expect("growth should succeed");
  println!(
    "[grow] got {big:?}, region_count after = {}",
    pool.region_count()
  );

  pool.reset();
  println!(
    "[reset] regions preserved (region_count = {}), all space reclaimed",
    pool.region_count()
  );
}
