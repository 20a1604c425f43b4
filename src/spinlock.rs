//! Bounded busy-wait lock for the pool allocator's free-list mutation path.
//!
//! This lock is always acquired while already holding the pool's coarse
//! mutex — making it redundant in practice, but kept as a deliberate design
//! choice rather than collapsed into the outer mutex. The spin has a
//! bounded attempt count acting as a deadlock-detector backstop: exceeding
//! it means the lock protocol itself is broken (not resource pressure), so
//! it aborts the process rather than returning a recoverable error.
//!
//! Modeled after the spin-then-yield compare_exchange loops used for
//! intrusive free lists elsewhere in the allocator literature (a plain
//! `AtomicBool` guarded by acquire/release ordering, no OS mutex).

use std::sync::atomic::{AtomicBool, Ordering};

/// Number of pure spin attempts (via [`std::hint::spin_loop`]) before we
/// start yielding the thread, and the point past which we give up entirely.
const SPIN_ATTEMPTS: u32 = 1_000;
const YIELD_ATTEMPTS: u32 = 10_000;

/// A busy-wait mutual exclusion lock with a bounded spin count.
pub struct SpinLock {
  locked: AtomicBool,
}

impl SpinLock {
  pub const fn new() -> Self {
    Self {
      locked: AtomicBool::new(false),
    }
  }

  /// Acquires the lock, busy-waiting if necessary.
  ///
  /// Aborts the process if the lock cannot be acquired within the bounded
  /// spin budget — see the module documentation.
  pub fn lock(&self) -> SpinGuard<'_> {
    let mut attempts: u32 = 0;

    loop {
      if self
        .locked
        .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
      {
        return SpinGuard { lock: self };
      }

      attempts += 1;

      if attempts == SPIN_ATTEMPTS {
        tracing::warn!("pool free-list spin lock exceeded pure-spin budget, yielding");
      }

      if attempts >= YIELD_ATTEMPTS {
        tracing::error!(
          attempts,
          "pool free-list spin lock timed out; this indicates lock-protocol \
           corruption, not resource pressure — aborting"
        );
        std::process::abort();
      }

      if attempts > SPIN_ATTEMPTS {
        std::thread::yield_now();
      } else {
        std::hint::spin_loop();
      }
    }
  }
}

/// RAII guard releasing the [`SpinLock`] on drop.
pub struct SpinGuard<'a> {
  lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
  fn drop(&mut self) {
    self.lock.locked.store(false, Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::thread;

  #[test]
  fn mutual_exclusion_across_threads() {
    let lock = Arc::new(SpinLock::new());
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let lock = Arc::clone(&lock);
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
          for _ in 0..1000 {
            let _guard = lock.lock();
            counter.fetch_add(1, Ordering::Relaxed);
          }
        })
      })
      .collect();

    for h in handles {
      h.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::Relaxed), 8000);
  }

  #[test]
  fn lock_is_reentrant_after_guard_drops() {
    let lock = SpinLock::new();
    {
      let _guard = lock.lock();
    }
    let _guard2 = lock.lock();
  }
}
