//! One-time initialization cell backing the capability cache.

/// Lazily-initialized, process-wide cell for `Copy` data.
///
/// The stored value is computed at most once per cell and then served from
/// the cache. "Never computed" is a distinct state from every stored value,
/// including the empty capability set. The initializer must not panic; the
/// detection probes stored here are total functions.
///
/// Three build flavors:
/// - `std`: thin wrapper over [`std::sync::OnceLock`].
/// - no-std with 8-bit atomics: a CAS state machine; losing racers spin
///   until the winner publishes, so every caller observes the same value.
/// - no-std without atomics: nothing can be cached soundly, so the
///   initializer runs on every call. Still correct, just uncached.
pub use imp::OnceCache;

#[cfg(feature = "std")]
mod imp {
  use std::sync::OnceLock;

  pub struct OnceCache<T> {
    cell: OnceLock<T>,
  }

  impl<T: Copy> OnceCache<T> {
    #[must_use]
    pub const fn new() -> Self {
      Self { cell: OnceLock::new() }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> T {
      *self.cell.get_or_init(init)
    }

    pub fn get(&self) -> Option<T> {
      self.cell.get().copied()
    }
  }
}

#[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
mod imp {
  use core::cell::UnsafeCell;
  use core::mem::MaybeUninit;
  use core::sync::atomic::{AtomicU8, Ordering};

  const UNINIT: u8 = 0;
  const BUSY: u8 = 1;
  const READY: u8 = 2;

  pub struct OnceCache<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
  }

  // SAFETY: `value` is written exactly once, by the thread that wins the
  // UNINIT -> BUSY transition, and only read after `state` is READY. The
  // release store of READY publishes the write; acquire loads observe it.
  unsafe impl<T: Copy + Send + Sync> Sync for OnceCache<T> {}

  impl<T: Copy> OnceCache<T> {
    #[must_use]
    pub const fn new() -> Self {
      Self {
        state: AtomicU8::new(UNINIT),
        value: UnsafeCell::new(MaybeUninit::uninit()),
      }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> T {
      match self
        .state
        .compare_exchange(UNINIT, BUSY, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => {
          let value = init();
          // SAFETY: this thread won the UNINIT -> BUSY transition, so it
          // holds exclusive write access until READY is published.
          unsafe { (*self.value.get()).write(value) };
          self.state.store(READY, Ordering::Release);
          value
        }
        Err(mut state) => {
          while state != READY {
            core::hint::spin_loop();
            state = self.state.load(Ordering::Acquire);
          }
          // SAFETY: READY was observed with acquire ordering, so the
          // winner's write to `value` happens-before this read.
          unsafe { (*self.value.get()).assume_init() }
        }
      }
    }

    pub fn get(&self) -> Option<T> {
      if self.state.load(Ordering::Acquire) == READY {
        // SAFETY: READY observed with acquire ordering, see above.
        Some(unsafe { (*self.value.get()).assume_init() })
      } else {
        None
      }
    }
  }
}

#[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
mod imp {
  use core::marker::PhantomData;

  pub struct OnceCache<T> {
    _marker: PhantomData<T>,
  }

  impl<T: Copy> OnceCache<T> {
    #[must_use]
    pub const fn new() -> Self {
      Self { _marker: PhantomData }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> T {
      init()
    }

    pub fn get(&self) -> Option<T> {
      None
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use core::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn initializes_exactly_once() {
    let calls = AtomicUsize::new(0);
    let cache = OnceCache::new();
    assert_eq!(cache.get(), None);

    let first = cache.get_or_init(|| {
      calls.fetch_add(1, Ordering::Relaxed);
      7u32
    });
    let second = cache.get_or_init(|| {
      calls.fetch_add(1, Ordering::Relaxed);
      9u32
    });

    assert_eq!(first, 7);
    assert_eq!(second, 7);
    assert_eq!(cache.get(), Some(7));
    assert_eq!(calls.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn caches_the_zero_value() {
    // Zero must be served from the cache like any other value.
    let calls = AtomicUsize::new(0);
    let cache = OnceCache::new();

    let value = cache.get_or_init(|| {
      calls.fetch_add(1, Ordering::Relaxed);
      0u64
    });
    assert_eq!(value, 0);
    assert_eq!(cache.get(), Some(0));

    let value = cache.get_or_init(|| {
      calls.fetch_add(1, Ordering::Relaxed);
      1u64
    });
    assert_eq!(value, 0);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
  }

  #[cfg(feature = "std")]
  #[test]
  fn concurrent_first_use_converges() {
    use std::sync::Barrier;
    use std::vec::Vec;

    static CACHE: OnceCache<usize> = OnceCache::new();
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let barrier = Barrier::new(8);
    std::thread::scope(|scope| {
      let handles: Vec<_> = (0..8)
        .map(|_| {
          scope.spawn(|| {
            barrier.wait();
            CACHE.get_or_init(|| 1 + CALLS.fetch_add(1, Ordering::Relaxed))
          })
        })
        .collect();
      let values: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
      assert!(values.windows(2).all(|pair| pair[0] == pair[1]));
    });

    assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    assert_eq!(CACHE.get(), Some(1));
  }
}
