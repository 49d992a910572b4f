// ─────────────────────────────────────────────────────────────────────────────
// Detection Cache + Override System
// ─────────────────────────────────────────────────────────────────────────────

use core::fmt;

#[cfg(feature = "std")]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "std")]
use std::sync::RwLock;

use crate::cache::OnceCache;
use crate::caps::Caps;
#[cfg(not(miri))]
use crate::detect::detect_uncached;

static CACHE: OnceCache<Caps> = OnceCache::new();

#[cfg(feature = "std")]
static OVERRIDE: RwLock<Option<Caps>> = RwLock::new(None);

// Fast flag so the hot path pays one atomic load, not an RwLock read.
#[cfg(feature = "std")]
static OVERRIDE_SET: AtomicBool = AtomicBool::new(false);

/// Why installing a capability override failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideError {
  /// Detection has already run and been cached; callers may have resolved
  /// kernels against the cached value.
  AlreadyInitialized,
  /// This target has no storage for an override.
  Unsupported,
}

impl fmt::Display for OverrideError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverrideError::AlreadyInitialized => f.write_str("capability detection already initialized"),
      OverrideError::Unsupported => f.write_str("capability override unsupported on this target"),
    }
  }
}

impl core::error::Error for OverrideError {}

/// Cached, override-aware capability lookup.
///
/// While an override is installed it is returned on every call, bypassing
/// (and never populating) the cache. Otherwise the probe runs once and the
/// result is served from the cache from then on.
pub(crate) fn get() -> Caps {
  // Miri cannot execute CPUID or vector instructions; report the empty set
  // so only portable code runs under the interpreter.
  #[cfg(miri)]
  {
    Caps::NONE
  }

  #[cfg(not(miri))]
  {
    if let Some(forced) = read_override() {
      return forced;
    }
    CACHE.get_or_init(detect_uncached)
  }
}

/// Seeds the detection cache with a known capability set.
///
/// For hosts where the probe is undesirable (bare-metal with a board-known
/// feature set, for instance). First caller wins; returns the value actually
/// cached, which is the existing one if detection already ran.
pub fn init_with_caps(caps: Caps) -> Caps {
  CACHE.get_or_init(|| caps)
}

/// Installs (or clears, with `None`) a process-wide capability override.
///
/// # Panics
///
/// Panics if detection has already been cached. Use [`try_set_override`] for
/// the fallible form.
#[cold]
pub fn set_override(value: Option<Caps>) {
  if let Err(err) = try_set_override(value) {
    panic!("platform::set_caps_override failed: {err}");
  }
}

/// Fallible form of [`set_override`].
///
/// Contract: pre-init only. Once a non-overridden lookup has cached a
/// detection result, this returns [`OverrideError::AlreadyInitialized`].
#[cold]
pub fn try_set_override(value: Option<Caps>) -> Result<(), OverrideError> {
  #[cfg(feature = "std")]
  {
    if CACHE.get().is_some() {
      return Err(OverrideError::AlreadyInitialized);
    }

    match OVERRIDE.write() {
      Ok(mut guard) => {
        *guard = value;
        OVERRIDE_SET.store(value.is_some(), Ordering::Release);
        Ok(())
      }
      Err(_) => Err(OverrideError::Unsupported),
    }
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "64"))]
  {
    atomic_override::try_set(value)
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "64")))]
  {
    let _ = value;
    Err(OverrideError::Unsupported)
  }
}

/// Clears any installed override.
#[cold]
pub fn clear_override() {
  set_override(None);
}

/// Returns `true` while a capability override is installed.
#[inline]
#[must_use]
pub fn has_override() -> bool {
  #[cfg(feature = "std")]
  {
    OVERRIDE_SET.load(Ordering::Acquire)
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "64"))]
  {
    atomic_override::is_set()
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "64")))]
  {
    false
  }
}

#[cfg(not(miri))]
fn read_override() -> Option<Caps> {
  #[cfg(feature = "std")]
  {
    if !OVERRIDE_SET.load(Ordering::Acquire) {
      return None;
    }
    OVERRIDE.read().ok().and_then(|guard| *guard)
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "64"))]
  {
    atomic_override::get()
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "64")))]
  {
    None
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Atomic Override (no_std with 64-bit atomics)
// ─────────────────────────────────────────────────────────────────────────────

// A Caps is one u64, so the override slot is two plain atomics: the payload
// word and a set flag, published with release/acquire ordering.
#[cfg(all(not(feature = "std"), target_has_atomic = "64"))]
mod atomic_override {
  use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

  use super::{Caps, CACHE, OverrideError};

  static IS_SET: AtomicBool = AtomicBool::new(false);
  static VALUE: AtomicU64 = AtomicU64::new(0);

  pub(super) fn try_set(value: Option<Caps>) -> Result<(), OverrideError> {
    if CACHE.get().is_some() {
      return Err(OverrideError::AlreadyInitialized);
    }
    match value {
      Some(caps) => {
        VALUE.store(caps.to_bits(), Ordering::Relaxed);
        IS_SET.store(true, Ordering::Release);
      }
      None => IS_SET.store(false, Ordering::Release),
    }
    Ok(())
  }

  pub(super) fn is_set() -> bool {
    IS_SET.load(Ordering::Acquire)
  }

  pub(super) fn get() -> Option<Caps> {
    if !IS_SET.load(Ordering::Acquire) {
      return None;
    }
    Some(Caps::from_bits(VALUE.load(Ordering::Relaxed)))
  }
}
