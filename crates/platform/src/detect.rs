//! Runtime CPU capability detection.
//!
//! Three layers, weakest to strongest:
//!
//! - Compile-time floor via `cfg!(target_feature = "...")`, always available.
//! - Runtime probe (CPUID/XGETBV on x86, std's detector on aarch64), unioned
//!   on top where the target supports it.
//! - A process-wide cache so the probe runs once, with an override slot for
//!   harnesses that need to force a capability set before first use.
//!
//! Under Miri everything reports the empty set so only portable code runs.

mod arch;
pub(crate) mod cache_override;
pub(crate) mod compile_time;


use crate::caps::Caps;

pub use compile_time::caps_static;

/// Runs the architecture probe, bypassing the cache.
///
/// Every call re-executes the probe. Use [`caps()`](crate::caps) for the
/// cached lookup; this entry exists for diagnostics and tests.
#[must_use]
pub fn detect_uncached() -> Caps {
  #[cfg(miri)]
  {
    Caps::NONE
  }

  #[cfg(not(miri))]
  {
    arch::detect()
  }
}
