//! CPU capability detection and caching for the treehash kernels.
//!
//! This crate is the single source of truth for "what can this CPU run".
//! The dispatch tables in `treehash` key every kernel on a required
//! capability subset; this crate answers the membership question.
//!
//! # Main Entry Point
//!
//! ```
//! let caps = platform::caps();
//!
//! if caps.has(platform::caps::x86::AVX2) {
//!   // the 8-wide batch kernel can run here
//! }
//! ```
//!
//! # Design
//!
//! 1. **One probe per process**: runtime detection runs once and is cached;
//!    every caller observes the same converged value, including the empty
//!    set, which is a real answer and not a sentinel.
//! 2. **Compile-time floor**: features fixed by `-C target-feature` are
//!    reported even where no runtime probe exists.
//! 3. **Injectable**: a process-wide override installed before first use
//!    substitutes for detection, so harnesses can force any capability set
//!    through the production code path. No test-only compilation of the
//!    lookup itself.
//! 4. **Miri-safe**: under Miri every lookup reports the empty set, keeping
//!    the interpreter on portable code.

#![no_std]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]

#[cfg(feature = "std")]
extern crate std;

#[cfg(test)]
extern crate alloc;

// ─────────────────────────────────────────────────────────────────────────────
// Core modules
// ─────────────────────────────────────────────────────────────────────────────

mod cache;
pub mod caps;
mod detect;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub use cache::OnceCache;
pub use caps::{Arch, Caps};
pub use detect::cache_override::OverrideError;
pub use detect::{caps_static, detect_uncached};

/// The capabilities of the executing CPU, cached after the first call.
///
/// While a capability override is installed (see [`set_caps_override`]),
/// the override is returned instead, on every call.
#[inline]
#[must_use]
pub fn caps() -> Caps {
  detect::cache_override::get()
}

/// Seeds the capability cache with a known set, skipping the probe.
///
/// First caller wins; returns the value actually cached, which is the
/// existing one if detection already ran.
pub fn init_with_caps(caps: Caps) -> Caps {
  detect::cache_override::init_with_caps(caps)
}

/// Installs (or clears, with `None`) a process-wide capability override.
///
/// Dispatch resolves against the override on every call while it is
/// installed. Must be called before the first non-overridden [`caps`]
/// lookup.
///
/// # Panics
///
/// Panics if detection has already been cached; see
/// [`try_set_caps_override`] for the fallible form.
#[cold]
pub fn set_caps_override(value: Option<Caps>) {
  detect::cache_override::set_override(value);
}

/// Fallible form of [`set_caps_override`].
///
/// # Errors
///
/// [`OverrideError::AlreadyInitialized`] once a non-overridden lookup has
/// cached a detection result; [`OverrideError::Unsupported`] on targets
/// with no override storage.
#[cold]
pub fn try_set_caps_override(value: Option<Caps>) -> Result<(), OverrideError> {
  detect::cache_override::try_set_override(value)
}

/// Clears any installed capability override.
#[cold]
pub fn clear_caps_override() {
  detect::cache_override::clear_override();
}

/// Returns `true` while a capability override is installed.
#[inline]
#[must_use]
pub fn has_override() -> bool {
  detect::cache_override::has_override()
}
