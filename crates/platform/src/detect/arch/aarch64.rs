// aarch64 Detection
// ─────────────────────────────────────────────────────────────────────────────

use crate::caps::Caps;
use crate::detect::compile_time::caps_static;

/// NEON (ASIMD) is the aarch64 architectural baseline, so the compile-time
/// floor already carries it. The runtime check exists for exotic build
/// configurations that strip the baseline (`-C target-feature=-neon`): on
/// those, std's detector still reports what the CPU actually has.
#[cfg(target_arch = "aarch64")]
pub(crate) fn detect() -> Caps {
  let static_caps = caps_static();

  #[cfg(feature = "std")]
  let caps = static_caps.union(runtime());
  #[cfg(not(feature = "std"))]
  let caps = static_caps;

  caps
}

#[cfg(all(target_arch = "aarch64", feature = "std"))]
fn runtime() -> Caps {
  use crate::caps::aarch64;

  let mut caps = Caps::NONE;
  if std::arch::is_aarch64_feature_detected!("neon") {
    caps |= aarch64::NEON;
  }
  caps
}
