// Architecture-specific runtime probes.
//
// Each architecture's probe lives in its own file; this module selects one at
// build time and funnels every other architecture to the empty set.

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
mod x86;

use crate::caps::Caps;

/// Runs the probe for the build's architecture.
///
/// Total: unknown architectures report the empty set, never an error.
pub(crate) fn detect() -> Caps {
  #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
  {
    x86::detect()
  }
  #[cfg(target_arch = "aarch64")]
  {
    aarch64::detect()
  }
  #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
  {
    Caps::NONE
  }
}
