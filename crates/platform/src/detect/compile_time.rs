// ─────────────────────────────────────────────────────────────────────────────
// Compile-Time Static Detection
// ─────────────────────────────────────────────────────────────────────────────

use crate::caps::Caps;

/// Returns the CPU capabilities known at compile time.
///
/// Detects features enabled via `-C target-feature=...` or `-C target-cpu=...`.
/// Evaluates to a `const`, so specialized builds pay no runtime cost and
/// no-std targets without atomics still get a correct floor.
///
/// For generic binaries that run on many CPUs, use [`caps()`](crate::caps)
/// instead; it unions this floor with the runtime probe.
///
/// # Examples
///
/// ```
/// const CAPS: platform::Caps = platform::caps_static();
///
/// #[cfg(target_arch = "x86_64")]
/// assert!(CAPS.has(platform::caps::x86::SSE2));
///
/// #[cfg(target_arch = "aarch64")]
/// assert!(CAPS.has(platform::caps::aarch64::NEON));
/// ```
#[inline(always)]
#[must_use]
pub const fn caps_static() -> Caps {
  // cfg!() is a const bool, so dead branches fold away entirely.
  #[allow(unused_macros)]
  macro_rules! detect {
    ($caps:ident; $($feature:literal => $cap:expr),+ $(,)?) => {
      $(if cfg!(target_feature = $feature) { $caps = $caps.union($cap); })+
    };
  }

  #[allow(unused_mut)]
  let mut result = Caps::NONE;

  #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
  {
    use crate::caps::x86;

    // x86_64 baseline: SSE2 is architecturally guaranteed.
    #[cfg(target_arch = "x86_64")]
    {
      result = result.union(x86::SSE2);
    }

    detect!(result;
      "sse2" => x86::SSE2,
      "ssse3" => x86::SSSE3,
      "sse4.1" => x86::SSE41,
      "avx" => x86::AVX,
      "avx2" => x86::AVX2,
      "avx512f" => x86::AVX512F,
      "avx512vl" => x86::AVX512VL,
    );
  }

  #[cfg(target_arch = "aarch64")]
  {
    // aarch64 baseline: NEON is architecturally guaranteed.
    result = result.union(crate::caps::aarch64::NEON);
  }

  result
}
