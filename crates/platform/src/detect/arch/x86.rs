// x86 / x86_64 Detection
// ─────────────────────────────────────────────────────────────────────────────

use crate::caps::Caps;
use crate::detect::compile_time::caps_static;

// XCR0 bits the OS must enable before the wider register files are usable.
// Bits 1-2: XMM + YMM state (required for AVX).
#[cfg(all(target_arch = "x86_64", feature = "std"))]
const XCR0_AVX_MASK: u64 = 0x6;
// Bits 5-7: opmask + ZMM_Hi256 + Hi16_ZMM state (required for AVX-512).
#[cfg(all(target_arch = "x86_64", feature = "std"))]
const XCR0_AVX512_MASK: u64 = 0xE0;

#[cfg(target_arch = "x86_64")]
pub(crate) fn detect() -> Caps {
  // Compile-time floor, includes the SSE2 baseline.
  let static_caps = caps_static();

  #[cfg(feature = "std")]
  let caps = {
    use crate::caps::x86;

    let batch = cpuid_batch();
    let mut caps = static_caps.union(batch.caps);

    // Hybrid Intel parts pair AVX-512-capable P-cores with E-cores that
    // lack it. A thread migrating mid-kernel would SIGILL, so AVX-512 is
    // reported on those models only when the user explicitly opts in.
    if is_intel_hybrid(batch.is_amd, batch.family, batch.model) && !hybrid_avx512_override() {
      caps = caps.difference(x86::AVX512F).difference(x86::AVX512VL);
    }

    caps
  };
  #[cfg(not(feature = "std"))]
  let caps = static_caps;

  caps
}

#[cfg(target_arch = "x86")]
pub(crate) fn detect() -> Caps {
  #[allow(unused_mut)]
  let mut caps = caps_static();

  // SSE2 is not baseline on 32-bit x86; everything is probed at runtime.
  // The std detector also handles the OSXSAVE/XCR0 gating for AVX tiers.
  #[cfg(feature = "std")]
  {
    use crate::caps::x86;

    if std::arch::is_x86_feature_detected!("sse2") {
      caps |= x86::SSE2;
    }
    if std::arch::is_x86_feature_detected!("ssse3") {
      caps |= x86::SSSE3;
    }
    if std::arch::is_x86_feature_detected!("sse4.1") {
      caps |= x86::SSE41;
    }
    if std::arch::is_x86_feature_detected!("avx") {
      caps |= x86::AVX;
    }
    if std::arch::is_x86_feature_detected!("avx2") {
      caps |= x86::AVX2;
    }
    if std::arch::is_x86_feature_detected!("avx512f") {
      caps |= x86::AVX512F;
    }
    if std::arch::is_x86_feature_detected!("avx512vl") {
      caps |= x86::AVX512VL;
    }
  }

  caps
}

/// Single-pass CPUID extraction: feature bits plus the vendor/family/model
/// the hybrid-core policy needs.
#[cfg(all(target_arch = "x86_64", feature = "std"))]
struct CpuidBatch {
  caps: Caps,
  is_amd: bool,
  family: u32,
  model: u32,
}

/// Probes CPUID leaves 0, 1 and (when supported) 7.0, plus XGETBV.
///
/// AVX-family bits are only trusted once the OS advertises that it saves the
/// wider register state: OSXSAVE first, then the XCR0 enable masks. Without
/// that gating a reported bit could still SIGILL at first use.
#[cfg(all(target_arch = "x86_64", feature = "std"))]
fn cpuid_batch() -> CpuidBatch {
  use core::arch::x86_64::{__cpuid, __cpuid_count, _xgetbv};

  use crate::caps::x86;

  let mut caps = Caps::NONE;

  // SAFETY: CPUID leaf 0 is valid on every x86_64 CPU.
  let cpuid0 = unsafe { __cpuid(0) };
  let max_id = cpuid0.eax;
  // "AuthenticAMD" puts 0x6874_7541 ("Auth") in EBX.
  let is_amd = cpuid0.ebx == 0x6874_7541;

  // SAFETY: leaf 1 is architecturally guaranteed (max_id >= 1 everywhere).
  let cpuid1 = unsafe { __cpuid(1) };

  let base_family = (cpuid1.eax >> 8) & 0xF;
  let family = base_family + ((cpuid1.eax >> 20) & 0xFF);
  let model = {
    let base = (cpuid1.eax >> 4) & 0xF;
    if base_family == 6 || base_family == 15 {
      base + (((cpuid1.eax >> 16) & 0xF) << 4)
    } else {
      base
    }
  };

  caps |= x86::SSE2;
  if cpuid1.ecx & (1 << 9) != 0 {
    caps |= x86::SSSE3;
  }
  if cpuid1.ecx & (1 << 19) != 0 {
    caps |= x86::SSE41;
  }

  let osxsave = cpuid1.ecx & (1 << 27) != 0;
  // SAFETY: XGETBV with ECX=0 is valid when OSXSAVE is set; guarded above.
  let xcr0 = if osxsave { unsafe { _xgetbv(0) } } else { 0 };
  let os_avx = xcr0 & XCR0_AVX_MASK == XCR0_AVX_MASK;
  let os_avx512 = xcr0 & XCR0_AVX512_MASK == XCR0_AVX512_MASK;

  if os_avx {
    if cpuid1.ecx & (1 << 28) != 0 {
      caps |= x86::AVX;
    }
    if max_id >= 7 {
      // SAFETY: leaf 7 gated on the maximum supported leaf above.
      let cpuid7 = unsafe { __cpuid_count(7, 0) };
      if cpuid7.ebx & (1 << 5) != 0 {
        caps |= x86::AVX2;
      }
      if os_avx512 {
        if cpuid7.ebx & (1 << 16) != 0 {
          caps |= x86::AVX512F;
        }
        if cpuid7.ebx & (1 << 31) != 0 {
          caps |= x86::AVX512VL;
        }
      }
    }
  }

  CpuidBatch {
    caps,
    is_amd,
    family,
    model,
  }
}

/// Hybrid Intel models (Alder Lake onward) mixing P-cores and E-cores.
#[cfg(all(target_arch = "x86_64", feature = "std"))]
fn is_intel_hybrid(is_amd: bool, family: u32, model: u32) -> bool {
  if is_amd || family != 6 {
    return false;
  }
  matches!(
    model,
    0x97 | 0x9A | 0x9C | 0xAA | 0xAC | 0xB7 | 0xBA | 0xBD | 0xBF | 0xC5 | 0xC6
  )
}

/// `TREEHASH_FORCE_AVX512=1` (or `true`) restores AVX-512 reporting on
/// hybrid parts, for processes pinned to P-cores.
#[cfg(all(target_arch = "x86_64", feature = "std"))]
fn hybrid_avx512_override() -> bool {
  match std::env::var("TREEHASH_FORCE_AVX512") {
    Ok(value) => value == "1" || value.eq_ignore_ascii_case("true"),
    Err(_) => false,
  }
}
