//! Walks the capability override through each hardware tier and checks what
//! dispatch resolves, with live output checks whenever the host can actually
//! execute what it was forced to. One sequenced test in its own binary:
//! overrides are process-global.

use platform::Caps;
use treehash::{IV, KEYED_HASH, OUT_LEN};

mod common;

use common::{key_words, pattern, tree_hash};

const KEY: &[u8; treehash::KEY_LEN] = b"whats the Elvish word for friend";

/// Output check for one forced tier. Skipped when the host lacks the forced
/// capabilities: selection is still exercised above, but running the kernels
/// would fault.
fn check_live_outputs(forced: Caps) {
  if !platform::detect_uncached().has(forced) {
    return;
  }
  let key = key_words(KEY);
  for &len in &[0usize, 65, 1024, 2049, 10_000] {
    let input = pattern(len);
    assert_eq!(
      tree_hash(&input, &IV, 0, OUT_LEN),
      blake3::hash(&input).as_bytes(),
      "hash len={len}"
    );
    assert_eq!(
      tree_hash(&input, &key, KEYED_HASH, OUT_LEN),
      blake3::keyed_hash(KEY, &input).as_bytes(),
      "keyed len={len}"
    );
  }
}

#[cfg(target_arch = "x86_64")]
fn x86_tiers() {
  use platform::caps::x86;

  let sse = x86::SSE2 | x86::SSSE3 | x86::SSE41;
  let avx2 = sse | x86::AVX | x86::AVX2;
  let f_only = avx2 | x86::AVX512F;
  let full = f_only | x86::AVX512VL;

  platform::set_caps_override(Some(sse));
  #[cfg(not(feature = "no_sse41"))]
  {
    assert_eq!(treehash::compress_kernel_name(), "sse4.1");
    assert_eq!(treehash::hash_many_kernel_name(), "sse4.1");
    assert_eq!(treehash::simd_degree(), 4);
  }
  check_live_outputs(sse);

  platform::set_caps_override(Some(avx2));
  #[cfg(not(any(feature = "no_sse41", feature = "no_avx2")))]
  {
    assert_eq!(treehash::compress_kernel_name(), "sse4.1");
    assert_eq!(treehash::hash_many_kernel_name(), "avx2");
    assert_eq!(treehash::simd_degree(), 8);
  }
  check_live_outputs(avx2);

  // AVX-512 without VL: the batch ladder upgrades, the single-block ladder
  // stays on SSE4.1.
  platform::set_caps_override(Some(f_only));
  #[cfg(not(any(feature = "no_sse41", feature = "no_avx2", feature = "no_avx512")))]
  {
    assert_eq!(treehash::compress_kernel_name(), "sse4.1");
    assert_eq!(treehash::hash_many_kernel_name(), "avx512");
    assert_eq!(treehash::simd_degree(), 16);
  }
  check_live_outputs(f_only);

  platform::set_caps_override(Some(full));
  #[cfg(not(any(feature = "no_sse41", feature = "no_avx2", feature = "no_avx512")))]
  {
    assert_eq!(treehash::compress_kernel_name(), "avx512vl");
    assert_eq!(treehash::hash_many_kernel_name(), "avx512");
    assert_eq!(treehash::simd_degree(), 16);
  }
  check_live_outputs(full);
}

#[cfg(target_arch = "aarch64")]
fn neon_tier() {
  use platform::caps::aarch64;

  platform::set_caps_override(Some(aarch64::NEON));
  #[cfg(not(feature = "no_neon"))]
  {
    assert_eq!(treehash::compress_kernel_name(), "portable");
    assert_eq!(treehash::hash_many_kernel_name(), "neon");
    assert_eq!(treehash::simd_degree(), 4);
  }
  check_live_outputs(aarch64::NEON);
}

#[test]
fn forced_tiers_resolve_and_run() {
  // Floor first: the empty set must resolve portable everywhere.
  platform::set_caps_override(Some(Caps::NONE));
  assert_eq!(treehash::compress_kernel_name(), "portable");
  assert_eq!(treehash::hash_many_kernel_name(), "portable");
  assert_eq!(treehash::simd_degree(), 1);
  check_live_outputs(Caps::NONE);

  #[cfg(target_arch = "x86_64")]
  x86_tiers();

  #[cfg(target_arch = "aarch64")]
  neon_tier();

  platform::clear_caps_override();
}
