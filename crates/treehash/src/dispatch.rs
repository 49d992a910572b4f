//! Runtime kernel selection and the public hashing operations.
//!
//! Selection is a first-match scan of the capability ladders in
//! [`crate::kernels`]: the first entry whose required bits are all present
//! in the detected capability set wins. The winning pair is resolved once
//! per process and cached; while a capability override is installed, every
//! call re-resolves against the override and the cache stays untouched, so
//! a later clear falls back to the real hardware answer.

use platform::{Caps, OnceCache};

#[cfg(any(test, feature = "testing"))]
use crate::kernels::{CompressKernelId, HashManyKernelId};
use crate::kernels::{
  COMPRESS_LADDER, CompressEntry, HASH_MANY_LADDER, HashManyEntry, PORTABLE_COMPRESS,
  PORTABLE_HASH_MANY,
};
use crate::{BLOCK_LEN, OUT_LEN};

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// The kernel pair chosen for this process.
#[derive(Clone, Copy)]
struct Selected {
  compress: CompressEntry,
  hash_many: HashManyEntry,
}

static ACTIVE: OnceCache<Selected> = OnceCache::new();

fn select_compress(caps: Caps) -> CompressEntry {
  for entry in COMPRESS_LADDER {
    if caps.has(entry.required) {
      return *entry;
    }
  }
  PORTABLE_COMPRESS
}

fn select_hash_many(caps: Caps) -> HashManyEntry {
  for entry in HASH_MANY_LADDER {
    if caps.has(entry.required) {
      return *entry;
    }
  }
  PORTABLE_HASH_MANY
}

fn resolve(caps: Caps) -> Selected {
  Selected {
    compress: select_compress(caps),
    hash_many: select_hash_many(caps),
  }
}

#[inline]
fn active() -> Selected {
  if platform::has_override() {
    return resolve(platform::caps());
  }
  ACTIVE.get_or_init(|| resolve(platform::caps()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Public operations
// ─────────────────────────────────────────────────────────────────────────────

/// Compresses one block in place, replacing `cv` with the output chaining
/// value.
///
/// `block` is always read in full; `block_len` records how many of its bytes
/// are meaningful (always [`BLOCK_LEN`] except for a trailing short block,
/// which the caller zero-pads) and is folded into the state. `flags` is an
/// OR of the block-domain flag constants.
#[inline]
pub fn compress_in_place(
  cv: &mut [u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
) {
  (active().compress.in_place)(cv, block, block_len, counter, flags);
}

/// Compresses one block and returns all sixteen output words as 64 bytes of
/// little-endian extended output.
///
/// The first 32 bytes equal the chaining value that [`compress_in_place`]
/// would produce; the second 32 bytes extend it, which is what lets one
/// root block yield arbitrarily long output across counter values.
#[inline]
#[must_use]
pub fn compress_xof(
  cv: &[u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
) -> [u8; BLOCK_LEN] {
  let mut out = [0u8; BLOCK_LEN];
  (active().compress.xof)(cv, block, block_len, counter, flags, &mut out);
  out
}

/// Hashes a batch of equal-length inputs, writing one 32-byte chaining value
/// per input to `out`.
///
/// Every input is `blocks` full blocks long; no short blocks appear here,
/// because batch hashing only ever sees whole chunks and parent blocks.
/// `flags_start` is OR'd into the first block's flags and `flags_end` into
/// the last (both, for a single-block input). When `increment_counter` is
/// set, input `i` uses `counter + i`; otherwise all inputs share `counter`.
///
/// # Panics
///
/// Panics if any input is shorter than `blocks * BLOCK_LEN`, or if `out` is
/// shorter than `inputs.len() * OUT_LEN`.
pub fn hash_many(
  inputs: &[&[u8]],
  blocks: usize,
  key: &[u32; 8],
  counter: u64,
  increment_counter: bool,
  flags: u8,
  flags_start: u8,
  flags_end: u8,
  out: &mut [u8],
) {
  assert!(
    out.len() >= inputs.len() * OUT_LEN,
    "output holds {} bytes, needs {}",
    out.len(),
    inputs.len() * OUT_LEN
  );
  for (i, input) in inputs.iter().enumerate() {
    assert!(
      input.len() >= blocks * BLOCK_LEN,
      "input {i} holds {} bytes, needs {}",
      input.len(),
      blocks * BLOCK_LEN
    );
  }
  (active().hash_many.hash_many)(
    inputs,
    blocks,
    key,
    counter,
    increment_counter,
    flags,
    flags_start,
    flags_end,
    out,
  );
}

// ─────────────────────────────────────────────────────────────────────────────
// Introspection
// ─────────────────────────────────────────────────────────────────────────────

/// The native batch width of the active [`hash_many`] kernel.
///
/// Callers sizing work queues should aim for multiples of this; smaller
/// batches still work but waste lanes.
#[inline]
#[must_use]
pub fn simd_degree() -> usize {
  active().hash_many.degree
}

/// Name of the active single-block kernel, for logs.
#[must_use]
pub fn compress_kernel_name() -> &'static str {
  active().compress.id.as_str()
}

/// Name of the active batch kernel, for logs.
#[must_use]
pub fn hash_many_kernel_name() -> &'static str {
  active().hash_many.id.as_str()
}

/// Resolves the single-block kernel a given capability set would select,
/// without touching the process cache. Test-harness hook.
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn selected_compress_kernel(caps: Caps) -> CompressKernelId {
  select_compress(caps).id
}

/// Resolves the batch kernel a given capability set would select, without
/// touching the process cache. Test-harness hook.
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn selected_hash_many_kernel(caps: Caps) -> HashManyKernelId {
  select_hash_many(caps).id
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  #[cfg(target_arch = "x86_64")]
  use platform::caps::x86;

  use super::*;

  #[test]
  fn empty_caps_select_portable() {
    assert_eq!(
      selected_compress_kernel(Caps::NONE),
      CompressKernelId::Portable
    );
    assert_eq!(
      selected_hash_many_kernel(Caps::NONE),
      HashManyKernelId::Portable
    );
  }

  #[cfg(all(target_arch = "x86_64", not(feature = "no_sse41")))]
  #[test]
  fn sse41_bit_selects_sse41() {
    let caps = x86::SSE2 | x86::SSSE3 | x86::SSE41;
    assert_eq!(selected_compress_kernel(caps), CompressKernelId::Sse41);
    assert_eq!(selected_hash_many_kernel(caps), HashManyKernelId::Sse41);
  }

  #[cfg(all(
    target_arch = "x86_64",
    not(any(feature = "no_sse41", feature = "no_avx2"))
  ))]
  #[test]
  fn avx2_bit_upgrades_batch_only() {
    let caps = x86::SSE2 | x86::SSSE3 | x86::SSE41 | x86::AVX | x86::AVX2;
    assert_eq!(selected_compress_kernel(caps), CompressKernelId::Sse41);
    assert_eq!(selected_hash_many_kernel(caps), HashManyKernelId::Avx2);
  }

  #[cfg(all(
    target_arch = "x86_64",
    not(any(feature = "no_sse41", feature = "no_avx2", feature = "no_avx512"))
  ))]
  #[test]
  fn avx512f_without_vl_upgrades_batch_only() {
    // Some server parts expose F without VL; the single-block path must not
    // take the EVEX kernel there.
    let caps = x86::SSE2 | x86::SSSE3 | x86::SSE41 | x86::AVX | x86::AVX2 | x86::AVX512F;
    assert_eq!(selected_compress_kernel(caps), CompressKernelId::Sse41);
    assert_eq!(selected_hash_many_kernel(caps), HashManyKernelId::Avx512);
  }

  #[cfg(all(target_arch = "x86_64", not(feature = "no_avx512")))]
  #[test]
  fn avx512vl_selects_single_block_evex() {
    let caps =
      x86::SSE2 | x86::SSSE3 | x86::SSE41 | x86::AVX | x86::AVX2 | x86::AVX512F | x86::AVX512VL;
    assert_eq!(selected_compress_kernel(caps), CompressKernelId::Avx512Vl);
  }

  #[cfg(all(target_arch = "x86_64", not(feature = "no_avx512")))]
  #[test]
  fn vl_requirement_is_the_vl_bit_alone() {
    // Real hardware never reports VL without F, but the manifest matches
    // exact bits, not implications.
    assert_eq!(
      selected_compress_kernel(x86::AVX512VL),
      CompressKernelId::Avx512Vl
    );
  }

  #[cfg(all(target_arch = "aarch64", not(feature = "no_neon")))]
  #[test]
  fn neon_bit_selects_neon_batch() {
    let caps = platform::caps::aarch64::NEON;
    assert_eq!(selected_compress_kernel(caps), CompressKernelId::Portable);
    assert_eq!(selected_hash_many_kernel(caps), HashManyKernelId::Neon);
  }

  #[test]
  fn full_claim_selects_the_ladder_head() {
    // Claiming every feature must land on the strongest tier actually
    // compiled in, whatever the feature set, never on an excluded one.
    let everything = all_known_caps();
    assert_eq!(selected_compress_kernel(everything), COMPRESS_LADDER[0].id);
    assert_eq!(selected_hash_many_kernel(everything), HASH_MANY_LADDER[0].id);
  }

  fn all_known_caps() -> Caps {
    use platform::caps::{aarch64, x86};
    x86::SSE2
      | x86::SSSE3
      | x86::SSE41
      | x86::AVX
      | x86::AVX2
      | x86::AVX512F
      | x86::AVX512VL
      | aarch64::NEON
  }

  #[test]
  fn active_matches_detected_caps() {
    let caps = platform::caps();
    assert_eq!(active().compress.id, select_compress(caps).id);
    assert_eq!(active().hash_many.id, select_hash_many(caps).id);
    assert_eq!(simd_degree(), select_hash_many(caps).degree);
  }

  #[test]
  fn kernel_names_are_lowercase() {
    // The names surface in logs; keep them stable and greppable.
    assert_eq!(CompressKernelId::Portable.as_str(), "portable");
    assert_eq!(HashManyKernelId::Portable.as_str(), "portable");
    assert!(compress_kernel_name().chars().all(|c| !c.is_ascii_uppercase()));
    assert!(hash_many_kernel_name().chars().all(|c| !c.is_ascii_uppercase()));
  }
}

#[cfg(all(test, not(miri)))]
mod proptests {
  use platform::caps::{aarch64, x86};
  use proptest::prelude::*;

  use super::*;

  const KNOWN_BITS: [Caps; 8] = [
    x86::SSE2,
    x86::SSSE3,
    x86::SSE41,
    x86::AVX,
    x86::AVX2,
    x86::AVX512F,
    x86::AVX512VL,
    aarch64::NEON,
  ];

  fn arb_caps() -> impl Strategy<Value = Caps> {
    any::<u8>().prop_map(|mask| {
      KNOWN_BITS
        .iter()
        .enumerate()
        .fold(Caps::NONE, |acc, (i, &bit)| {
          if mask & (1 << i) != 0 { acc | bit } else { acc }
        })
    })
  }

  fn compress_rank(caps: Caps) -> usize {
    let id = select_compress(caps).id;
    COMPRESS_LADDER.iter().position(|e| e.id == id).unwrap()
  }

  proptest! {
    #[test]
    fn selection_requirements_are_satisfied(caps in arb_caps()) {
      prop_assert!(caps.has(select_compress(caps).required));
      prop_assert!(caps.has(select_hash_many(caps).required));
    }

    #[test]
    fn extra_caps_never_weaken_selection(a in arb_caps(), b in arb_caps()) {
      let wider = a.union(b);
      prop_assert!(select_hash_many(wider).degree >= select_hash_many(a).degree);
      prop_assert!(compress_rank(wider) <= compress_rank(a));
    }

    #[test]
    fn degree_is_a_compiled_lane_width(caps in arb_caps()) {
      let degree = select_hash_many(caps).degree;
      prop_assert!(degree.is_power_of_two());
      prop_assert!(degree <= crate::MAX_SIMD_DEGREE);
    }
  }
}
