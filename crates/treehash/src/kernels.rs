//! Kernel manifests and selection ladders.
//!
//! Every implementation the crate can run is described by one entry pairing
//! the kernel's function pointers with the capability bits it needs. The
//! per-architecture ladders are ordered widest kernel first, portable last,
//! so selection is a single first-match scan. Build features can remove
//! entries, but the portable tail is unconditional.

use platform::Caps;

use crate::{BLOCK_LEN, portable};

// ─────────────────────────────────────────────────────────────────────────────
// Kernel signatures
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) type CompressInPlaceFn = fn(&mut [u32; 8], &[u8; BLOCK_LEN], u8, u64, u8);

pub(crate) type CompressXofFn = fn(&[u32; 8], &[u8; BLOCK_LEN], u8, u64, u8, &mut [u8; BLOCK_LEN]);

pub(crate) type HashManyFn = fn(&[&[u8]], usize, &[u32; 8], u64, bool, u8, u8, u8, &mut [u8]);

// ─────────────────────────────────────────────────────────────────────────────
// Kernel identities
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a single-block compression kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressKernelId {
  Portable,
  #[cfg(target_arch = "x86_64")]
  Sse41,
  #[cfg(target_arch = "x86_64")]
  Avx512Vl,
}

impl CompressKernelId {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      CompressKernelId::Portable => "portable",
      #[cfg(target_arch = "x86_64")]
      CompressKernelId::Sse41 => "sse4.1",
      #[cfg(target_arch = "x86_64")]
      CompressKernelId::Avx512Vl => "avx512vl",
    }
  }
}

/// Identity of a batch hashing kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashManyKernelId {
  Portable,
  #[cfg(target_arch = "x86_64")]
  Sse41,
  #[cfg(target_arch = "x86_64")]
  Avx2,
  #[cfg(target_arch = "x86_64")]
  Avx512,
  #[cfg(target_arch = "aarch64")]
  Neon,
}

impl HashManyKernelId {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      HashManyKernelId::Portable => "portable",
      #[cfg(target_arch = "x86_64")]
      HashManyKernelId::Sse41 => "sse4.1",
      #[cfg(target_arch = "x86_64")]
      HashManyKernelId::Avx2 => "avx2",
      #[cfg(target_arch = "x86_64")]
      HashManyKernelId::Avx512 => "avx512",
      #[cfg(target_arch = "aarch64")]
      HashManyKernelId::Neon => "neon",
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest entries
// ─────────────────────────────────────────────────────────────────────────────

/// One selectable single-block implementation.
#[derive(Clone, Copy)]
pub(crate) struct CompressEntry {
  pub(crate) id: CompressKernelId,
  /// Capability bits that must all be present to select this entry.
  pub(crate) required: Caps,
  pub(crate) in_place: CompressInPlaceFn,
  pub(crate) xof: CompressXofFn,
}

/// One selectable batch implementation.
#[derive(Clone, Copy)]
pub(crate) struct HashManyEntry {
  pub(crate) id: HashManyKernelId,
  /// Capability bits that must all be present to select this entry.
  pub(crate) required: Caps,
  pub(crate) hash_many: HashManyFn,
  /// Native batch width in inputs.
  pub(crate) degree: usize,
}

pub(crate) const PORTABLE_COMPRESS: CompressEntry = CompressEntry {
  id: CompressKernelId::Portable,
  required: Caps::NONE,
  in_place: portable::compress_in_place,
  xof: portable::compress_xof,
};

pub(crate) const PORTABLE_HASH_MANY: HashManyEntry = HashManyEntry {
  id: HashManyKernelId::Portable,
  required: Caps::NONE,
  hash_many: portable::hash_many,
  degree: 1,
};

// ─────────────────────────────────────────────────────────────────────────────
// Ladders
// ─────────────────────────────────────────────────────────────────────────────

// The single-block ladder jumps straight from AVX-512VL to SSE4.1. AVX2
// adds nothing for one block: its wider registers only pay off across
// multiple inputs, which is the batch ladder's job.
#[cfg(target_arch = "x86_64")]
pub(crate) static COMPRESS_LADDER: &[CompressEntry] = &[
  #[cfg(not(feature = "no_avx512"))]
  CompressEntry {
    id: CompressKernelId::Avx512Vl,
    required: platform::caps::x86::AVX512VL,
    in_place: crate::x86_64::compress_in_place_avx512vl,
    xof: crate::x86_64::compress_xof_avx512vl,
  },
  #[cfg(not(feature = "no_sse41"))]
  CompressEntry {
    id: CompressKernelId::Sse41,
    required: platform::caps::x86::SSE41,
    in_place: crate::x86_64::compress_in_place_sse41,
    xof: crate::x86_64::compress_xof_sse41,
  },
  PORTABLE_COMPRESS,
];

#[cfg(not(target_arch = "x86_64"))]
pub(crate) static COMPRESS_LADDER: &[CompressEntry] = &[PORTABLE_COMPRESS];

// The 512-bit batch kernel is gated on AVX-512F alone; it deliberately
// avoids VL/BW/DQ instructions so F-only server parts can run it.
#[cfg(target_arch = "x86_64")]
pub(crate) static HASH_MANY_LADDER: &[HashManyEntry] = &[
  #[cfg(not(any(feature = "no_sse41", feature = "no_avx2", feature = "no_avx512")))]
  HashManyEntry {
    id: HashManyKernelId::Avx512,
    required: platform::caps::x86::AVX512F,
    hash_many: crate::x86_64::avx512::hash_many,
    degree: crate::x86_64::avx512::DEGREE,
  },
  #[cfg(not(any(feature = "no_sse41", feature = "no_avx2")))]
  HashManyEntry {
    id: HashManyKernelId::Avx2,
    required: platform::caps::x86::AVX2,
    hash_many: crate::x86_64::avx2::hash_many,
    degree: crate::x86_64::avx2::DEGREE,
  },
  #[cfg(not(feature = "no_sse41"))]
  HashManyEntry {
    id: HashManyKernelId::Sse41,
    required: platform::caps::x86::SSE41,
    hash_many: crate::x86_64::sse41::hash_many,
    degree: crate::x86_64::sse41::DEGREE,
  },
  PORTABLE_HASH_MANY,
];

#[cfg(target_arch = "aarch64")]
pub(crate) static HASH_MANY_LADDER: &[HashManyEntry] = &[
  #[cfg(not(feature = "no_neon"))]
  HashManyEntry {
    id: HashManyKernelId::Neon,
    required: platform::caps::aarch64::NEON,
    hash_many: crate::aarch64::hash_many,
    degree: crate::aarch64::DEGREE,
  },
  PORTABLE_HASH_MANY,
];

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) static HASH_MANY_LADDER: &[HashManyEntry] = &[PORTABLE_HASH_MANY];

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ladders_end_with_unconditional_portable() {
    let last = COMPRESS_LADDER.last().unwrap();
    assert_eq!(last.id, CompressKernelId::Portable);
    assert!(last.required.is_empty());

    let last = HASH_MANY_LADDER.last().unwrap();
    assert_eq!(last.id, HashManyKernelId::Portable);
    assert!(last.required.is_empty());
    assert_eq!(last.degree, 1);
  }

  #[test]
  fn wider_kernels_come_first() {
    for pair in HASH_MANY_LADDER.windows(2) {
      assert!(pair[0].degree >= pair[1].degree);
    }
  }

  #[test]
  fn non_portable_entries_require_capabilities() {
    for entry in &COMPRESS_LADDER[..COMPRESS_LADDER.len() - 1] {
      assert!(!entry.required.is_empty(), "{}", entry.id.as_str());
    }
    for entry in &HASH_MANY_LADDER[..HASH_MANY_LADDER.len() - 1] {
      assert!(!entry.required.is_empty(), "{}", entry.id.as_str());
    }
  }

  #[test]
  fn exclusion_features_remove_their_tiers() {
    // An excluded tier must be absent from the ladder outright, so runtime
    // capability claims have nothing to match.
    let in_compress = |name: &str| COMPRESS_LADDER.iter().any(|e| e.id.as_str() == name);
    let in_batch = |name: &str| HASH_MANY_LADDER.iter().any(|e| e.id.as_str() == name);

    if cfg!(feature = "no_sse41") {
      assert!(!in_compress("sse4.1"));
      assert!(!in_batch("sse4.1"));
    }
    if cfg!(feature = "no_avx2") {
      assert!(!in_batch("avx2"));
    }
    if cfg!(feature = "no_avx512") {
      assert!(!in_compress("avx512vl"));
      assert!(!in_batch("avx512"));
    }
    if cfg!(feature = "no_neon") {
      assert!(!in_batch("neon"));
    }
  }
}
