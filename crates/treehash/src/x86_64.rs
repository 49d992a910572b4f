//! x86_64 SIMD kernels.
//!
//! This module holds the single-block row kernels (SSE4.1 and AVX-512VL)
//! plus the multi-input throughput kernels in the `sse41`, `avx2` and
//! `avx512` submodules.
//!
//! # Safety
//!
//! All kernel functions in this module are marked `unsafe` and require
//! specific CPU features to be present. Callers must verify CPU capabilities
//! before calling.

#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::inline_always)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::undocumented_unsafe_blocks)]
#![cfg_attr(
  all(feature = "no_sse41", feature = "no_avx512"),
  allow(dead_code, unused_imports)
)]

use core::arch::x86_64::*;

#[cfg(not(any(feature = "no_sse41", feature = "no_avx2")))]
pub(crate) mod avx2;
#[cfg(not(any(feature = "no_sse41", feature = "no_avx2", feature = "no_avx512")))]
pub(crate) mod avx512;
#[cfg(not(feature = "no_sse41"))]
pub(crate) mod sse41;

use crate::{BLOCK_LEN, IV, MSG_SCHEDULE, first_8_words, words16_from_le_bytes_64, words16_to_le_bytes};

// ─────────────────────────────────────────────────────────────────────────────
// Shared helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Shuffle mask for 16-bit rotation right of 32-bit lanes using `pshufb`.
/// Rotates each u32 lane right by 16 bits: bytes [2,3,0,1] for each lane.
#[cfg(not(feature = "no_sse41"))]
const ROT16_SHUFFLE: [i8; 16] = [2, 3, 0, 1, 6, 7, 4, 5, 10, 11, 8, 9, 14, 15, 12, 13];

/// Shuffle mask for 8-bit rotation right of 32-bit lanes using `pshufb`.
/// Rotates each u32 lane right by 8 bits: bytes [1,2,3,0] for each lane.
#[cfg(not(feature = "no_sse41"))]
const ROT8_SHUFFLE: [i8; 16] = [1, 2, 3, 0, 5, 6, 7, 4, 9, 10, 11, 8, 13, 14, 15, 12];

#[cfg(not(feature = "no_sse41"))]
#[inline(always)]
pub(crate) const fn counter_low(counter: u64) -> u32 {
  counter as u32
}

#[cfg(not(feature = "no_sse41"))]
#[inline(always)]
pub(crate) const fn counter_high(counter: u64) -> u32 {
  (counter >> 32) as u32
}

/// Gather four message words into one vector, lane 0 first.
#[inline(always)]
unsafe fn gather4(words: &[u32; 16], a: usize, b: usize, c: usize, d: usize) -> __m128i {
  unsafe { _mm_setr_epi32(words[a] as i32, words[b] as i32, words[c] as i32, words[d] as i32) }
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE4.1 single-block kernel
// ─────────────────────────────────────────────────────────────────────────────

/// Compression function over the row representation.
///
/// The state matrix lives in four vectors: `row0..row1` hold the chaining
/// value, `row2` the IV words and `row3` the counter/len/flags words. Column
/// mixing runs on the rows directly; diagonal mixing rotates the rows into
/// place first and back afterwards.
///
/// # Safety
///
/// Caller must ensure SSE4.1 and SSSE3 are available.
#[cfg(not(feature = "no_sse41"))]
#[target_feature(enable = "sse4.1,ssse3")]
pub(crate) unsafe fn compress_block_sse41(
  chaining_value: &[u32; 8],
  block_words: &[u32; 16],
  counter: u64,
  block_len: u32,
  flags: u32,
) -> [u32; 16] {
  let rot16 = _mm_loadu_si128(ROT16_SHUFFLE.as_ptr().cast());
  let rot8 = _mm_loadu_si128(ROT8_SHUFFLE.as_ptr().cast());

  let mut row0 = _mm_loadu_si128(chaining_value.as_ptr().cast());
  let mut row1 = _mm_loadu_si128(chaining_value.as_ptr().add(4).cast());
  let mut row2 = _mm_loadu_si128(IV.as_ptr().cast());
  let mut row3 = _mm_set_epi32(flags as i32, block_len as i32, (counter >> 32) as i32, counter as i32);

  macro_rules! g {
    ($mx:expr, $my:expr) => {{
      row0 = _mm_add_epi32(row0, row1);
      row0 = _mm_add_epi32(row0, $mx);
      row3 = _mm_xor_si128(row3, row0);
      row3 = _mm_shuffle_epi8(row3, rot16);
      row2 = _mm_add_epi32(row2, row3);
      row1 = _mm_xor_si128(row1, row2);
      row1 = _mm_or_si128(_mm_srli_epi32(row1, 12), _mm_slli_epi32(row1, 20));
      row0 = _mm_add_epi32(row0, row1);
      row0 = _mm_add_epi32(row0, $my);
      row3 = _mm_xor_si128(row3, row0);
      row3 = _mm_shuffle_epi8(row3, rot8);
      row2 = _mm_add_epi32(row2, row3);
      row1 = _mm_xor_si128(row1, row2);
      row1 = _mm_or_si128(_mm_srli_epi32(row1, 7), _mm_slli_epi32(row1, 25));
    }};
  }

  for s in MSG_SCHEDULE {
    let mx0 = gather4(block_words, s[0], s[2], s[4], s[6]);
    let my0 = gather4(block_words, s[1], s[3], s[5], s[7]);
    let mx1 = gather4(block_words, s[8], s[10], s[12], s[14]);
    let my1 = gather4(block_words, s[9], s[11], s[13], s[15]);

    // Column step: mix columns [0,4,8,12], [1,5,9,13], [2,6,10,14], [3,7,11,15].
    g!(mx0, my0);

    // Diagonalize, then the diagonals line up as columns.
    row1 = _mm_shuffle_epi32(row1, 0b00_11_10_01); // rotate lanes left 1
    row2 = _mm_shuffle_epi32(row2, 0b01_00_11_10); // rotate lanes left 2
    row3 = _mm_shuffle_epi32(row3, 0b10_01_00_11); // rotate lanes left 3

    g!(mx1, my1);

    row1 = _mm_shuffle_epi32(row1, 0b10_01_00_11);
    row2 = _mm_shuffle_epi32(row2, 0b01_00_11_10);
    row3 = _mm_shuffle_epi32(row3, 0b00_11_10_01);
  }

  let cv_lo = _mm_loadu_si128(chaining_value.as_ptr().cast());
  let cv_hi = _mm_loadu_si128(chaining_value.as_ptr().add(4).cast());

  row0 = _mm_xor_si128(row0, row2);
  row1 = _mm_xor_si128(row1, row3);
  row2 = _mm_xor_si128(row2, cv_lo);
  row3 = _mm_xor_si128(row3, cv_hi);

  let mut out = [0u32; 16];
  _mm_storeu_si128(out.as_mut_ptr().cast(), row0);
  _mm_storeu_si128(out.as_mut_ptr().add(4).cast(), row1);
  _mm_storeu_si128(out.as_mut_ptr().add(8).cast(), row2);
  _mm_storeu_si128(out.as_mut_ptr().add(12).cast(), row3);
  out
}

#[cfg(not(feature = "no_sse41"))]
pub(crate) fn compress_in_place_sse41(
  cv: &mut [u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
) {
  let block_words = words16_from_le_bytes_64(block);
  // SAFETY: dispatch routes here only after the SSE4.1 capability check.
  let state = unsafe {
    compress_block_sse41(cv, &block_words, counter, u32::from(block_len), u32::from(flags))
  };
  *cv = first_8_words(state);
}

#[cfg(not(feature = "no_sse41"))]
pub(crate) fn compress_xof_sse41(
  cv: &[u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
  out: &mut [u8; BLOCK_LEN],
) {
  let block_words = words16_from_le_bytes_64(block);
  // SAFETY: dispatch routes here only after the SSE4.1 capability check.
  let state = unsafe {
    compress_block_sse41(cv, &block_words, counter, u32::from(block_len), u32::from(flags))
  };
  *out = words16_to_le_bytes(&state);
}

// ─────────────────────────────────────────────────────────────────────────────
// AVX-512VL single-block kernel
// ─────────────────────────────────────────────────────────────────────────────

/// Same row-form compression as [`compress_block_sse41`], with every rotation
/// done by `vprord` instead of shuffle/shift pairs.
///
/// # Safety
///
/// Caller must ensure AVX-512F and AVX-512VL are available.
#[cfg(not(feature = "no_avx512"))]
#[target_feature(enable = "avx512f,avx512vl")]
pub(crate) unsafe fn compress_block_avx512vl(
  chaining_value: &[u32; 8],
  block_words: &[u32; 16],
  counter: u64,
  block_len: u32,
  flags: u32,
) -> [u32; 16] {
  let mut row0 = _mm_loadu_si128(chaining_value.as_ptr().cast());
  let mut row1 = _mm_loadu_si128(chaining_value.as_ptr().add(4).cast());
  let mut row2 = _mm_loadu_si128(IV.as_ptr().cast());
  let mut row3 = _mm_set_epi32(flags as i32, block_len as i32, (counter >> 32) as i32, counter as i32);

  macro_rules! g {
    ($mx:expr, $my:expr) => {{
      row0 = _mm_add_epi32(row0, row1);
      row0 = _mm_add_epi32(row0, $mx);
      row3 = _mm_xor_si128(row3, row0);
      row3 = _mm_ror_epi32::<16>(row3);
      row2 = _mm_add_epi32(row2, row3);
      row1 = _mm_xor_si128(row1, row2);
      row1 = _mm_ror_epi32::<12>(row1);
      row0 = _mm_add_epi32(row0, row1);
      row0 = _mm_add_epi32(row0, $my);
      row3 = _mm_xor_si128(row3, row0);
      row3 = _mm_ror_epi32::<8>(row3);
      row2 = _mm_add_epi32(row2, row3);
      row1 = _mm_xor_si128(row1, row2);
      row1 = _mm_ror_epi32::<7>(row1);
    }};
  }

  for s in MSG_SCHEDULE {
    let mx0 = gather4(block_words, s[0], s[2], s[4], s[6]);
    let my0 = gather4(block_words, s[1], s[3], s[5], s[7]);
    let mx1 = gather4(block_words, s[8], s[10], s[12], s[14]);
    let my1 = gather4(block_words, s[9], s[11], s[13], s[15]);

    g!(mx0, my0);

    row1 = _mm_shuffle_epi32(row1, 0b00_11_10_01);
    row2 = _mm_shuffle_epi32(row2, 0b01_00_11_10);
    row3 = _mm_shuffle_epi32(row3, 0b10_01_00_11);

    g!(mx1, my1);

    row1 = _mm_shuffle_epi32(row1, 0b10_01_00_11);
    row2 = _mm_shuffle_epi32(row2, 0b01_00_11_10);
    row3 = _mm_shuffle_epi32(row3, 0b00_11_10_01);
  }

  let cv_lo = _mm_loadu_si128(chaining_value.as_ptr().cast());
  let cv_hi = _mm_loadu_si128(chaining_value.as_ptr().add(4).cast());

  row0 = _mm_xor_si128(row0, row2);
  row1 = _mm_xor_si128(row1, row3);
  row2 = _mm_xor_si128(row2, cv_lo);
  row3 = _mm_xor_si128(row3, cv_hi);

  let mut out = [0u32; 16];
  _mm_storeu_si128(out.as_mut_ptr().cast(), row0);
  _mm_storeu_si128(out.as_mut_ptr().add(4).cast(), row1);
  _mm_storeu_si128(out.as_mut_ptr().add(8).cast(), row2);
  _mm_storeu_si128(out.as_mut_ptr().add(12).cast(), row3);
  out
}

#[cfg(not(feature = "no_avx512"))]
pub(crate) fn compress_in_place_avx512vl(
  cv: &mut [u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
) {
  let block_words = words16_from_le_bytes_64(block);
  // SAFETY: dispatch routes here only after the AVX-512VL capability check.
  let state = unsafe {
    compress_block_avx512vl(cv, &block_words, counter, u32::from(block_len), u32::from(flags))
  };
  *cv = first_8_words(state);
}

#[cfg(not(feature = "no_avx512"))]
pub(crate) fn compress_xof_avx512vl(
  cv: &[u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
  out: &mut [u8; BLOCK_LEN],
) {
  let block_words = words16_from_le_bytes_64(block);
  // SAFETY: dispatch routes here only after the AVX-512VL capability check.
  let state = unsafe {
    compress_block_avx512vl(cv, &block_words, counter, u32::from(block_len), u32::from(flags))
  };
  *out = words16_to_le_bytes(&state);
}
