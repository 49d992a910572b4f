//! Runtime-dispatched compression and batch-hash kernels for the treehash
//! primitive (BLAKE3-shaped: 8-word chaining values, 64-byte blocks,
//! 1024-byte chunks, 7 rounds).
//!
//! Three operations make up the public surface:
//!
//! - [`compress_in_place`]: compress one block into a chaining value.
//! - [`compress_xof`]: compress one block and keep the full 64-byte
//!   extended output.
//! - [`hash_many`]: hash whole multi-block inputs in parallel, one
//!   32-byte chaining value per input.
//!
//! Each call routes to the fastest kernel the executing CPU supports:
//! AVX-512, AVX2 and SSE4.1 tiers on x86_64, a NEON tier on aarch64, and a
//! portable tier everywhere. Every tier produces bit-identical output, so
//! callers never observe which one ran; [`compress_kernel_name`],
//! [`hash_many_kernel_name`] and [`simd_degree`] exist for the callers that
//! want to know anyway.
//!
//! Capability detection lives in the `platform` crate and is probed once
//! per process. Tiers can be compiled out with the `no_sse41`, `no_avx2`,
//! `no_avx512` and `no_neon` features; an excluded tier is absent from the
//! dispatch tables entirely, so runtime capability bits cannot select it.

#![no_std]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![allow(clippy::indexing_slicing)] // Fixed-size arrays + internal block parsing

#[cfg(feature = "std")]
extern crate std;

use core::ptr;

#[cfg(all(target_arch = "aarch64", not(feature = "no_neon")))]
pub(crate) mod aarch64;
mod dispatch;
pub(crate) mod kernels;
pub(crate) mod portable;
#[cfg(target_arch = "x86_64")]
pub(crate) mod x86_64;


pub use dispatch::{
  compress_in_place, compress_kernel_name, compress_xof, hash_many, hash_many_kernel_name,
  simd_degree,
};

#[cfg(any(test, feature = "testing"))]
pub use dispatch::{selected_compress_kernel, selected_hash_many_kernel};
#[cfg(any(test, feature = "testing"))]
pub use kernels::{CompressKernelId, HashManyKernelId};

/// Bytes in a chaining value / digest.
pub const OUT_LEN: usize = 32;
/// Bytes in a key.
pub const KEY_LEN: usize = 32;
/// Bytes in one compression block.
pub const BLOCK_LEN: usize = 64;
/// Bytes in one chunk (16 blocks).
pub const CHUNK_LEN: usize = 1024;

/// Widest batch width any tier on this architecture can use. Callers sizing
/// fan-out buffers for [`hash_many`] never need more than this many inputs
/// per call to saturate the widest kernel.
#[cfg(target_arch = "x86_64")]
pub const MAX_SIMD_DEGREE: usize = 16;
#[cfg(target_arch = "aarch64")]
pub const MAX_SIMD_DEGREE: usize = 4;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const MAX_SIMD_DEGREE: usize = 1;

// Block-domain flags. Callers driving the chunk/parent/root chain OR these
// into the `flags` arguments.
pub const CHUNK_START: u8 = 1 << 0;
pub const CHUNK_END: u8 = 1 << 1;
pub const PARENT: u8 = 1 << 2;
pub const ROOT: u8 = 1 << 3;
pub const KEYED_HASH: u8 = 1 << 4;
pub const DERIVE_KEY_CONTEXT: u8 = 1 << 5;
pub const DERIVE_KEY_MATERIAL: u8 = 1 << 6;

/// Initialization vector, shared with the key-less hash modes.
pub const IV: [u32; 8] = [
  0x6A09_E667,
  0xBB67_AE85,
  0x3C6E_F372,
  0xA54F_F53A,
  0x510E_527F,
  0x9B05_688C,
  0x1F83_D9AB,
  0x5BE0_CD19,
];

/// Message schedule. `MSG_SCHEDULE[round][i]` gives the index of the message
/// word to use.
pub(crate) static MSG_SCHEDULE: [[usize; 16]; 7] = [
  [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
  [2, 6, 3, 10, 7, 0, 4, 13, 1, 11, 12, 5, 9, 14, 15, 8],
  [3, 4, 10, 12, 13, 2, 7, 14, 6, 5, 9, 0, 11, 15, 8, 1],
  [10, 7, 12, 9, 14, 3, 13, 15, 4, 0, 11, 2, 5, 8, 1, 6],
  [12, 13, 9, 11, 15, 10, 14, 8, 7, 2, 5, 3, 0, 1, 6, 4],
  [9, 14, 11, 5, 8, 12, 15, 1, 13, 3, 0, 10, 2, 6, 4, 7],
  [11, 15, 5, 0, 1, 9, 8, 6, 14, 10, 2, 12, 3, 4, 7, 13],
];

#[inline(always)]
pub(crate) fn words16_from_le_bytes_64(bytes: &[u8; 64]) -> [u32; 16] {
  if cfg!(target_endian = "little") {
    let src = bytes.as_ptr() as *const u32;
    // SAFETY: `bytes` is exactly 64 bytes; `read_unaligned` supports the
    // 1-byte alignment of `[u8; 64]`.
    unsafe {
      [
        ptr::read_unaligned(src.add(0)),
        ptr::read_unaligned(src.add(1)),
        ptr::read_unaligned(src.add(2)),
        ptr::read_unaligned(src.add(3)),
        ptr::read_unaligned(src.add(4)),
        ptr::read_unaligned(src.add(5)),
        ptr::read_unaligned(src.add(6)),
        ptr::read_unaligned(src.add(7)),
        ptr::read_unaligned(src.add(8)),
        ptr::read_unaligned(src.add(9)),
        ptr::read_unaligned(src.add(10)),
        ptr::read_unaligned(src.add(11)),
        ptr::read_unaligned(src.add(12)),
        ptr::read_unaligned(src.add(13)),
        ptr::read_unaligned(src.add(14)),
        ptr::read_unaligned(src.add(15)),
      ]
    }
  } else {
    let src = bytes.as_ptr() as *const u32;
    // SAFETY: `bytes` is exactly 64 bytes; `read_unaligned` supports the
    // 1-byte alignment of `[u8; 64]`.
    unsafe {
      [
        u32::from_le(ptr::read_unaligned(src.add(0))),
        u32::from_le(ptr::read_unaligned(src.add(1))),
        u32::from_le(ptr::read_unaligned(src.add(2))),
        u32::from_le(ptr::read_unaligned(src.add(3))),
        u32::from_le(ptr::read_unaligned(src.add(4))),
        u32::from_le(ptr::read_unaligned(src.add(5))),
        u32::from_le(ptr::read_unaligned(src.add(6))),
        u32::from_le(ptr::read_unaligned(src.add(7))),
        u32::from_le(ptr::read_unaligned(src.add(8))),
        u32::from_le(ptr::read_unaligned(src.add(9))),
        u32::from_le(ptr::read_unaligned(src.add(10))),
        u32::from_le(ptr::read_unaligned(src.add(11))),
        u32::from_le(ptr::read_unaligned(src.add(12))),
        u32::from_le(ptr::read_unaligned(src.add(13))),
        u32::from_le(ptr::read_unaligned(src.add(14))),
        u32::from_le(ptr::read_unaligned(src.add(15))),
      ]
    }
  }
}

#[inline(always)]
pub(crate) fn first_8_words(words: [u32; 16]) -> [u32; 8] {
  [
    words[0], words[1], words[2], words[3], words[4], words[5], words[6], words[7],
  ]
}

#[inline(always)]
pub(crate) fn words8_to_le_bytes(words: &[u32; 8]) -> [u8; OUT_LEN] {
  let mut out = [0u8; OUT_LEN];
  if cfg!(target_endian = "little") {
    // SAFETY: `words` is 8 u32s = 32 bytes, and `out` is 32 bytes.
    unsafe { ptr::copy_nonoverlapping(words.as_ptr().cast::<u8>(), out.as_mut_ptr(), OUT_LEN) };
  } else {
    for (i, word) in words.iter().copied().enumerate() {
      let offset = i * 4;
      out[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
    }
  }
  out
}

#[inline(always)]
pub(crate) fn words16_to_le_bytes(words: &[u32; 16]) -> [u8; BLOCK_LEN] {
  let mut out = [0u8; BLOCK_LEN];
  if cfg!(target_endian = "little") {
    // SAFETY: `words` is 16 u32s = 64 bytes, and `out` is 64 bytes.
    unsafe { ptr::copy_nonoverlapping(words.as_ptr() as *const u8, out.as_mut_ptr(), BLOCK_LEN) };
  } else {
    for (i, word) in words.iter().copied().enumerate() {
      let offset = i * 4;
      out[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
    }
  }
  out
}

/// The scalar compression function.
///
/// Explicit per-round schedules keep `v0..v15` and `m0..m15` in registers
/// without indirect indexing in the hottest loop.
#[inline]
pub(crate) fn compress(
  chaining_value: &[u32; 8],
  block_words: &[u32; 16],
  counter: u64,
  block_len: u32,
  flags: u32,
) -> [u32; 16] {
  let m0 = block_words[0];
  let m1 = block_words[1];
  let m2 = block_words[2];
  let m3 = block_words[3];
  let m4 = block_words[4];
  let m5 = block_words[5];
  let m6 = block_words[6];
  let m7 = block_words[7];
  let m8 = block_words[8];
  let m9 = block_words[9];
  let m10 = block_words[10];
  let m11 = block_words[11];
  let m12 = block_words[12];
  let m13 = block_words[13];
  let m14 = block_words[14];
  let m15 = block_words[15];

  let counter_low = counter as u32;
  let counter_high = (counter >> 32) as u32;
  let mut v0 = chaining_value[0];
  let mut v1 = chaining_value[1];
  let mut v2 = chaining_value[2];
  let mut v3 = chaining_value[3];
  let mut v4 = chaining_value[4];
  let mut v5 = chaining_value[5];
  let mut v6 = chaining_value[6];
  let mut v7 = chaining_value[7];
  let mut v8 = IV[0];
  let mut v9 = IV[1];
  let mut v10 = IV[2];
  let mut v11 = IV[3];
  let mut v12 = counter_low;
  let mut v13 = counter_high;
  let mut v14 = block_len;
  let mut v15 = flags;

  macro_rules! g {
    ($a:ident, $b:ident, $c:ident, $d:ident, $mx:expr, $my:expr) => {{
      $a = $a.wrapping_add($b).wrapping_add($mx);
      $d = ($d ^ $a).rotate_right(16);
      $c = $c.wrapping_add($d);
      $b = ($b ^ $c).rotate_right(12);
      $a = $a.wrapping_add($b).wrapping_add($my);
      $d = ($d ^ $a).rotate_right(8);
      $c = $c.wrapping_add($d);
      $b = ($b ^ $c).rotate_right(7);
    }};
  }

  macro_rules! round {
    (
      $m0:expr, $m1:expr, $m2:expr, $m3:expr, $m4:expr, $m5:expr, $m6:expr, $m7:expr,
      $m8:expr, $m9:expr, $m10:expr, $m11:expr, $m12:expr, $m13:expr, $m14:expr, $m15:expr
    ) => {{
      g!(v0, v4, v8, v12, $m0, $m1);
      g!(v1, v5, v9, v13, $m2, $m3);
      g!(v2, v6, v10, v14, $m4, $m5);
      g!(v3, v7, v11, v15, $m6, $m7);

      g!(v0, v5, v10, v15, $m8, $m9);
      g!(v1, v6, v11, v12, $m10, $m11);
      g!(v2, v7, v8, v13, $m12, $m13);
      g!(v3, v4, v9, v14, $m14, $m15);
    }};
  }

  round!(m0, m1, m2, m3, m4, m5, m6, m7, m8, m9, m10, m11, m12, m13, m14, m15);
  round!(m2, m6, m3, m10, m7, m0, m4, m13, m1, m11, m12, m5, m9, m14, m15, m8);
  round!(m3, m4, m10, m12, m13, m2, m7, m14, m6, m5, m9, m0, m11, m15, m8, m1);
  round!(m10, m7, m12, m9, m14, m3, m13, m15, m4, m0, m11, m2, m5, m8, m1, m6);
  round!(m12, m13, m9, m11, m15, m10, m14, m8, m7, m2, m5, m3, m0, m1, m6, m4);
  round!(m9, m14, m11, m5, m8, m12, m15, m1, m13, m3, m0, m10, m2, m6, m4, m7);
  round!(m11, m15, m5, m0, m1, m9, m8, m6, m14, m10, m2, m12, m3, m4, m7, m13);

  v0 ^= v8;
  v1 ^= v9;
  v2 ^= v10;
  v3 ^= v11;
  v4 ^= v12;
  v5 ^= v13;
  v6 ^= v14;
  v7 ^= v15;

  v8 ^= chaining_value[0];
  v9 ^= chaining_value[1];
  v10 ^= chaining_value[2];
  v11 ^= chaining_value[3];
  v12 ^= chaining_value[4];
  v13 ^= chaining_value[5];
  v14 ^= chaining_value[6];
  v15 ^= chaining_value[7];

  [v0, v1, v2, v3, v4, v5, v6, v7, v8, v9, v10, v11, v12, v13, v14, v15]
}
