//! AVX-512 batch kernel, degree 16.
//!
//! Gated on the AVX-512F capability alone, so every instruction here must be
//! legal on an F-only machine: 512-bit arithmetic from the F set, with the
//! 256-bit transpose work VEX-encoded via AVX2.

use core::arch::x86_64::*;

use super::{avx2, counter_high, counter_low};
use crate::{BLOCK_LEN, IV, MSG_SCHEDULE, OUT_LEN};

pub(crate) const DEGREE: usize = 16;

#[inline(always)]
unsafe fn loadu256(src: *const u8) -> __m256i {
  unsafe { _mm256_loadu_si256(src.cast()) }
}

#[inline(always)]
unsafe fn storeu256(src: __m256i, dest: *mut u8) {
  unsafe { _mm256_storeu_si256(dest.cast(), src) }
}

#[inline(always)]
unsafe fn add(a: __m512i, b: __m512i) -> __m512i {
  unsafe { _mm512_add_epi32(a, b) }
}

#[inline(always)]
unsafe fn xor(a: __m512i, b: __m512i) -> __m512i {
  unsafe { _mm512_xor_si512(a, b) }
}

#[inline(always)]
unsafe fn set1(x: u32) -> __m512i {
  unsafe { _mm512_set1_epi32(x as i32) }
}

#[inline(always)]
unsafe fn rot16(x: __m512i) -> __m512i {
  unsafe { _mm512_ror_epi32::<16>(x) }
}

#[inline(always)]
unsafe fn rot12(x: __m512i) -> __m512i {
  unsafe { _mm512_ror_epi32::<12>(x) }
}

#[inline(always)]
unsafe fn rot8(x: __m512i) -> __m512i {
  unsafe { _mm512_ror_epi32::<8>(x) }
}

#[inline(always)]
unsafe fn rot7(x: __m512i) -> __m512i {
  unsafe { _mm512_ror_epi32::<7>(x) }
}

/// Concatenate two 256-bit vectors into one 512-bit vector, `lo` first.
#[inline(always)]
unsafe fn widen(lo: __m256i, hi: __m256i) -> __m512i {
  unsafe { _mm512_inserti64x4::<1>(_mm512_castsi256_si512(lo), hi) }
}

#[inline(always)]
unsafe fn round(v: &mut [__m512i; 16], m: &[__m512i; 16], r: usize) {
  v[0] = add(v[0], m[MSG_SCHEDULE[r][0]]);
  v[1] = add(v[1], m[MSG_SCHEDULE[r][2]]);
  v[2] = add(v[2], m[MSG_SCHEDULE[r][4]]);
  v[3] = add(v[3], m[MSG_SCHEDULE[r][6]]);
  v[0] = add(v[0], v[4]);
  v[1] = add(v[1], v[5]);
  v[2] = add(v[2], v[6]);
  v[3] = add(v[3], v[7]);
  v[12] = xor(v[12], v[0]);
  v[13] = xor(v[13], v[1]);
  v[14] = xor(v[14], v[2]);
  v[15] = xor(v[15], v[3]);
  v[12] = rot16(v[12]);
  v[13] = rot16(v[13]);
  v[14] = rot16(v[14]);
  v[15] = rot16(v[15]);
  v[8] = add(v[8], v[12]);
  v[9] = add(v[9], v[13]);
  v[10] = add(v[10], v[14]);
  v[11] = add(v[11], v[15]);
  v[4] = xor(v[4], v[8]);
  v[5] = xor(v[5], v[9]);
  v[6] = xor(v[6], v[10]);
  v[7] = xor(v[7], v[11]);
  v[4] = rot12(v[4]);
  v[5] = rot12(v[5]);
  v[6] = rot12(v[6]);
  v[7] = rot12(v[7]);
  v[0] = add(v[0], m[MSG_SCHEDULE[r][1]]);
  v[1] = add(v[1], m[MSG_SCHEDULE[r][3]]);
  v[2] = add(v[2], m[MSG_SCHEDULE[r][5]]);
  v[3] = add(v[3], m[MSG_SCHEDULE[r][7]]);
  v[0] = add(v[0], v[4]);
  v[1] = add(v[1], v[5]);
  v[2] = add(v[2], v[6]);
  v[3] = add(v[3], v[7]);
  v[12] = xor(v[12], v[0]);
  v[13] = xor(v[13], v[1]);
  v[14] = xor(v[14], v[2]);
  v[15] = xor(v[15], v[3]);
  v[12] = rot8(v[12]);
  v[13] = rot8(v[13]);
  v[14] = rot8(v[14]);
  v[15] = rot8(v[15]);
  v[8] = add(v[8], v[12]);
  v[9] = add(v[9], v[13]);
  v[10] = add(v[10], v[14]);
  v[11] = add(v[11], v[15]);
  v[4] = xor(v[4], v[8]);
  v[5] = xor(v[5], v[9]);
  v[6] = xor(v[6], v[10]);
  v[7] = xor(v[7], v[11]);
  v[4] = rot7(v[4]);
  v[5] = rot7(v[5]);
  v[6] = rot7(v[6]);
  v[7] = rot7(v[7]);

  v[0] = add(v[0], m[MSG_SCHEDULE[r][8]]);
  v[1] = add(v[1], m[MSG_SCHEDULE[r][10]]);
  v[2] = add(v[2], m[MSG_SCHEDULE[r][12]]);
  v[3] = add(v[3], m[MSG_SCHEDULE[r][14]]);
  v[0] = add(v[0], v[5]);
  v[1] = add(v[1], v[6]);
  v[2] = add(v[2], v[7]);
  v[3] = add(v[3], v[4]);
  v[15] = xor(v[15], v[0]);
  v[12] = xor(v[12], v[1]);
  v[13] = xor(v[13], v[2]);
  v[14] = xor(v[14], v[3]);
  v[15] = rot16(v[15]);
  v[12] = rot16(v[12]);
  v[13] = rot16(v[13]);
  v[14] = rot16(v[14]);
  v[10] = add(v[10], v[15]);
  v[11] = add(v[11], v[12]);
  v[8] = add(v[8], v[13]);
  v[9] = add(v[9], v[14]);
  v[5] = xor(v[5], v[10]);
  v[6] = xor(v[6], v[11]);
  v[7] = xor(v[7], v[8]);
  v[4] = xor(v[4], v[9]);
  v[5] = rot12(v[5]);
  v[6] = rot12(v[6]);
  v[7] = rot12(v[7]);
  v[4] = rot12(v[4]);
  v[0] = add(v[0], m[MSG_SCHEDULE[r][9]]);
  v[1] = add(v[1], m[MSG_SCHEDULE[r][11]]);
  v[2] = add(v[2], m[MSG_SCHEDULE[r][13]]);
  v[3] = add(v[3], m[MSG_SCHEDULE[r][15]]);
  v[0] = add(v[0], v[5]);
  v[1] = add(v[1], v[6]);
  v[2] = add(v[2], v[7]);
  v[3] = add(v[3], v[4]);
  v[15] = xor(v[15], v[0]);
  v[12] = xor(v[12], v[1]);
  v[13] = xor(v[13], v[2]);
  v[14] = xor(v[14], v[3]);
  v[15] = rot8(v[15]);
  v[12] = rot8(v[12]);
  v[13] = rot8(v[13]);
  v[14] = rot8(v[14]);
  v[10] = add(v[10], v[15]);
  v[11] = add(v[11], v[12]);
  v[8] = add(v[8], v[13]);
  v[9] = add(v[9], v[14]);
  v[5] = xor(v[5], v[10]);
  v[6] = xor(v[6], v[11]);
  v[7] = xor(v[7], v[8]);
  v[4] = xor(v[4], v[9]);
  v[5] = rot7(v[5]);
  v[6] = rot7(v[6]);
  v[7] = rot7(v[7]);
  v[4] = rot7(v[4]);
}

/// Load one block from each of sixteen inputs and transpose into sixteen
/// word vectors. The low and high eight inputs are transposed as 256-bit
/// squares, then stitched into 512-bit lanes.
#[inline(always)]
unsafe fn transpose_msg_vecs(inputs: &[*const u8; DEGREE], block_offset: usize) -> [__m512i; 16] {
  let off0 = block_offset;
  let off1 = block_offset + 32;
  let mut lo = [
    loadu256(inputs[0].add(off0)),
    loadu256(inputs[1].add(off0)),
    loadu256(inputs[2].add(off0)),
    loadu256(inputs[3].add(off0)),
    loadu256(inputs[4].add(off0)),
    loadu256(inputs[5].add(off0)),
    loadu256(inputs[6].add(off0)),
    loadu256(inputs[7].add(off0)),
    loadu256(inputs[0].add(off1)),
    loadu256(inputs[1].add(off1)),
    loadu256(inputs[2].add(off1)),
    loadu256(inputs[3].add(off1)),
    loadu256(inputs[4].add(off1)),
    loadu256(inputs[5].add(off1)),
    loadu256(inputs[6].add(off1)),
    loadu256(inputs[7].add(off1)),
  ];
  let mut hi = [
    loadu256(inputs[8].add(off0)),
    loadu256(inputs[9].add(off0)),
    loadu256(inputs[10].add(off0)),
    loadu256(inputs[11].add(off0)),
    loadu256(inputs[12].add(off0)),
    loadu256(inputs[13].add(off0)),
    loadu256(inputs[14].add(off0)),
    loadu256(inputs[15].add(off0)),
    loadu256(inputs[8].add(off1)),
    loadu256(inputs[9].add(off1)),
    loadu256(inputs[10].add(off1)),
    loadu256(inputs[11].add(off1)),
    loadu256(inputs[12].add(off1)),
    loadu256(inputs[13].add(off1)),
    loadu256(inputs[14].add(off1)),
    loadu256(inputs[15].add(off1)),
  ];
  for input in inputs {
    // Prefetch is a hint; the address may run past the end of the input.
    _mm_prefetch(input.wrapping_add(block_offset + 256).cast::<i8>(), _MM_HINT_T0);
  }
  let (lo_squares, _) = lo.as_chunks_mut::<8>();
  avx2::transpose_vecs(&mut lo_squares[0]);
  avx2::transpose_vecs(&mut lo_squares[1]);
  let (hi_squares, _) = hi.as_chunks_mut::<8>();
  avx2::transpose_vecs(&mut hi_squares[0]);
  avx2::transpose_vecs(&mut hi_squares[1]);
  [
    widen(lo[0], hi[0]),
    widen(lo[1], hi[1]),
    widen(lo[2], hi[2]),
    widen(lo[3], hi[3]),
    widen(lo[4], hi[4]),
    widen(lo[5], hi[5]),
    widen(lo[6], hi[6]),
    widen(lo[7], hi[7]),
    widen(lo[8], hi[8]),
    widen(lo[9], hi[9]),
    widen(lo[10], hi[10]),
    widen(lo[11], hi[11]),
    widen(lo[12], hi[12]),
    widen(lo[13], hi[13]),
    widen(lo[14], hi[14]),
    widen(lo[15], hi[15]),
  ]
}

#[inline(always)]
unsafe fn load_counters(counter: u64, increment_counter: bool) -> (__m512i, __m512i) {
  let mask = if increment_counter { !0u64 } else { 0u64 };
  let mut low = [0u32; DEGREE];
  let mut high = [0u32; DEGREE];
  for (i, (lo, hi)) in low.iter_mut().zip(high.iter_mut()).enumerate() {
    let lane = counter.wrapping_add(mask & i as u64);
    *lo = counter_low(lane);
    *hi = counter_high(lane);
  }
  unsafe {
    (
      _mm512_loadu_si512(low.as_ptr().cast()),
      _mm512_loadu_si512(high.as_ptr().cast()),
    )
  }
}

/// Hash exactly sixteen inputs of `blocks` full blocks each, writing sixteen
/// 32-byte chaining values to `out`.
///
/// # Safety
///
/// Caller must ensure AVX-512F and AVX2 are available, that every input holds
/// at least `blocks * BLOCK_LEN` readable bytes, and that `out` holds
/// `16 * OUT_LEN` writable bytes.
#[target_feature(enable = "avx512f,avx2")]
pub(crate) unsafe fn hash16(
  inputs: &[*const u8; DEGREE],
  blocks: usize,
  key: &[u32; 8],
  counter: u64,
  increment_counter: bool,
  flags: u8,
  flags_start: u8,
  flags_end: u8,
  out: *mut u8,
) {
  let mut h_vecs = [
    set1(key[0]),
    set1(key[1]),
    set1(key[2]),
    set1(key[3]),
    set1(key[4]),
    set1(key[5]),
    set1(key[6]),
    set1(key[7]),
  ];
  let (counter_low_vec, counter_high_vec) = load_counters(counter, increment_counter);
  let mut block_flags = flags | flags_start;

  for block in 0..blocks {
    if block + 1 == blocks {
      block_flags |= flags_end;
    }
    let block_len_vec = set1(BLOCK_LEN as u32);
    let block_flags_vec = set1(block_flags as u32);
    let msg_vecs = transpose_msg_vecs(inputs, block * BLOCK_LEN);

    let mut v = [
      h_vecs[0],
      h_vecs[1],
      h_vecs[2],
      h_vecs[3],
      h_vecs[4],
      h_vecs[5],
      h_vecs[6],
      h_vecs[7],
      set1(IV[0]),
      set1(IV[1]),
      set1(IV[2]),
      set1(IV[3]),
      counter_low_vec,
      counter_high_vec,
      block_len_vec,
      block_flags_vec,
    ];
    round(&mut v, &msg_vecs, 0);
    round(&mut v, &msg_vecs, 1);
    round(&mut v, &msg_vecs, 2);
    round(&mut v, &msg_vecs, 3);
    round(&mut v, &msg_vecs, 4);
    round(&mut v, &msg_vecs, 5);
    round(&mut v, &msg_vecs, 6);
    h_vecs[0] = xor(v[0], v[8]);
    h_vecs[1] = xor(v[1], v[9]);
    h_vecs[2] = xor(v[2], v[10]);
    h_vecs[3] = xor(v[3], v[11]);
    h_vecs[4] = xor(v[4], v[12]);
    h_vecs[5] = xor(v[5], v[13]);
    h_vecs[6] = xor(v[6], v[14]);
    h_vecs[7] = xor(v[7], v[15]);

    block_flags = flags;
  }

  // Split each word vector into its low and high eight inputs, transpose
  // both squares, and store one chaining value per input.
  let mut lo = [
    _mm512_castsi512_si256(h_vecs[0]),
    _mm512_castsi512_si256(h_vecs[1]),
    _mm512_castsi512_si256(h_vecs[2]),
    _mm512_castsi512_si256(h_vecs[3]),
    _mm512_castsi512_si256(h_vecs[4]),
    _mm512_castsi512_si256(h_vecs[5]),
    _mm512_castsi512_si256(h_vecs[6]),
    _mm512_castsi512_si256(h_vecs[7]),
  ];
  let mut hi = [
    _mm512_extracti64x4_epi64::<1>(h_vecs[0]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[1]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[2]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[3]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[4]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[5]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[6]),
    _mm512_extracti64x4_epi64::<1>(h_vecs[7]),
  ];
  avx2::transpose_vecs(&mut lo);
  avx2::transpose_vecs(&mut hi);
  for i in 0..8 {
    storeu256(lo[i], out.add(i * OUT_LEN));
    storeu256(hi[i], out.add((i + 8) * OUT_LEN));
  }
}

/// Batch entry point. Full groups of sixteen go through [`hash16`]; the tail
/// falls back to the AVX2 path, which AVX-512 hardware always has.
pub(crate) fn hash_many(
  inputs: &[&[u8]],
  blocks: usize,
  key: &[u32; 8],
  mut counter: u64,
  increment_counter: bool,
  flags: u8,
  flags_start: u8,
  flags_end: u8,
  out: &mut [u8],
) {
  debug_assert!(out.len() >= inputs.len() * OUT_LEN);
  let mut pos = 0;
  while inputs.len() - pos >= DEGREE {
    let group = [
      inputs[pos].as_ptr(),
      inputs[pos + 1].as_ptr(),
      inputs[pos + 2].as_ptr(),
      inputs[pos + 3].as_ptr(),
      inputs[pos + 4].as_ptr(),
      inputs[pos + 5].as_ptr(),
      inputs[pos + 6].as_ptr(),
      inputs[pos + 7].as_ptr(),
      inputs[pos + 8].as_ptr(),
      inputs[pos + 9].as_ptr(),
      inputs[pos + 10].as_ptr(),
      inputs[pos + 11].as_ptr(),
      inputs[pos + 12].as_ptr(),
      inputs[pos + 13].as_ptr(),
      inputs[pos + 14].as_ptr(),
      inputs[pos + 15].as_ptr(),
    ];
    // SAFETY: dispatch routes here only after the AVX-512F capability check;
    // every input holds `blocks * BLOCK_LEN` bytes and `out` holds OUT_LEN
    // bytes per input.
    unsafe {
      hash16(
        &group,
        blocks,
        key,
        counter,
        increment_counter,
        flags,
        flags_start,
        flags_end,
        out.as_mut_ptr().add(pos * OUT_LEN),
      );
    }
    if increment_counter {
      counter = counter.wrapping_add(DEGREE as u64);
    }
    pos += DEGREE;
  }
  avx2::hash_many(
    &inputs[pos..],
    blocks,
    key,
    counter,
    increment_counter,
    flags,
    flags_start,
    flags_end,
    &mut out[pos * OUT_LEN..],
  );
}
