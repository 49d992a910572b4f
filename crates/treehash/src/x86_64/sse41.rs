//! SSE4.1 batch kernel, degree 4.
//!
//! State is kept transposed: sixteen vectors each holding one state word
//! across four independent inputs, so every G operates on four inputs at
//! once.

use core::arch::x86_64::*;

use super::{compress_block_sse41, counter_high, counter_low};
use crate::{
  BLOCK_LEN, IV, MSG_SCHEDULE, OUT_LEN, first_8_words, words8_to_le_bytes,
  words16_from_le_bytes_64,
};

pub(crate) const DEGREE: usize = 4;

#[inline(always)]
unsafe fn loadu(src: *const u8) -> __m128i {
  unsafe { _mm_loadu_si128(src.cast()) }
}

#[inline(always)]
unsafe fn storeu(src: __m128i, dest: *mut u8) {
  unsafe { _mm_storeu_si128(dest.cast(), src) }
}

#[inline(always)]
unsafe fn add(a: __m128i, b: __m128i) -> __m128i {
  unsafe { _mm_add_epi32(a, b) }
}

#[inline(always)]
unsafe fn xor(a: __m128i, b: __m128i) -> __m128i {
  unsafe { _mm_xor_si128(a, b) }
}

#[inline(always)]
unsafe fn set1(x: u32) -> __m128i {
  unsafe { _mm_set1_epi32(x as i32) }
}

#[inline(always)]
unsafe fn set4(a: u32, b: u32, c: u32, d: u32) -> __m128i {
  unsafe { _mm_setr_epi32(a as i32, b as i32, c as i32, d as i32) }
}

#[inline(always)]
unsafe fn rot16(x: __m128i) -> __m128i {
  unsafe {
    _mm_shuffle_epi8(
      x,
      _mm_setr_epi8(2, 3, 0, 1, 6, 7, 4, 5, 10, 11, 8, 9, 14, 15, 12, 13),
    )
  }
}

#[inline(always)]
unsafe fn rot12(x: __m128i) -> __m128i {
  unsafe { _mm_or_si128(_mm_srli_epi32(x, 12), _mm_slli_epi32(x, 20)) }
}

#[inline(always)]
unsafe fn rot8(x: __m128i) -> __m128i {
  unsafe {
    _mm_shuffle_epi8(
      x,
      _mm_setr_epi8(1, 2, 3, 0, 5, 6, 7, 4, 9, 10, 11, 8, 13, 14, 15, 12),
    )
  }
}

#[inline(always)]
unsafe fn rot7(x: __m128i) -> __m128i {
  unsafe { _mm_or_si128(_mm_srli_epi32(x, 7), _mm_slli_epi32(x, 25)) }
}

#[inline(always)]
unsafe fn round(v: &mut [__m128i; 16], m: &[__m128i; 16], r: usize) {
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

/// 4x4 transpose of 32-bit lanes across four vectors.
#[inline(always)]
unsafe fn transpose_vecs(vecs: &mut [__m128i; DEGREE]) {
  // Interleave 32-bit lanes, then 64-bit lanes.
  let ab_01 = _mm_unpacklo_epi32(vecs[0], vecs[1]);
  let ab_23 = _mm_unpackhi_epi32(vecs[0], vecs[1]);
  let cd_01 = _mm_unpacklo_epi32(vecs[2], vecs[3]);
  let cd_23 = _mm_unpackhi_epi32(vecs[2], vecs[3]);

  vecs[0] = _mm_unpacklo_epi64(ab_01, cd_01);
  vecs[1] = _mm_unpackhi_epi64(ab_01, cd_01);
  vecs[2] = _mm_unpacklo_epi64(ab_23, cd_23);
  vecs[3] = _mm_unpackhi_epi64(ab_23, cd_23);
}

/// Load one 64-byte block from each input and transpose into word vectors,
/// so vector `w` holds message word `w` of all four inputs.
#[inline(always)]
unsafe fn transpose_msg_vecs(inputs: &[*const u8; DEGREE], block_offset: usize) -> [__m128i; 16] {
  let off0 = block_offset;
  let off1 = block_offset + 4 * DEGREE;
  let off2 = block_offset + 8 * DEGREE;
  let off3 = block_offset + 12 * DEGREE;
  let mut vecs = [
    loadu(inputs[0].add(off0)),
    loadu(inputs[1].add(off0)),
    loadu(inputs[2].add(off0)),
    loadu(inputs[3].add(off0)),
    loadu(inputs[0].add(off1)),
    loadu(inputs[1].add(off1)),
    loadu(inputs[2].add(off1)),
    loadu(inputs[3].add(off1)),
    loadu(inputs[0].add(off2)),
    loadu(inputs[1].add(off2)),
    loadu(inputs[2].add(off2)),
    loadu(inputs[3].add(off2)),
    loadu(inputs[0].add(off3)),
    loadu(inputs[1].add(off3)),
    loadu(inputs[2].add(off3)),
    loadu(inputs[3].add(off3)),
  ];
  for input in inputs {
    // Prefetch is a hint; the address may run past the end of the input.
    _mm_prefetch(input.wrapping_add(block_offset + 256).cast::<i8>(), _MM_HINT_T0);
  }
  let (squares, _) = vecs.as_chunks_mut::<DEGREE>();
  transpose_vecs(&mut squares[0]);
  transpose_vecs(&mut squares[1]);
  transpose_vecs(&mut squares[2]);
  transpose_vecs(&mut squares[3]);
  vecs
}

#[inline(always)]
unsafe fn load_counters(counter: u64, increment_counter: bool) -> (__m128i, __m128i) {
  let mask = if increment_counter { !0u64 } else { 0u64 };
  unsafe {
    (
      set4(
        counter_low(counter.wrapping_add(mask & 0)),
        counter_low(counter.wrapping_add(mask & 1)),
        counter_low(counter.wrapping_add(mask & 2)),
        counter_low(counter.wrapping_add(mask & 3)),
      ),
      set4(
        counter_high(counter.wrapping_add(mask & 0)),
        counter_high(counter.wrapping_add(mask & 1)),
        counter_high(counter.wrapping_add(mask & 2)),
        counter_high(counter.wrapping_add(mask & 3)),
      ),
    )
  }
}

/// Hash exactly four inputs of `blocks` full blocks each, writing four
/// 32-byte chaining values to `out`.
///
/// # Safety
///
/// Caller must ensure SSE4.1 and SSSE3 are available, that every input holds
/// at least `blocks * BLOCK_LEN` readable bytes, and that `out` holds
/// `4 * OUT_LEN` writable bytes.
#[target_feature(enable = "sse4.1,ssse3")]
pub(crate) unsafe fn hash4(
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

  let (halves, _) = h_vecs.as_chunks_mut::<DEGREE>();
  transpose_vecs(&mut halves[0]);
  transpose_vecs(&mut halves[1]);
  // Each output is 32 bytes: the low half from the first square, the high
  // half from the second.
  for i in 0..DEGREE {
    storeu(halves[0][i], out.add(i * 2 * 16));
    storeu(halves[1][i], out.add(i * 2 * 16 + 16));
  }
}

/// Serial fallback for a batch tail shorter than [`DEGREE`].
#[target_feature(enable = "sse4.1,ssse3")]
unsafe fn hash_one(
  input: &[u8],
  blocks: usize,
  key: &[u32; 8],
  counter: u64,
  flags: u8,
  flags_start: u8,
  flags_end: u8,
) -> [u32; 8] {
  debug_assert!(input.len() >= blocks * BLOCK_LEN);
  let mut cv = *key;
  let (full_blocks, _) = input.as_chunks::<BLOCK_LEN>();
  let mut block_flags = flags | flags_start;
  for (i, block) in full_blocks.iter().take(blocks).enumerate() {
    if i + 1 == blocks {
      block_flags |= flags_end;
    }
    let block_words = words16_from_le_bytes_64(block);
    cv = first_8_words(compress_block_sse41(
      &cv,
      &block_words,
      counter,
      BLOCK_LEN as u32,
      block_flags as u32,
    ));
    block_flags = flags;
  }
  cv
}

/// Batch entry point. Full groups of four go through [`hash4`]; any tail is
/// hashed one input at a time.
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
    let quad = [
      inputs[pos].as_ptr(),
      inputs[pos + 1].as_ptr(),
      inputs[pos + 2].as_ptr(),
      inputs[pos + 3].as_ptr(),
    ];
    // SAFETY: dispatch routes here only after the SSE4.1 capability check;
    // every input holds `blocks * BLOCK_LEN` bytes and `out` holds OUT_LEN
    // bytes per input.
    unsafe {
      hash4(
        &quad,
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
  for (input, chunk) in inputs[pos..]
    .iter()
    .zip(out[pos * OUT_LEN..].chunks_exact_mut(OUT_LEN))
  {
    // SAFETY: dispatch routes here only after the SSE4.1 capability check.
    let cv = unsafe { hash_one(input, blocks, key, counter, flags, flags_start, flags_end) };
    chunk.copy_from_slice(&words8_to_le_bytes(&cv));
    if increment_counter {
      counter = counter.wrapping_add(1);
    }
  }
}
