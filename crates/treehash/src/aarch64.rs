//! aarch64 NEON batch kernel, degree 4.
//!
//! Like the x86 batch kernels, state is kept transposed: sixteen vectors
//! each holding one state word across four independent inputs. There is no
//! NEON single-block kernel; short batch tails go through the portable path.

#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::inline_always)]
#![allow(clippy::too_many_arguments)]

use core::arch::aarch64::*;

use crate::{BLOCK_LEN, IV, MSG_SCHEDULE, OUT_LEN, portable, words8_to_le_bytes};

pub(crate) const DEGREE: usize = 4;

/// `vqtbl1q_u8` index table rotating every u32 lane right by 8 bits.
static ROT8_TABLE: [u8; 16] = [1, 2, 3, 0, 5, 6, 7, 4, 9, 10, 11, 8, 13, 14, 15, 12];

#[inline(always)]
unsafe fn loadu(src: *const u8) -> uint32x4_t {
  unsafe { vreinterpretq_u32_u8(vld1q_u8(src)) }
}

#[inline(always)]
unsafe fn storeu(src: uint32x4_t, dest: *mut u8) {
  unsafe { vst1q_u8(dest, vreinterpretq_u8_u32(src)) }
}

#[inline(always)]
unsafe fn add(a: uint32x4_t, b: uint32x4_t) -> uint32x4_t {
  unsafe { vaddq_u32(a, b) }
}

#[inline(always)]
unsafe fn xor(a: uint32x4_t, b: uint32x4_t) -> uint32x4_t {
  unsafe { veorq_u32(a, b) }
}

#[inline(always)]
unsafe fn set1(x: u32) -> uint32x4_t {
  unsafe { vdupq_n_u32(x) }
}

#[inline(always)]
unsafe fn rot16(x: uint32x4_t) -> uint32x4_t {
  unsafe { vreinterpretq_u32_u16(vrev32q_u16(vreinterpretq_u16_u32(x))) }
}

#[inline(always)]
unsafe fn rot12(x: uint32x4_t) -> uint32x4_t {
  unsafe { vsliq_n_u32::<20>(vshrq_n_u32::<12>(x), x) }
}

#[inline(always)]
unsafe fn rot8(x: uint32x4_t, table: uint8x16_t) -> uint32x4_t {
  unsafe { vreinterpretq_u32_u8(vqtbl1q_u8(vreinterpretq_u8_u32(x), table)) }
}

#[inline(always)]
unsafe fn rot7(x: uint32x4_t) -> uint32x4_t {
  unsafe { vsliq_n_u32::<25>(vshrq_n_u32::<7>(x), x) }
}

#[inline(always)]
unsafe fn g4(
  v: &mut [uint32x4_t; 16],
  a: usize,
  b: usize,
  c: usize,
  d: usize,
  mx: uint32x4_t,
  my: uint32x4_t,
  rot8_table: uint8x16_t,
) {
  v[a] = add(v[a], v[b]);
  v[a] = add(v[a], mx);
  v[d] = xor(v[d], v[a]);
  v[d] = rot16(v[d]);
  v[c] = add(v[c], v[d]);
  v[b] = xor(v[b], v[c]);
  v[b] = rot12(v[b]);
  v[a] = add(v[a], v[b]);
  v[a] = add(v[a], my);
  v[d] = xor(v[d], v[a]);
  v[d] = rot8(v[d], rot8_table);
  v[c] = add(v[c], v[d]);
  v[b] = xor(v[b], v[c]);
  v[b] = rot7(v[b]);
}

#[inline(always)]
unsafe fn round4(
  v: &mut [uint32x4_t; 16],
  m: &[uint32x4_t; 16],
  r: usize,
  rot8_table: uint8x16_t,
) {
  // SAFETY: callers only pass round numbers in 0..7.
  let s = unsafe { MSG_SCHEDULE.get_unchecked(r) };
  g4(v, 0, 4, 8, 12, m[s[0]], m[s[1]], rot8_table);
  g4(v, 1, 5, 9, 13, m[s[2]], m[s[3]], rot8_table);
  g4(v, 2, 6, 10, 14, m[s[4]], m[s[5]], rot8_table);
  g4(v, 3, 7, 11, 15, m[s[6]], m[s[7]], rot8_table);
  g4(v, 0, 5, 10, 15, m[s[8]], m[s[9]], rot8_table);
  g4(v, 1, 6, 11, 12, m[s[10]], m[s[11]], rot8_table);
  g4(v, 2, 7, 8, 13, m[s[12]], m[s[13]], rot8_table);
  g4(v, 3, 4, 9, 14, m[s[14]], m[s[15]], rot8_table);
}

/// 4x4 transpose of 32-bit lanes across four vectors.
#[inline(always)]
unsafe fn transpose_vecs(vecs: &mut [uint32x4_t; DEGREE]) {
  // Interleave 32-bit lanes, then recombine 64-bit halves.
  let ab = vtrnq_u32(vecs[0], vecs[1]);
  let cd = vtrnq_u32(vecs[2], vecs[3]);
  vecs[0] = vcombine_u32(vget_low_u32(ab.0), vget_low_u32(cd.0));
  vecs[1] = vcombine_u32(vget_low_u32(ab.1), vget_low_u32(cd.1));
  vecs[2] = vcombine_u32(vget_high_u32(ab.0), vget_high_u32(cd.0));
  vecs[3] = vcombine_u32(vget_high_u32(ab.1), vget_high_u32(cd.1));
}

#[inline(always)]
unsafe fn transpose_msg_vecs(inputs: &[*const u8; DEGREE], block_offset: usize) -> [uint32x4_t; 16] {
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
  let (squares, _) = vecs.as_chunks_mut::<DEGREE>();
  transpose_vecs(&mut squares[0]);
  transpose_vecs(&mut squares[1]);
  transpose_vecs(&mut squares[2]);
  transpose_vecs(&mut squares[3]);
  vecs
}

#[inline(always)]
unsafe fn load_counters(counter: u64, increment_counter: bool) -> (uint32x4_t, uint32x4_t) {
  let mask = if increment_counter { !0u64 } else { 0u64 };
  let lanes = [
    counter.wrapping_add(mask & 0),
    counter.wrapping_add(mask & 1),
    counter.wrapping_add(mask & 2),
    counter.wrapping_add(mask & 3),
  ];
  let low = [
    lanes[0] as u32,
    lanes[1] as u32,
    lanes[2] as u32,
    lanes[3] as u32,
  ];
  let high = [
    (lanes[0] >> 32) as u32,
    (lanes[1] >> 32) as u32,
    (lanes[2] >> 32) as u32,
    (lanes[3] >> 32) as u32,
  ];
  unsafe { (vld1q_u32(low.as_ptr()), vld1q_u32(high.as_ptr())) }
}

/// Hash exactly four inputs of `blocks` full blocks each, writing four
/// 32-byte chaining values to `out`.
///
/// # Safety
///
/// Caller must ensure NEON is available, that every input holds at least
/// `blocks * BLOCK_LEN` readable bytes, and that `out` holds `4 * OUT_LEN`
/// writable bytes.
#[target_feature(enable = "neon")]
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
  const {
    assert!(
      cfg!(target_endian = "little"),
      "transposed NEON loads assume little-endian lanes"
    )
  };
  let rot8_table = vld1q_u8(ROT8_TABLE.as_ptr());
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
    round4(&mut v, &msg_vecs, 0, rot8_table);
    round4(&mut v, &msg_vecs, 1, rot8_table);
    round4(&mut v, &msg_vecs, 2, rot8_table);
    round4(&mut v, &msg_vecs, 3, rot8_table);
    round4(&mut v, &msg_vecs, 4, rot8_table);
    round4(&mut v, &msg_vecs, 5, rot8_table);
    round4(&mut v, &msg_vecs, 6, rot8_table);
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

/// Batch entry point. Full groups of four go through [`hash4`]; any tail is
/// hashed through the portable compression path.
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
    // SAFETY: dispatch routes here only after the NEON capability check;
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
    let cv = portable::hash_one(input, blocks, key, counter, flags, flags_start, flags_end);
    chunk.copy_from_slice(&words8_to_le_bytes(&cv));
    if increment_counter {
      counter = counter.wrapping_add(1);
    }
  }
}
