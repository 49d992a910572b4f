//! Portable scalar kernels. These are the floor of every dispatch ladder
//! and the reference the vector tiers are tested against.

use crate::{
  BLOCK_LEN, OUT_LEN, compress, first_8_words, words16_from_le_bytes_64, words16_to_le_bytes,
  words8_to_le_bytes,
};

pub(crate) fn compress_in_place(
  cv: &mut [u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
) {
  let block_words = words16_from_le_bytes_64(block);
  *cv = first_8_words(compress(
    cv,
    &block_words,
    counter,
    u32::from(block_len),
    u32::from(flags),
  ));
}

pub(crate) fn compress_xof(
  cv: &[u32; 8],
  block: &[u8; BLOCK_LEN],
  block_len: u8,
  counter: u64,
  flags: u8,
  out: &mut [u8; BLOCK_LEN],
) {
  let block_words = words16_from_le_bytes_64(block);
  let state = compress(
    cv,
    &block_words,
    counter,
    u32::from(block_len),
    u32::from(flags),
  );
  *out = words16_to_le_bytes(&state);
}

/// Hash `blocks` consecutive blocks of one input into a chaining value.
///
/// `flags_start` is OR'd into the first block's flags and `flags_end` into
/// the last block's; a single-block input gets both. With `blocks == 0` the
/// key is returned unchanged.
pub(crate) fn hash_one(
  input: &[u8],
  blocks: usize,
  key: &[u32; 8],
  counter: u64,
  flags: u8,
  flags_start: u8,
  flags_end: u8,
) -> [u32; 8] {
  debug_assert!(input.len() >= blocks * BLOCK_LEN);
  let (full_blocks, _) = input.as_chunks::<BLOCK_LEN>();
  let mut cv = *key;
  let mut block_flags = flags | flags_start;
  for (i, block) in full_blocks.iter().take(blocks).enumerate() {
    if i + 1 == blocks {
      block_flags |= flags_end;
    }
    let block_words = words16_from_le_bytes_64(block);
    cv = first_8_words(compress(
      &cv,
      &block_words,
      counter,
      BLOCK_LEN as u32,
      u32::from(block_flags),
    ));
    block_flags = flags;
  }
  cv
}

pub(crate) fn hash_many(
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
  let mut counter = counter;
  for (input, out) in inputs.iter().zip(out.chunks_exact_mut(OUT_LEN)) {
    let cv = hash_one(input, blocks, key, counter, flags, flags_start, flags_end);
    out.copy_from_slice(&words8_to_le_bytes(&cv));
    if increment_counter {
      counter = counter.wrapping_add(1);
    }
  }
}
