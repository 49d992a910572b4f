//! Batch/serial consistency fuzzing: the dispatched batch kernel must agree
//! with a serial recomputation through the single-block entry point for any
//! batch geometry, counter and flag combination.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use treehash::{BLOCK_LEN, CHUNK_END, CHUNK_START, IV, KEYED_HASH, OUT_LEN, PARENT};

#[derive(Arbitrary, Debug)]
struct Input {
  data: Vec<u8>,
  /// Blocks per batch entry, clamped to the chunk maximum.
  blocks: u8,
  counter: u64,
  increment_counter: bool,
  keyed: bool,
  parents: bool,
}

fuzz_target!(|input: Input| {
  let blocks = usize::from(input.blocks % 16) + 1;
  let stride = blocks * BLOCK_LEN;
  let n_inputs = (input.data.len() / stride).min(64);
  if n_inputs == 0 {
    return;
  }
  let inputs: Vec<&[u8]> = input.data.chunks_exact(stride).take(n_inputs).collect();

  let flags = if input.keyed { KEYED_HASH } else { 0 };
  let (flags, flags_start, flags_end) = if input.parents {
    (flags | PARENT, 0, 0)
  } else {
    (flags, CHUNK_START, CHUNK_END)
  };

  let mut got = vec![0u8; n_inputs * OUT_LEN];
  treehash::hash_many(
    &inputs,
    blocks,
    &IV,
    input.counter,
    input.increment_counter,
    flags,
    flags_start,
    flags_end,
    &mut got,
  );

  for (i, (entry, out)) in inputs.iter().zip(got.chunks_exact(OUT_LEN)).enumerate() {
    let counter = if input.increment_counter {
      input.counter.wrapping_add(i as u64)
    } else {
      input.counter
    };
    let mut cv = IV;
    let mut block_flags = flags | flags_start;
    for (b, block) in entry.chunks_exact(BLOCK_LEN).enumerate() {
      if b + 1 == blocks {
        block_flags |= flags_end;
      }
      let block: &[u8; BLOCK_LEN] = block.try_into().unwrap();
      treehash::compress_in_place(&mut cv, block, BLOCK_LEN as u8, counter, block_flags);
      block_flags = flags;
    }
    let mut serial = [0u8; OUT_LEN];
    for (chunk, word) in serial.chunks_exact_mut(4).zip(&cv) {
      chunk.copy_from_slice(&word.to_le_bytes());
    }
    assert_eq!(
      out, serial,
      "entry {i}: blocks={blocks} counter={counter} increment={}",
      input.increment_counter
    );
  }
});
