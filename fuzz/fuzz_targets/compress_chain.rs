//! Differential fuzzing of the single-block entry points: a one-chunk hash
//! assembled from dispatched compressions must match the reference crate,
//! including the extended-output blocks.

#![no_main]

use libfuzzer_sys::fuzz_target;
use treehash::{BLOCK_LEN, CHUNK_END, CHUNK_LEN, CHUNK_START, IV, OUT_LEN, ROOT};

fuzz_target!(|data: &[u8]| {
  let input = &data[..data.len().min(CHUNK_LEN)];

  // Chain the chunk block by block; the final block becomes the root block.
  let mut cv = IV;
  let mut block_flags = CHUNK_START;
  let mut offset = 0;
  while input.len() - offset > BLOCK_LEN {
    let block: &[u8; BLOCK_LEN] = input[offset..offset + BLOCK_LEN].try_into().unwrap();
    treehash::compress_in_place(&mut cv, block, BLOCK_LEN as u8, 0, block_flags);
    block_flags = 0;
    offset += BLOCK_LEN;
  }
  let remaining = input.len() - offset;
  let mut block = [0u8; BLOCK_LEN];
  block[..remaining].copy_from_slice(&input[offset..]);
  let root_flags = block_flags | CHUNK_END | ROOT;

  let first = treehash::compress_xof(&cv, &block, remaining as u8, 0, root_flags);
  let second = treehash::compress_xof(&cv, &block, remaining as u8, 1, root_flags);

  let mut expected = [0u8; 2 * BLOCK_LEN];
  let mut hasher = blake3::Hasher::new();
  hasher.update(input);
  hasher.finalize_xof().fill(&mut expected);

  assert_eq!(
    first,
    expected[..BLOCK_LEN],
    "first output block, len={}",
    input.len()
  );
  assert_eq!(
    second,
    expected[BLOCK_LEN..],
    "second output block, len={}",
    input.len()
  );

  // The 32-byte digest is the first output block's prefix.
  assert_eq!(
    first[..OUT_LEN],
    *blake3::hash(input).as_bytes(),
    "digest, len={}",
    input.len()
  );
});
