//! Tree driver shared by the integration tests.
//!
//! Everything routes through the public dispatch entry points, so these
//! helpers exercise whichever kernels the process has selected (or has been
//! forced to select).

use treehash::{
  BLOCK_LEN, CHUNK_END, CHUNK_LEN, CHUNK_START, KEY_LEN, OUT_LEN, PARENT, ROOT, compress_in_place,
  compress_xof, hash_many,
};

pub fn pattern(len: usize) -> Vec<u8> {
  (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn key_words(key_bytes: &[u8; KEY_LEN]) -> [u32; 8] {
  let mut words = [0u32; 8];
  for (word, chunk) in words.iter_mut().zip(key_bytes.chunks_exact(4)) {
    *word = u32::from_le_bytes(chunk.try_into().unwrap());
  }
  words
}

fn cv_bytes(cv: &[u32; 8]) -> [u8; OUT_LEN] {
  let mut bytes = [0u8; OUT_LEN];
  for (chunk, word) in bytes.chunks_exact_mut(4).zip(cv) {
    chunk.copy_from_slice(&word.to_le_bytes());
  }
  bytes
}

fn parent_block(left: &[u8; OUT_LEN], right: &[u8; OUT_LEN]) -> [u8; BLOCK_LEN] {
  let mut block = [0u8; BLOCK_LEN];
  block[..OUT_LEN].copy_from_slice(left);
  block[OUT_LEN..].copy_from_slice(right);
  block
}

/// Chains one non-root chunk block by block.
fn chunk_cv(chunk: &[u8], key: &[u32; 8], counter: u64, flags: u8) -> [u8; OUT_LEN] {
  let mut cv = *key;
  let mut block_flags = flags | CHUNK_START;
  let mut offset = 0;
  while chunk.len() - offset > BLOCK_LEN {
    let block: &[u8; BLOCK_LEN] = chunk[offset..offset + BLOCK_LEN].try_into().unwrap();
    compress_in_place(&mut cv, block, BLOCK_LEN as u8, counter, block_flags);
    block_flags = flags;
    offset += BLOCK_LEN;
  }
  let remaining = chunk.len() - offset;
  let mut block = [0u8; BLOCK_LEN];
  block[..remaining].copy_from_slice(&chunk[offset..]);
  compress_in_place(
    &mut cv,
    &block,
    remaining as u8,
    counter,
    block_flags | CHUNK_END,
  );
  cv_bytes(&cv)
}

/// Runs the tree up to (but not including) the root compression, returning
/// the root block's inputs: chaining value, block, block length and flags
/// (without `ROOT`).
fn root_state(input: &[u8], key: &[u32; 8], flags: u8) -> ([u32; 8], [u8; BLOCK_LEN], u8, u8) {
  if input.len() <= CHUNK_LEN {
    // Single chunk: its final block is the root block.
    let mut cv = *key;
    let mut block_flags = flags | CHUNK_START;
    let mut offset = 0;
    while input.len() - offset > BLOCK_LEN {
      let block: &[u8; BLOCK_LEN] = input[offset..offset + BLOCK_LEN].try_into().unwrap();
      compress_in_place(&mut cv, block, BLOCK_LEN as u8, 0, block_flags);
      block_flags = flags;
      offset += BLOCK_LEN;
    }
    let remaining = input.len() - offset;
    let mut block = [0u8; BLOCK_LEN];
    block[..remaining].copy_from_slice(&input[offset..]);
    return (cv, block, remaining as u8, block_flags | CHUNK_END);
  }

  let full_chunks: Vec<&[u8]> = input.chunks_exact(CHUNK_LEN).collect();
  let mut cv_out = vec![0u8; full_chunks.len() * OUT_LEN];
  hash_many(
    &full_chunks,
    CHUNK_LEN / BLOCK_LEN,
    key,
    0,
    true,
    flags,
    CHUNK_START,
    CHUNK_END,
    &mut cv_out,
  );
  let mut cvs: Vec<[u8; OUT_LEN]> = cv_out
    .chunks_exact(OUT_LEN)
    .map(|cv| cv.try_into().unwrap())
    .collect();

  let partial = &input[full_chunks.len() * CHUNK_LEN..];
  if !partial.is_empty() {
    cvs.push(chunk_cv(partial, key, full_chunks.len() as u64, flags));
  }

  // Pairwise reduction with an odd carry reproduces the reference tree
  // shape: every level pairs 2^k-aligned subtrees.
  while cvs.len() > 2 {
    let pairs = cvs.len() / 2;
    let parent_blocks: Vec<[u8; BLOCK_LEN]> = (0..pairs)
      .map(|i| parent_block(&cvs[2 * i], &cvs[2 * i + 1]))
      .collect();
    let refs: Vec<&[u8]> = parent_blocks.iter().map(|b| b.as_slice()).collect();
    let mut out = vec![0u8; pairs * OUT_LEN];
    hash_many(&refs, 1, key, 0, false, flags | PARENT, 0, 0, &mut out);
    let mut next: Vec<[u8; OUT_LEN]> = out
      .chunks_exact(OUT_LEN)
      .map(|cv| cv.try_into().unwrap())
      .collect();
    if cvs.len() % 2 == 1 {
      next.push(cvs[cvs.len() - 1]);
    }
    cvs = next;
  }

  (
    *key,
    parent_block(&cvs[0], &cvs[1]),
    BLOCK_LEN as u8,
    flags | PARENT,
  )
}

/// Full tree hash with extendable output, entirely through the dispatched
/// entry points.
pub fn tree_hash(input: &[u8], key: &[u32; 8], flags: u8, out_len: usize) -> Vec<u8> {
  let (cv, block, block_len, root_flags) = root_state(input, key, flags);
  let mut out = Vec::with_capacity(out_len);
  let mut counter = 0u64;
  while out.len() < out_len {
    let xof_block = compress_xof(&cv, &block, block_len, counter, root_flags | ROOT);
    let take = (out_len - out.len()).min(BLOCK_LEN);
    out.extend_from_slice(&xof_block[..take]);
    counter += 1;
  }
  out
}
