//! Differential tests against the reference `blake3` crate on the host's
//! real capability set. The tree driver in `common` routes every compression
//! through the public dispatch surface, so whatever kernels the probe
//! selected are the ones under test.

use proptest::prelude::*;
use treehash::{
  DERIVE_KEY_CONTEXT, DERIVE_KEY_MATERIAL, IV, KEYED_HASH, MAX_SIMD_DEGREE, OUT_LEN,
};

mod common;

use common::{key_words, pattern, tree_hash};

const CONTEXT: &str = "treehash 2026-08-22 dispatch differential context";

#[test]
fn selection_is_stable_and_coherent() {
  let compress = treehash::compress_kernel_name();
  let hash_many = treehash::hash_many_kernel_name();
  let degree = treehash::simd_degree();

  assert!(
    degree.is_power_of_two() && degree <= MAX_SIMD_DEGREE,
    "batch degree {degree} out of range"
  );
  if degree == 1 {
    assert_eq!(hash_many, "portable", "degree 1 must mean the scalar kernel");
  }

  // Selection happens once; later lookups must reproduce it.
  for _ in 0..3 {
    assert_eq!(treehash::compress_kernel_name(), compress);
    assert_eq!(treehash::hash_many_kernel_name(), hash_many);
    assert_eq!(treehash::simd_degree(), degree);
  }

  // The cached pair must equal what a fresh resolution of the detected
  // capability set would pick.
  let caps = platform::caps();
  assert_eq!(treehash::selected_compress_kernel(caps).as_str(), compress);
  assert_eq!(treehash::selected_hash_many_kernel(caps).as_str(), hash_many);
}

#[test]
fn boundary_lengths_match_reference() {
  // Straddles block, chunk and batch-group boundaries.
  for &len in &[
    0usize,
    1,
    63,
    64,
    65,
    1023,
    1024,
    1025,
    2047,
    2048,
    2049,
    31 * 1024 + 7,
  ] {
    let input = pattern(len);
    let expected = blake3::hash(&input);
    assert_eq!(
      tree_hash(&input, &IV, 0, OUT_LEN),
      expected.as_bytes(),
      "len={len}"
    );
  }
}

proptest! {
  #[test]
  fn hash_matches_reference(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
    let got = tree_hash(&data, &IV, 0, OUT_LEN);
    let expected = blake3::hash(&data);
    prop_assert_eq!(got, expected.as_bytes());
  }

  #[test]
  fn keyed_hash_matches_reference(
    data in proptest::collection::vec(any::<u8>(), 0..4096),
    key in any::<[u8; 32]>(),
  ) {
    let got = tree_hash(&data, &key_words(&key), KEYED_HASH, OUT_LEN);
    let expected = blake3::keyed_hash(&key, &data);
    prop_assert_eq!(got, expected.as_bytes());
  }

  #[test]
  fn derive_key_matches_reference(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
    let context_key = tree_hash(CONTEXT.as_bytes(), &IV, DERIVE_KEY_CONTEXT, OUT_LEN);
    let context_key: [u8; 32] = context_key.as_slice().try_into().unwrap();
    let got = tree_hash(&data, &key_words(&context_key), DERIVE_KEY_MATERIAL, OUT_LEN);
    prop_assert_eq!(got, blake3::derive_key(CONTEXT, &data));
  }

  #[test]
  fn extended_output_matches_reference(
    data in proptest::collection::vec(any::<u8>(), 0..4096),
    out_len in 1usize..1024,
  ) {
    let mut expected = vec![0u8; out_len];
    let mut hasher = blake3::Hasher::new();
    hasher.update(&data);
    hasher.finalize_xof().fill(&mut expected);
    prop_assert_eq!(tree_hash(&data, &IV, 0, out_len), expected);
  }
}
