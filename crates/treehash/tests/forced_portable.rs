//! Forces the empty capability set before anything hashes, so every
//! operation in this binary must resolve to the portable kernels. Runs as
//! its own process: overrides are global, and the other integration binaries
//! need the real capability set.

use platform::Caps;
use treehash::{IV, KEYED_HASH, OUT_LEN};

mod common;

use common::{key_words, pattern, tree_hash};

const KEY: &[u8; treehash::KEY_LEN] = b"whats the Elvish word for friend";

#[test]
fn empty_caps_run_portable_end_to_end() {
  platform::set_caps_override(Some(Caps::NONE));

  assert_eq!(treehash::compress_kernel_name(), "portable");
  assert_eq!(treehash::hash_many_kernel_name(), "portable");
  assert_eq!(treehash::simd_degree(), 1);

  let key = key_words(KEY);
  for &len in &[0usize, 1, 64, 1023, 1024, 1025, 4096, 10_000] {
    let input = pattern(len);
    assert_eq!(
      tree_hash(&input, &IV, 0, OUT_LEN),
      blake3::hash(&input).as_bytes(),
      "hash len={len}"
    );
    assert_eq!(
      tree_hash(&input, &key, KEYED_HASH, OUT_LEN),
      blake3::keyed_hash(KEY, &input).as_bytes(),
      "keyed len={len}"
    );
  }

  // Still forced: later lookups re-resolve the override, not a cache.
  assert!(platform::has_override());
  assert_eq!(treehash::compress_kernel_name(), "portable");
  assert_eq!(treehash::hash_many_kernel_name(), "portable");
}
