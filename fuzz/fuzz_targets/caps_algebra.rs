//! Fuzz target for the capability bitset's set algebra.
//!
//! Dispatch correctness leans entirely on `Caps::has` and the set operators
//! behaving like ordinary bit algebra, so every law they rely on is checked
//! here for arbitrary masks.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use platform::Caps;

#[derive(Arbitrary, Debug)]
struct Input {
  a: u64,
  b: u64,
  c: u64,
}

fuzz_target!(|input: Input| {
  let a = Caps::from_raw(input.a);
  let b = Caps::from_raw(input.b);
  let c = Caps::from_raw(input.c);

  // ─── Self-containment and counting ───
  assert!(a.has(a), "a set must contain itself");
  assert_eq!(a.count(), input.a.count_ones(), "count() must match popcount");
  assert_eq!(a.is_empty(), input.a == 0, "is_empty() must match count() == 0");
  assert_eq!(a.as_raw(), input.a, "raw round-trip must be lossless");

  // ─── has_bit agrees with single-bit subset checks ───
  for n in 0u32..64 {
    assert_eq!(
      a.has_bit(n),
      a.has(Caps::from_raw(1 << n)),
      "has_bit({n}) must equal has() of the single-bit set"
    );
  }

  // ─── Identity and idempotence ───
  assert_eq!(a | Caps::NONE, a, "union with NONE must be identity");
  assert_eq!(a & Caps::NONE, Caps::NONE, "intersection with NONE must be NONE");
  assert_eq!(a | a, a, "union with self must be idempotent");
  assert_eq!(a & a, a, "intersection with self must be idempotent");

  // ─── Commutativity and associativity ───
  assert_eq!(a | b, b | a, "union must be commutative");
  assert_eq!(a & b, b & a, "intersection must be commutative");
  assert_eq!((a | b) | c, a | (b | c), "union must be associative");
  assert_eq!((a & b) & c, a & (b & c), "intersection must be associative");

  // ─── Distributivity and absorption ───
  assert_eq!(
    a & (b | c),
    (a & b) | (a & c),
    "intersection must distribute over union"
  );
  assert_eq!(a | (a & b), a, "absorption law a | (a & b) failed");
  assert_eq!(a & (a | b), a, "absorption law a & (a | b) failed");

  // ─── Containment after union and intersection ───
  let union = a | b;
  assert!(union.has(a), "union must contain the first operand");
  assert!(union.has(b), "union must contain the second operand");
  let inter = a & b;
  assert!(a.has(inter), "first operand must contain the intersection");
  assert!(b.has(inter), "second operand must contain the intersection");
  assert!(
    union.count() >= a.count().max(b.count()),
    "union count below an operand's count"
  );
  assert!(
    inter.count() <= a.count().min(b.count()),
    "intersection count above an operand's count"
  );

  // ─── Difference splits a set against any mask ───
  let without = a.difference(b);
  assert_eq!(without & b, Caps::NONE, "difference must be disjoint from the mask");
  assert_eq!(without | inter, a, "difference plus intersection must rebuild the set");

  // ─── Feature names only describe set bits ───
  assert!(
    a.feature_names().count() as u32 <= a.count(),
    "more feature names than set bits"
  );
});
