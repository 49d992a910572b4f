//! Capability bitmask shared by the feature probes and the dispatch tables.
//!
//! `Caps` is a plain bitset with set algebra and printable feature names.
//! Each architecture owns a disjoint bit range, so a raw mask never needs an
//! architecture tag to be interpreted.

use core::fmt;

// ─── Core Type ───────────────────────────────────────────────────────────────

/// A set of CPU capability bits.
///
/// Values are cheap to copy and compare. Dispatch code only ever asks one
/// question of a `Caps`: [`Caps::has`], "is this required subset present?"
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Caps(u64);

impl Caps {
  /// The empty capability set.
  ///
  /// This is a real, cacheable answer ("the probe ran and found nothing"),
  /// never an "unprobed" sentinel. The unprobed state lives in the detection
  /// cache, which distinguishes "not yet computed" from any stored value.
  pub const NONE: Caps = Caps(0);

  /// Capability set with the single bit `n` set.
  #[inline(always)]
  #[must_use]
  pub(crate) const fn bit(n: u32) -> Caps {
    debug_assert!(n < 64);
    Caps(1 << n)
  }

  /// Returns `true` if every bit of `required` is present in `self`.
  #[inline(always)]
  #[must_use]
  pub const fn has(self, required: Self) -> bool {
    self.0 & required.0 == required.0
  }

  /// Returns `true` if bit `n` is present.
  #[inline(always)]
  #[must_use]
  pub const fn has_bit(self, n: u32) -> bool {
    n < 64 && self.0 & (1 << n) != 0
  }

  /// Set union.
  #[inline(always)]
  #[must_use]
  pub const fn union(self, other: Self) -> Self {
    Caps(self.0 | other.0)
  }

  /// Set intersection.
  #[inline(always)]
  #[must_use]
  pub const fn intersection(self, other: Self) -> Self {
    Caps(self.0 & other.0)
  }

  /// Set difference: the bits of `self` not present in `other`.
  #[inline(always)]
  #[must_use]
  pub const fn difference(self, other: Self) -> Self {
    Caps(self.0 & !other.0)
  }

  /// Returns `true` if no bits are set.
  #[inline(always)]
  #[must_use]
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }

  /// Number of bits set.
  #[inline(always)]
  #[must_use]
  pub const fn count(self) -> u32 {
    self.0.count_ones()
  }

  #[inline(always)]
  #[must_use]
  pub(crate) const fn to_bits(self) -> u64 {
    self.0
  }

  #[inline(always)]
  #[must_use]
  pub(crate) const fn from_bits(bits: u64) -> Self {
    Caps(bits)
  }

  /// Builds a `Caps` from a raw bit pattern. Test-harness constructor.
  #[cfg(any(test, feature = "testing"))]
  #[inline]
  #[must_use]
  pub const fn from_raw(bits: u64) -> Self {
    Caps(bits)
  }

  /// The raw bit pattern. Test-harness accessor.
  #[cfg(any(test, feature = "testing"))]
  #[inline]
  #[must_use]
  pub const fn as_raw(self) -> u64 {
    self.0
  }
}

impl core::ops::BitOr for Caps {
  type Output = Caps;

  #[inline(always)]
  fn bitor(self, rhs: Caps) -> Caps {
    self.union(rhs)
  }
}

impl core::ops::BitOrAssign for Caps {
  #[inline(always)]
  fn bitor_assign(&mut self, rhs: Caps) {
    *self = self.union(rhs);
  }
}

impl core::ops::BitAnd for Caps {
  type Output = Caps;

  #[inline(always)]
  fn bitand(self, rhs: Caps) -> Caps {
    self.intersection(rhs)
  }
}

// ─── Feature Constants ───────────────────────────────────────────────────────

/// x86 / x86_64 capability bits, in probe order.
pub mod x86 {
  use super::Caps;

  pub const SSE2: Caps = Caps::bit(0);
  pub const SSSE3: Caps = Caps::bit(1);
  pub const SSE41: Caps = Caps::bit(2);
  pub const AVX: Caps = Caps::bit(3);
  pub const AVX2: Caps = Caps::bit(4);
  /// AVX-512 foundation. Gates the 512-bit batch kernel.
  pub const AVX512F: Caps = Caps::bit(5);
  /// AVX-512 vector-length extension (EVEX on 128/256-bit vectors). Gates
  /// the single-block EVEX kernels.
  pub const AVX512VL: Caps = Caps::bit(6);
}

/// AArch64 capability bits. Disjoint from the x86 range.
pub mod aarch64 {
  use super::Caps;

  pub const NEON: Caps = Caps::bit(32);
}

// ─── Feature Names ───────────────────────────────────────────────────────────

type FeatureEntry = (u8, &'static str);

const X86_FEATURES: &[FeatureEntry] = &[
  (0, "sse2"),
  (1, "ssse3"),
  (2, "sse4.1"),
  (3, "avx"),
  (4, "avx2"),
  (5, "avx512f"),
  (6, "avx512vl"),
];

const AARCH64_FEATURES: &[FeatureEntry] = &[(32, "neon")];

impl Caps {
  /// Iterates the names of the set bits, lowest bit first.
  pub fn feature_names(self) -> impl Iterator<Item = &'static str> {
    X86_FEATURES
      .iter()
      .chain(AARCH64_FEATURES)
      .filter_map(move |&(bit, name)| self.has_bit(u32::from(bit)).then_some(name))
  }
}

impl fmt::Debug for Caps {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Caps({}, ", Arch::current().name())?;
    let mut names = self.feature_names().peekable();
    if names.peek().is_none() {
      f.write_str("none")?;
    } else {
      f.write_str("[")?;
      while let Some(name) = names.next() {
        f.write_str(name)?;
        if names.peek().is_some() {
          f.write_str(", ")?;
        }
      }
      f.write_str("]")?;
    }
    f.write_str(")")
  }
}

impl fmt::Display for Caps {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

// ─── Architecture ────────────────────────────────────────────────────────────

/// The processor architecture of the running build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Arch {
  X86_64,
  X86,
  Aarch64,
  Other,
}

impl Arch {
  #[inline]
  #[must_use]
  pub const fn current() -> Arch {
    if cfg!(target_arch = "x86_64") {
      Arch::X86_64
    } else if cfg!(target_arch = "x86") {
      Arch::X86
    } else if cfg!(target_arch = "aarch64") {
      Arch::Aarch64
    } else {
      Arch::Other
    }
  }

  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Arch::X86_64 => "x86_64",
      Arch::X86 => "x86",
      Arch::Aarch64 => "aarch64",
      Arch::Other => "other",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use alloc::format;
  use alloc::vec::Vec;

  use super::*;

  #[test]
  fn none_is_empty() {
    assert!(Caps::NONE.is_empty());
    assert_eq!(Caps::NONE.count(), 0);
  }

  #[test]
  fn has_requires_all_bits() {
    let set = x86::SSE2 | x86::SSE41;
    assert!(set.has(x86::SSE2));
    assert!(set.has(x86::SSE41));
    assert!(set.has(x86::SSE2 | x86::SSE41));
    assert!(!set.has(x86::AVX2));
    assert!(!set.has(x86::SSE41 | x86::AVX2));
  }

  #[test]
  fn every_set_has_none() {
    assert!(Caps::NONE.has(Caps::NONE));
    assert!(x86::AVX512VL.has(Caps::NONE));
  }

  #[test]
  fn union_intersection_difference() {
    let a = x86::SSE41 | x86::AVX2;
    let b = x86::AVX2 | x86::AVX512F;
    assert_eq!(a.union(b), x86::SSE41 | x86::AVX2 | x86::AVX512F);
    assert_eq!(a.intersection(b), x86::AVX2);
    assert_eq!(a.difference(b), x86::SSE41);
  }

  #[test]
  fn arch_bit_ranges_are_disjoint() {
    let all_x86 =
      x86::SSE2 | x86::SSSE3 | x86::SSE41 | x86::AVX | x86::AVX2 | x86::AVX512F | x86::AVX512VL;
    assert!(all_x86.intersection(aarch64::NEON).is_empty());
  }

  #[test]
  fn feature_names_match_bits() {
    let set = x86::SSE2 | x86::AVX512VL;
    let names: Vec<&str> = set.feature_names().collect();
    assert_eq!(names, ["sse2", "avx512vl"]);
    assert_eq!(Caps::NONE.feature_names().count(), 0);
    let names: Vec<&str> = (x86::SSE41 | aarch64::NEON).feature_names().collect();
    assert_eq!(names, ["sse4.1", "neon"]);
  }

  #[test]
  fn debug_lists_names() {
    let rendered = format!("{:?}", x86::SSE2 | x86::SSE41);
    assert!(rendered.contains("sse2"));
    assert!(rendered.contains("sse4.1"));
    assert!(format!("{:?}", Caps::NONE).contains("none"));
  }
}

#[cfg(all(test, not(miri)))]
mod proptests {
  use proptest::prelude::*;

  use super::*;

  fn arb_caps() -> impl Strategy<Value = Caps> {
    any::<u64>().prop_map(Caps::from_raw)
  }

  proptest! {
    #[test]
    fn union_commutative(a in arb_caps(), b in arb_caps()) {
      prop_assert_eq!(a.union(b), b.union(a));
    }

    #[test]
    fn union_associative(a in arb_caps(), b in arb_caps(), c in arb_caps()) {
      prop_assert_eq!(a.union(b).union(c), a.union(b.union(c)));
    }

    #[test]
    fn none_is_identity(a in arb_caps()) {
      prop_assert_eq!(a.union(Caps::NONE), a);
      prop_assert_eq!(a.intersection(Caps::NONE), Caps::NONE);
    }

    #[test]
    fn sets_contain_themselves(a in arb_caps()) {
      prop_assert!(a.has(a));
    }

    #[test]
    fn union_is_superset_of_both(a in arb_caps(), b in arb_caps()) {
      prop_assert!(a.union(b).has(a));
      prop_assert!(a.union(b).has(b));
    }

    #[test]
    fn intersection_is_subset_of_both(a in arb_caps(), b in arb_caps()) {
      prop_assert!(a.has(a.intersection(b)));
      prop_assert!(b.has(a.intersection(b)));
    }

    #[test]
    fn difference_removes_other(a in arb_caps(), b in arb_caps()) {
      prop_assert!(a.difference(b).intersection(b).is_empty());
      prop_assert!(a.has(a.difference(b)));
    }

    #[test]
    fn count_matches_popcount(a in arb_caps()) {
      prop_assert_eq!(a.count(), a.as_raw().count_ones());
      prop_assert_eq!(a.is_empty(), a.count() == 0);
    }

    #[test]
    fn intersection_distributes_over_union(a in arb_caps(), b in arb_caps(), c in arb_caps()) {
      prop_assert_eq!(
        a.intersection(b.union(c)),
        a.intersection(b).union(a.intersection(c))
      );
    }

    #[test]
    fn union_and_intersection_idempotent(a in arb_caps()) {
      prop_assert_eq!(a.union(a), a);
      prop_assert_eq!(a.intersection(a), a);
    }

    #[test]
    fn bit_sets_exactly_one(n in 0u32..64) {
      let c = Caps::bit(n);
      prop_assert_eq!(c.count(), 1);
      prop_assert!(c.has_bit(n));
    }

    #[test]
    fn has_bit_implies_has(a in arb_caps(), n in 0u32..64) {
      if a.has_bit(n) {
        prop_assert!(a.has(Caps::bit(n)));
      }
    }
  }
}
