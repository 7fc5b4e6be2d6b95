//! The Invertible Bloom Lookup Table: a fixed-capacity,
//! subtractible counting structure over 32-bit keys that can recover a
//! small symmetric difference exactly via peeling.

use std::collections::BTreeSet;

use crate::error::CodecError;
use crate::hash::{self, N_HASH, SEED_CHECK};
use crate::util::round_up_to_multiple;

/// A single IBLT cell: `(count, keySum, keyCheck)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashCell {
    pub count: i32,
    pub key_sum: u32,
    pub key_check: u32,
}

impl HashCell {
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.key_sum == 0 && self.key_check == 0
    }

    /// A cell is pure iff it has been touched by exactly one (still live)
    /// key: `count` is `+1` or `-1` and the check hash matches.
    pub fn is_pure(&self) -> bool {
        (self.count == 1 || self.count == -1) && self.key_check == hash::check_hash(self.key_sum)
    }

    fn apply(&mut self, sign: i32, key: u32) {
        self.count += sign;
        self.key_sum ^= key;
        self.key_check ^= hash::murmur3_32(SEED_CHECK, &key.to_le_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iblt {
    cells: Vec<HashCell>,
}

impl Iblt {
    /// Construct a table sized for `expected` entries: 1.5x oversizing
    /// rounded up to a multiple of `N_HASH`.
    pub fn new(expected: usize) -> Self {
        let oversized = expected + expected / 2;
        let m = round_up_to_multiple(oversized.max(1), N_HASH as usize);
        Iblt {
            cells: vec![HashCell::default(); m],
        }
    }

    /// Rebuild an IBLT from an already-sized cell vector (e.g. after
    /// decoding the wire form). The length is trusted to be a multiple of
    /// `N_HASH`; callers that decode untrusted bytes should check this
    /// against their own configured `len()` before accepting it.
    pub fn from_cells(cells: Vec<HashCell>) -> Self {
        Iblt { cells }
    }

    pub fn cells(&self) -> &[HashCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `true` iff every cell is empty, i.e. this table represents the
    /// empty set (used both for `IBLT::new()` identity checks and to
    /// recognize a fully-decoded difference).
    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(HashCell::is_empty)
    }

    fn apply(&mut self, sign: i32, key: u32) {
        let sub_len = self.cells.len() / N_HASH as usize;
        let key_bytes = key.to_le_bytes();
        for j in 0..N_HASH {
            let idx = j as usize * sub_len + (hash::murmur3_32(j, &key_bytes) as usize % sub_len);
            self.cells[idx].apply(sign, key);
        }
    }

    pub fn insert(&mut self, key: u32) {
        self.apply(1, key);
    }

    pub fn erase(&mut self, key: u32) {
        self.apply(-1, key);
    }

    /// `self - other`, cell-wise. Both tables must have the same
    /// length; this is the producer/consumer IBLT length mismatch that
    /// maps to a parse error at the call site.
    pub fn subtract(&self, other: &Iblt) -> Result<Iblt, CodecError> {
        if self.cells.len() != other.cells.len() {
            return Err(CodecError::CellCountMismatch {
                expected: self.cells.len(),
                found: other.cells.len(),
            });
        }
        let cells = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| HashCell {
                count: a.count - b.count,
                key_sum: a.key_sum ^ b.key_sum,
                key_check: a.key_check ^ b.key_check,
            })
            .collect();
        Ok(Iblt { cells })
    }

    /// The peeling decoder. Returns `(positive, negative, ok)`:
    /// `positive` holds keys with a net `+1` contribution (present in
    /// `self` but not `other` for a `self - other` difference), `negative`
    /// the `-1` side. `ok` is `false` if peeling stalled before every cell
    /// emptied out: the difference is too large to decode and the caller
    /// must treat the returned sets as partial/untrustworthy.
    pub fn list_entries(&self) -> (BTreeSet<u32>, BTreeSet<u32>, bool) {
        let mut work = self.clone();
        let mut positive = BTreeSet::new();
        let mut negative = BTreeSet::new();

        loop {
            let mut peeled_any = false;
            for i in 0..work.cells.len() {
                let cell = work.cells[i];
                if !cell.is_pure() {
                    continue;
                }
                let key = cell.key_sum;
                if cell.count == 1 {
                    positive.insert(key);
                } else {
                    negative.insert(key);
                }
                work.apply(-cell.count, key);
                peeled_any = true;
            }
            if !peeled_any {
                break;
            }
        }

        let ok = work.is_zero();
        (positive, negative, ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn new_table_is_a_multiple_of_n_hash_and_nonempty() {
        let iblt = Iblt::new(80);
        assert_eq!(iblt.len() % N_HASH as usize, 0);
        assert!(iblt.len() >= 80);
        assert!(iblt.is_zero());
    }

    #[test]
    fn insert_then_erase_returns_to_zero() {
        let mut iblt = Iblt::new(40);
        iblt.insert(12345);
        assert!(!iblt.is_zero());
        iblt.erase(12345);
        assert!(iblt.is_zero());
    }

    #[test]
    fn linearity_of_disjoint_sets() {
        let a: Vec<u32> = (0..10).collect();
        let b: Vec<u32> = (100..110).collect();

        let mut combined = Iblt::new(40);
        for &k in a.iter().chain(b.iter()) {
            combined.insert(k);
        }

        let mut only_a = Iblt::new(40);
        for &k in &a {
            only_a.insert(k);
        }
        let mut only_b = Iblt::new(40);
        for &k in &b {
            only_b.insert(k);
        }
        let summed: Vec<HashCell> = only_a
            .cells
            .iter()
            .zip(only_b.cells.iter())
            .map(|(x, y)| HashCell {
                count: x.count + y.count,
                key_sum: x.key_sum ^ y.key_sum,
                key_check: x.key_check ^ y.key_check,
            })
            .collect();

        assert_eq!(combined.cells, summed);
    }

    #[test_case(5, 5, 40; "small symmetric diff decodes")]
    #[test_case(0, 10, 40; "one-sided diff decodes")]
    #[test_case(15, 15, 80; "larger diff within capacity decodes")]
    fn decoder_exactness(only_a: usize, only_b: usize, expected: usize) {
        let a_keys: Vec<u32> = (0..only_a as u32).collect();
        let b_keys: Vec<u32> = (1_000_000..1_000_000 + only_b as u32).collect();

        let mut iblt_a = Iblt::new(expected);
        for &k in &a_keys {
            iblt_a.insert(k);
        }
        let mut iblt_b = Iblt::new(expected);
        for &k in &b_keys {
            iblt_b.insert(k);
        }

        let diff = iblt_a.subtract(&iblt_b).unwrap();
        let (positive, negative, ok) = diff.list_entries();
        assert!(ok);
        assert_eq!(positive, a_keys.into_iter().collect());
        assert_eq!(negative, b_keys.into_iter().collect());
    }

    #[test]
    fn decoder_self_reports_on_an_oversized_difference() {
        let expected = 20;
        let mut iblt_a = Iblt::new(expected);
        for k in 0..2_000u32 {
            iblt_a.insert(k);
        }
        let iblt_b = Iblt::new(expected);

        let diff = iblt_a.subtract(&iblt_b).unwrap();
        let (_, _, ok) = diff.list_entries();
        assert!(!ok);
    }

    #[test]
    fn subtract_requires_equal_length() {
        let a = Iblt::new(10);
        let b = Iblt::new(11);
        assert!(a.subtract(&b).is_err());
    }

    proptest! {
        #[test]
        fn prop_identity_for_any_key(key: u32) {
            let mut iblt = Iblt::new(30);
            iblt.insert(key);
            iblt.erase(key);
            prop_assert!(iblt.is_zero());
        }

        #[test]
        fn prop_linearity_disjoint_sets(a in prop::collection::hash_set(0u32..5_000, 0..20), b in prop::collection::hash_set(5_000u32..10_000, 0..20)) {
            let mut combined = Iblt::new(60);
            for &k in a.iter().chain(b.iter()) {
                combined.insert(k);
            }
            let mut only_a = Iblt::new(60);
            for &k in &a {
                only_a.insert(k);
            }
            let mut only_b = Iblt::new(60);
            for &k in &b {
                only_b.insert(k);
            }
            for i in 0..combined.len() {
                prop_assert_eq!(combined.cells[i].count, only_a.cells[i].count + only_b.cells[i].count);
                prop_assert_eq!(combined.cells[i].key_sum, only_a.cells[i].key_sum ^ only_b.cells[i].key_sum);
            }
        }

        #[test]
        fn prop_small_diffs_always_decode(a in prop::collection::hash_set(0u32..5_000, 0..15), b in prop::collection::hash_set(5_000u32..10_000, 0..15)) {
            let expected = 80;
            let mut iblt_a = Iblt::new(expected);
            for &k in &a {
                iblt_a.insert(k);
            }
            let mut iblt_b = Iblt::new(expected);
            for &k in &b {
                iblt_b.insert(k);
            }
            let diff = iblt_a.subtract(&iblt_b).unwrap();
            let (positive, negative, ok) = diff.list_entries();
            prop_assert!(ok);
            prop_assert_eq!(positive, a);
            prop_assert_eq!(negative, b);
        }
    }
}
