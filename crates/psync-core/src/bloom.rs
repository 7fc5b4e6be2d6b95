//! Bloom filter with closed-form optimal parameter derivation,
//! grounded on the classic `n_hash_funcs`/`n_tweak` shape seen in Bitcoin's
//! bloom filter but keyed through this crate's own hash family so the
//! consumer's subscription filter and the IBLT check hash share one
//! deterministic primitive.

use crate::hash;
use crate::util::round_up_to_byte;

/// Hash salts used for Bloom filter index derivation start here, well
/// clear of the IBLT's reserved seeds `0..N_HASH` and `SEED_CHECK`.
const SALT_BASE: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: usize,
    k: u32,
    n: u32,
    p_scaled: u32,
    table: Vec<u8>,
}

impl BloomFilter {
    /// `new(n, p)`: derive `(M, k)` from the projected element count and
    /// desired false-positive rate.
    pub fn new(n: u32, p: f64) -> Self {
        let n_f = (n.max(1)) as f64;
        let bits_raw = (-(n_f) * p.ln() / std::f64::consts::LN_2.powi(2)).ceil();
        let bits = round_up_to_byte((bits_raw.max(8.0)) as usize);
        let k = ((bits as f64 / n_f) * std::f64::consts::LN_2).round().max(1.0) as u32;
        let p_scaled = (p * 1000.0).round() as u32;
        BloomFilter {
            bits,
            k,
            n,
            p_scaled,
            table: vec![0u8; bits / 8],
        }
    }

    /// A filter that is configured to match everything: the consumer's
    /// "subscribe-all" sentinel is `(n=1, p=0.001)`.
    pub fn is_subscribe_all(&self) -> bool {
        self.n == 1 && self.p_scaled == 1
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn hash_count(&self) -> u32 {
        self.k
    }

    pub fn projected_count(&self) -> u32 {
        self.n
    }

    pub fn p_scaled(&self) -> u32 {
        self.p_scaled
    }

    pub fn table(&self) -> &[u8] {
        &self.table
    }

    fn index(&self, i: u32, bytes: &[u8]) -> usize {
        hash::murmur3_32(SALT_BASE + i, bytes) as usize % self.bits
    }

    pub fn insert(&mut self, bytes: &[u8]) {
        for i in 0..self.k {
            let idx = self.index(i, bytes);
            self.table[idx / 8] |= 1 << (idx % 8);
        }
    }

    pub fn contains(&self, bytes: &[u8]) -> bool {
        if self.is_subscribe_all() {
            return true;
        }
        (0..self.k).all(|i| {
            let idx = self.index(i, bytes);
            self.table[idx / 8] & (1 << (idx % 8)) != 0
        })
    }

    /// Rebuild a filter from a decoded wire table plus the `(n, p)`
    /// carried alongside it in earlier name components. Fails
    /// if the table length doesn't match what `(n, p)` would produce.
    pub fn from_table(table: Vec<u8>, n: u32, p: f64) -> Result<Self, crate::error::CodecError> {
        let mut fresh = BloomFilter::new(n, p);
        if fresh.table.len() != table.len() {
            return Err(crate::error::CodecError::BloomTableMismatch {
                expected: fresh.table.len(),
                found: table.len(),
            });
        }
        fresh.table = table;
        Ok(fresh)
    }
}
