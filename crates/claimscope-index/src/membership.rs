//! Probabilistic beneficiary membership for one load batch.
//!
//! A classic bloom filter sized for a target false-positive rate:
//! m = -n * ln(p) / (ln 2)^2 bits and k = m/n * ln 2 probes. Probe positions
//! come from double hashing over the two halves of an xxh3-128 digest.

use xxhash_rust::xxh3::xxh3_128;

use crate::error::{IndexError, Result};

/// An immutable set of beneficiary ids with no false negatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFilter {
    bits: Box<[u64]>,
    bit_size: u64,
    hash_count: u32,
    items: usize,
}

impl MembershipFilter {
    pub fn builder(expected_items: usize, false_positive_rate: f64) -> Result<MembershipFilterBuilder> {
        MembershipFilterBuilder::with_accuracy(expected_items, false_positive_rate)
    }

    /// `false` means the id was never inserted.
    pub fn might_contain(&self, beneficiary_id: &str) -> bool {
        probes(beneficiary_id, self.hash_count, self.bit_size).all(|bit| self.is_set(bit))
    }

    pub fn bit_size(&self) -> u64 {
        self.bit_size
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Number of ids inserted while building.
    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Expected false-positive probability for the inserted count,
    /// (1 - e^(-k n / m))^k.
    pub fn estimated_fpp(&self) -> f64 {
        let k = f64::from(self.hash_count);
        let fill = -(k * self.items as f64) / self.bit_size as f64;
        (1.0 - fill.exp()).powf(k)
    }

    fn is_set(&self, bit: u64) -> bool {
        self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
    }
}

/// Mutable bit array that freezes into a [`MembershipFilter`].
#[derive(Debug, Clone)]
pub struct MembershipFilterBuilder {
    bits: Vec<u64>,
    bit_size: u64,
    hash_count: u32,
    items: usize,
}

impl MembershipFilterBuilder {
    /// Size the filter for `expected_items` at `false_positive_rate`.
    pub fn with_accuracy(expected_items: usize, false_positive_rate: f64) -> Result<Self> {
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(IndexError::configuration(format!(
                "false positive rate must be in (0, 1), got {false_positive_rate}"
            )));
        }

        let n = expected_items.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let m = (-(n * false_positive_rate.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let k = ((m as f64 / n) * ln2).round().max(1.0) as u32;

        // Round up to whole words
        let words = m.div_ceil(64);

        Ok(Self {
            bits: vec![0; words as usize],
            bit_size: words * 64,
            hash_count: k,
            items: 0,
        })
    }

    pub fn insert(&mut self, beneficiary_id: &str) {
        for bit in probes(beneficiary_id, self.hash_count, self.bit_size) {
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.items += 1;
    }

    pub fn build(self) -> MembershipFilter {
        MembershipFilter {
            bits: self.bits.into_boxed_slice(),
            bit_size: self.bit_size,
            hash_count: self.hash_count,
            items: self.items,
        }
    }
}

impl<S: AsRef<str>> Extend<S> for MembershipFilterBuilder {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id.as_ref());
        }
    }
}

/// Bit positions for `key`: h1 + i * h2 (mod m).
fn probes(key: &str, hash_count: u32, bit_size: u64) -> impl Iterator<Item = u64> {
    let digest = xxh3_128(key.as_bytes());
    let h1 = digest as u64;
    // odd so successive probes never collapse onto one bit
    let h2 = ((digest >> 64) as u64) | 1;
    (0..u64::from(hash_count)).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % bit_size)
}
