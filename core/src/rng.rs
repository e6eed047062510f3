//! Deterministic random number generation for synthetic datasets.
//!
//! RULE: nothing in the core calls a platform RNG. Synthetic logs and
//! property samples draw from `SampleRng` streams derived from one master
//! seed, one stream per slot:
//!   - Adding a slot never changes an existing slot's stream.
//!   - Each stream is fully reproducible in isolation.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG stream.
pub struct SampleRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SampleRng {
    /// Derive a stream from the master seed and a stable slot index.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n). Returns 0 when `n == 0`.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Uniform float in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto draw: x_min scale, alpha shape (higher = less skewed).
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    /// Index into `weights` chosen proportionally to its weight.
    pub fn weighted_index(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || total <= 0.0 {
            return 0;
        }
        let mut roll = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            if roll < *w {
                return i;
            }
            roll -= w;
        }
        weights.len() - 1
    }
}

/// All streams for one seed, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn stream(&self, slot: StreamSlot) -> SampleRng {
        SampleRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries. Append only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Customers = 0,
    Invoices  = 1,
    Lines     = 2,
    Samples   = 3,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Invoices  => "invoices",
            Self::Lines     => "lines",
            Self::Samples   => "samples",
        }
    }
}
