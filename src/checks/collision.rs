// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Collision-over test: counts how many draws land in a cell already
//! occupied by an earlier draw, within a `2^B`-cell keyspace tracked as a
//! bitset.

use crate::checks::common::KeyParams;
use crate::error::BatteryError;
use crate::generator::Generator;
use crate::result::TestResult;
use crate::specfuncs;

/// The bitset backing a collision test is `2^B / 64` `u64` words, so `B`
/// is capped well below the birthday-spacings limit to keep memory bounded.
const MAX_B: u32 = 26;

#[derive(Debug, Clone, Copy)]
pub struct CollisionParams {
    pub key: KeyParams,
    /// Number of draws per repetition.
    pub n: usize,
    pub nsamples: usize,
    pub penalty: u32,
}

impl CollisionParams {
    pub fn validate(&self) -> Result<(), BatteryError> {
        self.key.validate(MAX_B)?;
        if self.n == 0 {
            return Err(BatteryError::config("n must be >= 1"));
        }
        if self.nsamples == 0 {
            return Err(BatteryError::config("nsamples must be >= 1"));
        }
        Ok(())
    }
}

/// Bitset over `2^b` cells, backed by `u64` words.
struct Occupancy {
    words: Vec<u64>,
}

impl Occupancy {
    fn new(b: u32) -> Self {
        let ncells = 1usize << b;
        let nwords = ncells.div_ceil(64);
        Occupancy {
            words: vec![0u64; nwords],
        }
    }

    /// Marks `key` occupied, returning whether it was already occupied.
    fn mark(&mut self, key: u64) -> bool {
        let idx = (key >> 6) as usize;
        let bit = 1u64 << (key & 63);
        let was_set = self.words[idx] & bit != 0;
        self.words[idx] |= bit;
        was_set
    }
}

/// `collision_over`: counts collisions among `n` keys drawn into a
/// `2^b`-cell space, compared against the Poisson approximation
/// `mu = n - 2^b * (1 - (1 - 1/2^b)^n)`.
pub fn collision_over(gen: &mut dyn Generator, params: &CollisionParams) -> TestResult {
    let b = params.key.total_bits();
    let mut total_collisions: u64 = 0;
    for _ in 0..params.nsamples {
        let mut occ = Occupancy::new(b);
        for _ in 0..params.n {
            let key = params.key.sample_key(gen);
            if occ.mark(key) {
                total_collisions += 1;
            }
        }
    }
    let ncells = 2f64.powi(b as i32);
    let p_empty = (1.0 - 1.0 / ncells).powi(params.n as i32);
    let mu_single = params.n as f64 - ncells * (1.0 - p_empty);
    let mu = params.nsamples as f64 * mu_single;
    let p = specfuncs::poisson_pvalue(total_collisions as f64, mu);
    TestResult::new(
        format!("collision_over[{b}b]"),
        total_collisions as f64,
        p,
        params.penalty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AllZeros, LaggedFibonacci, RngCoreGenerator};

    #[test]
    fn collision_over_detects_constant_generator() {
        let mut g = AllZeros::default();
        let params = CollisionParams {
            key: KeyParams {
                nbits_per_dim: 20,
                ndims: 1,
                use_low_bits: true,
            },
            n: 4096,
            nsamples: 1,
            penalty: 4,
        };
        // Every draw lands in cell 0: all but the first of 4096 draws
        // collide, far more than the Poisson mean at 2^20 cells.
        let r = collision_over(&mut g, &params);
        assert!(r.p < 1e-6);
    }

    #[test]
    fn collision_over_passes_on_chacha_oracle() {
        let mut g = RngCoreGenerator::chacha_oracle(1);
        let params = CollisionParams {
            key: KeyParams {
                nbits_per_dim: 16,
                ndims: 1,
                use_low_bits: true,
            },
            n: 4096,
            nsamples: 8,
            penalty: 2,
        };
        let r = collision_over(&mut g, &params);
        assert!(r.p > 1e-4 && r.p <= 1.0, "p={}", r.p);
    }

    #[test]
    fn collision_over_flags_lagged_fibonacci_structural_failure() {
        let mut g = LaggedFibonacci::new(55, 24, 11);
        let params = CollisionParams {
            key: KeyParams {
                nbits_per_dim: 16,
                ndims: 1,
                use_low_bits: true,
            },
            n: 4096,
            nsamples: 8,
            penalty: 2,
        };
        let r = collision_over(&mut g, &params);
        assert!(r.p < 1e-6, "expected structural failure, p={}", r.p);
    }

    #[test]
    fn validate_rejects_b_over_max() {
        let params = CollisionParams {
            key: KeyParams {
                nbits_per_dim: 27,
                ndims: 1,
                use_low_bits: true,
            },
            n: 4096,
            nsamples: 1,
            penalty: 1,
        };
        assert!(params.validate().is_err());
    }
}
