// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Birthday-spacings tests: N-dimensional and the memory-intensive 1D
//! 64-bit variant.

use crate::checks::common::KeyParams;
use crate::error::BatteryError;
use crate::generator::{draw64, Generator};
use crate::result::TestResult;
use crate::specfuncs;

/// Sample size per repetition, fixed per the spec.
const SAMPLE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct BspaceNdParams {
    pub key: KeyParams,
    pub nsamples: usize,
    pub penalty: u32,
}

impl BspaceNdParams {
    pub fn validate(&self) -> Result<(), BatteryError> {
        self.key.validate(64)?;
        if self.nsamples == 0 {
            return Err(BatteryError::config("nsamples must be >= 1"));
        }
        Ok(())
    }
}

fn count_duplicate_spacings(mut keys: Vec<u64>) -> u64 {
    keys.sort_unstable();
    let mut spacings: Vec<u64> = keys.windows(2).map(|w| w[1].wrapping_sub(w[0])).collect();
    spacings.sort_unstable();
    spacings.windows(2).filter(|w| w[0] == w[1]).count() as u64
}

/// N-dimensional birthday-spacings test (`bspace_nd`).
pub fn bspace_nd(gen: &mut dyn Generator, params: &BspaceNdParams) -> TestResult {
    let b = params.key.total_bits();
    let mut total_dupes: u64 = 0;
    for _ in 0..params.nsamples {
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| params.key.sample_key(gen)).collect();
        total_dupes += count_duplicate_spacings(keys);
    }
    let lambda =
        params.nsamples as f64 * (SAMPLE_SIZE as f64).powi(3) / (4.0 * 2f64.powi(b as i32));
    let p = specfuncs::poisson_pvalue(total_dupes as f64, lambda);
    TestResult::new(
        format!("bspace_nd[{b}b]"),
        total_dupes as f64,
        p,
        params.penalty,
    )
}

#[derive(Debug, Clone, Copy)]
pub struct Bspace64Params {
    /// `log2` of the sample size; spec allows `[22, 26]`.
    pub n_exponent: u32,
    pub nsamples: usize,
    pub penalty: u32,
}

impl Bspace64Params {
    pub fn validate(&self) -> Result<(), BatteryError> {
        if !(22..=26).contains(&self.n_exponent) {
            return Err(BatteryError::config(format!(
                "n_exponent {} out of range [22, 26]",
                self.n_exponent
            )));
        }
        if self.nsamples == 0 {
            return Err(BatteryError::config("nsamples must be >= 1"));
        }
        Ok(())
    }
}

/// One-dimensional birthday spacings on full 64-bit keys (`bspace64_1d_ns`).
/// Memory-intensive; intended only for the full/extra tiers.
pub fn bspace64_1d_ns(gen: &mut dyn Generator, params: &Bspace64Params) -> TestResult {
    let n = 1usize << params.n_exponent;
    let mut total_dupes: u64 = 0;
    for _ in 0..params.nsamples {
        let keys: Vec<u64> = (0..n).map(|_| draw64(gen)).collect();
        total_dupes += count_duplicate_spacings(keys);
    }
    let lambda = params.nsamples as f64 * (n as f64).powi(3) / (4.0 * 2f64.powi(64));
    let p = specfuncs::poisson_pvalue(total_dupes as f64, lambda);
    TestResult::new("bspace64_1d_ns", total_dupes as f64, p, params.penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AllZeros, LaggedFibonacci, RngCoreGenerator};

    #[test]
    fn bspace_nd_detects_constant_generator() {
        let mut g = AllZeros::default();
        let params = BspaceNdParams {
            key: KeyParams {
                nbits_per_dim: 32,
                ndims: 1,
                use_low_bits: true,
            },
            nsamples: 2,
            penalty: 4,
        };
        let r = bspace_nd(&mut g, &params);
        // Every key is identical, so every spacing after the first is a
        // duplicate -- far more than the Poisson mean at this keyspace.
        assert!(r.p < 1e-6);
    }

    #[test]
    fn bspace_nd_passes_on_chacha_oracle() {
        let mut g = RngCoreGenerator::chacha_oracle(1);
        let params = BspaceNdParams {
            key: KeyParams {
                nbits_per_dim: 32,
                ndims: 1,
                use_low_bits: true,
            },
            nsamples: 16,
            penalty: 2,
        };
        let r = bspace_nd(&mut g, &params);
        assert!(r.p > 1e-4 && r.p <= 1.0, "p={}", r.p);
    }

    #[test]
    fn bspace_nd_flags_lagged_fibonacci_structural_failure() {
        // Mirrors the spec's scenario B: bspace32_1d on an additive
        // lagged-Fibonacci generator with lags (55, 24) is a known
        // structural failure.
        let mut g = LaggedFibonacci::new(55, 24, 7);
        let params = BspaceNdParams {
            key: KeyParams {
                nbits_per_dim: 32,
                ndims: 1,
                use_low_bits: true,
            },
            nsamples: 16,
            penalty: 2,
        };
        let r = bspace_nd(&mut g, &params);
        assert!(r.p < 1e-6, "expected structural failure, p={}", r.p);
    }
}
