// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Gap test with inversion framing (`gap_test`): the distribution of
//! indices between successive occurrences of a fixed-size tag extracted
//! from the generator's high bits.

use std::collections::HashMap;

use crate::error::BatteryError;
use crate::generator::Generator;
use crate::result::TestResult;
use crate::specfuncs;

#[derive(Debug, Clone, Copy)]
pub struct GapParams {
    /// Number of high bits kept as the tag; the tag space is `2^shl`.
    pub shl: u32,
    /// Number of recorded gaps to accumulate before scoring.
    pub ngaps: usize,
    pub penalty: u32,
}

impl GapParams {
    pub fn validate(&self, width_bits: u32) -> Result<(), BatteryError> {
        if self.shl == 0 || self.shl > width_bits {
            return Err(BatteryError::config(format!(
                "shl {} out of range [1, {width_bits}]",
                self.shl
            )));
        }
        if self.ngaps == 0 {
            return Err(BatteryError::config("ngaps must be >= 1"));
        }
        Ok(())
    }
}

/// Chooses the largest bin boundary `K` such that every bin `1..=K`, plus
/// the `>= K+1` tail, has an expected count over 5 under the geometric
/// distribution with success probability `p`.
fn choose_k(ngaps: usize, p: f64) -> usize {
    let mut k = 1usize;
    let mut expected = ngaps as f64 * p;
    while expected * (1.0 - p) >= 5.0 {
        k += 1;
        expected *= 1.0 - p;
    }
    k
}

/// `gap_test`: streams draws until `ngaps` gaps between repeated tags
/// have been observed, then scores the gap-length histogram against the
/// geometric distribution implied by a `2^shl`-sized tag alphabet.
pub fn gap_test(gen: &mut dyn Generator, params: &GapParams) -> TestResult {
    let w = gen.width().bits();
    let shift = w - params.shl;
    let p = 1.0 / 2f64.powi(params.shl as i32);
    let k = choose_k(params.ngaps, p);

    let mut last_seen: HashMap<u64, usize> = HashMap::new();
    // bins[0..k) holds gap lengths 1..=k, bins[k] is the ">= k+1" tail.
    let mut bins = vec![0u64; k + 1];
    let mut recorded = 0usize;
    let mut index = 0usize;

    while recorded < params.ngaps {
        let word = gen.draw();
        let key = word >> shift;
        index += 1;
        if let Some(&last) = last_seen.get(&key) {
            let gap = index - last;
            if gap >= 1 && gap <= k {
                bins[gap - 1] += 1;
            } else {
                bins[k] += 1;
            }
            recorded += 1;
        }
        last_seen.insert(key, index);
    }

    let n = params.ngaps as f64;
    let mut chi2 = 0.0;
    for j in 1..=k {
        let expected = n * p * (1.0 - p).powi(j as i32 - 1);
        let d = bins[j - 1] as f64 - expected;
        chi2 += d * d / expected;
    }
    let tail_expected = n * (1.0 - p).powi(k as i32);
    let d_tail = bins[k] as f64 - tail_expected;
    chi2 += d_tail * d_tail / tail_expected;

    let pvalue = specfuncs::chi2_pvalue(chi2, k as f64);
    TestResult::new(format!("gap_test[shl={}]", params.shl), chi2, pvalue, params.penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Randu, RngCoreGenerator};

    #[test]
    fn choose_k_guarantees_minimum_expected_count() {
        let k = choose_k(100_000, 1.0 / 1024.0);
        let expected_k = 100_000.0 * (1.0 / 1024.0) * (1023.0 / 1024.0f64).powi(k as i32 - 1);
        assert!(expected_k >= 5.0);
    }

    #[test]
    fn gap_test_passes_on_chacha_oracle() {
        let mut g = RngCoreGenerator::chacha_oracle(9);
        let params = GapParams {
            shl: 8,
            ngaps: 20_000,
            penalty: 2,
        };
        let r = gap_test(&mut g, &params);
        assert!(r.p > 1e-4, "p={}", r.p);
    }

    #[test]
    fn gap_test_flags_randu_structural_weakness() {
        let mut g = Randu::new(1);
        let params = GapParams {
            shl: 8,
            ngaps: 20_000,
            penalty: 2,
        };
        let r = gap_test(&mut g, &params);
        assert!(r.p < 1e-4, "p={}", r.p);
    }

    #[test]
    fn validate_rejects_shl_out_of_range() {
        let params = GapParams {
            shl: 0,
            ngaps: 100,
            penalty: 1,
        };
        assert!(params.validate(64).is_err());
        let params = GapParams {
            shl: 65,
            ngaps: 100,
            penalty: 1,
        };
        assert!(params.validate(64).is_err());
    }
}
