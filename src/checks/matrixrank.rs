// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Matrix rank over GF(2) (`matrixrank`), generalised from the teacher's
//! fixed 32x32 `utils::rank_binary_matrix` to an arbitrary word-multiple
//! side length and a selectable fill width.

use crate::error::BatteryError;
use crate::generator::{draw32, draw64, Generator};
use crate::result::TestResult;
use crate::specfuncs;

/// Expected rank-deficiency bucket fractions for an `n x n` random GF(2)
/// matrix as `n -> infinity`. The first bucket follows the teacher's own
/// `EXPECTED_DISTRIBUTION` constant (0.1336) rather than the 0.1284 figure
/// some references use; the three fractions sum exactly to 1.0 under that
/// choice, which the 0.1284 variant does not.
const EXPECTED_RANK_DEFICIENT: f64 = 0.1336;
const EXPECTED_RANK_MINUS_ONE: f64 = 0.5776;
const EXPECTED_FULL_RANK: f64 = 0.2888;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillWidth {
    /// Pack the low 8 bits of each draw, one byte per draw, into the row.
    Low8,
    /// Whole native-width words of the generator.
    Native,
}

#[derive(Debug, Clone, Copy)]
pub struct MatrixRankParams {
    /// Matrix side length; must be a multiple of 64.
    pub n: usize,
    pub fill: FillWidth,
    /// Number of trial matrices scored per test invocation.
    pub ntrials: usize,
    pub penalty: u32,
}

impl MatrixRankParams {
    pub fn validate(&self) -> Result<(), BatteryError> {
        if self.n == 0 || self.n % 64 != 0 {
            return Err(BatteryError::config(format!(
                "n {} must be a positive multiple of 64",
                self.n
            )));
        }
        if self.ntrials == 0 {
            return Err(BatteryError::config("ntrials must be >= 1"));
        }
        Ok(())
    }
}

fn fill_row(gen: &mut dyn Generator, nwords: usize, fill: FillWidth) -> Vec<u64> {
    match fill {
        FillWidth::Native => (0..nwords).map(|_| draw64(gen)).collect(),
        FillWidth::Low8 => (0..nwords)
            .map(|_| {
                let mut word = 0u64;
                for _ in 0..8 {
                    let byte = (draw32(gen) & 0xFF) as u64;
                    word = (word << 8) | byte;
                }
                word
            })
            .collect(),
    }
}

/// Word-parallel Gaussian elimination over GF(2); returns the rank of the
/// `n x n` matrix held in `rows` (`n/64` words each, MSB-first within a
/// word matching column order).
fn rank_gf2(rows: &mut [Vec<u64>], n: usize) -> usize {
    let mut rank = 0usize;
    for col in 0..n {
        let word_idx = col / 64;
        let mask = 1u64 << (63 - (col % 64));
        let pivot = (rank..n).find(|&r| rows[r][word_idx] & mask != 0);
        let Some(pivot_row) = pivot else {
            continue;
        };
        rows.swap(rank, pivot_row);
        let (pivot_words, rest) = {
            // Split so the pivot row can be read while other rows are
            // mutated; only words at index >= word_idx matter, earlier
            // words in every row below the pivot are already zeroed.
            let pivot_copy = rows[rank][word_idx..].to_vec();
            (pivot_copy, &mut rows[rank + 1..n])
        };
        for row in rest.iter_mut() {
            if row[word_idx] & mask != 0 {
                for (dst, src) in row[word_idx..].iter_mut().zip(pivot_words.iter()) {
                    *dst ^= src;
                }
            }
        }
        rank += 1;
    }
    rank
}

/// `matrixrank`: scores `params.ntrials` independently drawn `n x n` GF(2)
/// matrices by rank-deficiency bucket against the infinite-`n` chi-square
/// reference distribution.
pub fn matrixrank(gen: &mut dyn Generator, params: &MatrixRankParams) -> TestResult {
    let nwords = params.n / 64;
    let mut buckets = [0u64; 3]; // [<=n-2, n-1, n]
    for _ in 0..params.ntrials {
        let mut rows: Vec<Vec<u64>> = (0..params.n)
            .map(|_| fill_row(gen, nwords, params.fill))
            .collect();
        let rank = rank_gf2(&mut rows, params.n);
        if rank == params.n {
            buckets[2] += 1;
        } else if rank + 1 == params.n {
            buckets[1] += 1;
        } else {
            buckets[0] += 1;
        }
    }
    let total = params.ntrials as f64;
    let expected = [
        EXPECTED_RANK_DEFICIENT * total,
        EXPECTED_RANK_MINUS_ONE * total,
        EXPECTED_FULL_RANK * total,
    ];
    let chi2: f64 = buckets
        .iter()
        .zip(expected.iter())
        .map(|(&obs, &exp)| {
            let d = obs as f64 - exp;
            d * d / exp
        })
        .sum();
    let p = specfuncs::chi2_pvalue(chi2, 2.0);
    TestResult::new(format!("matrixrank[n={}]", params.n), chi2, p, params.penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AllZeros, Mmix, RngCoreGenerator};

    #[test]
    fn rank_gf2_identity_is_full_rank() {
        let n = 64;
        let mut rows: Vec<Vec<u64>> = (0..n)
            .map(|i| {
                let mut word = 0u64;
                word |= 1u64 << (63 - i);
                vec![word]
            })
            .collect();
        assert_eq!(rank_gf2(&mut rows, n), n);
    }

    #[test]
    fn rank_gf2_all_zero_matrix_is_rank_zero() {
        let n = 64;
        let mut rows: Vec<Vec<u64>> = (0..n).map(|_| vec![0u64]).collect();
        assert_eq!(rank_gf2(&mut rows, n), 0);
    }

    #[test]
    fn matrixrank_detects_all_zeros() {
        let mut g = AllZeros;
        let params = MatrixRankParams {
            n: 64,
            fill: FillWidth::Native,
            ntrials: 16,
            penalty: 3,
        };
        let r = matrixrank(&mut g, &params);
        assert!(r.p < 1e-6);
    }

    #[test]
    fn matrixrank_passes_on_chacha_oracle() {
        let mut g = RngCoreGenerator::chacha_oracle(2);
        let params = MatrixRankParams {
            n: 64,
            fill: FillWidth::Native,
            ntrials: 64,
            penalty: 3,
        };
        let r = matrixrank(&mut g, &params);
        assert!(r.p > 1e-4, "p={}", r.p);
    }

    #[test]
    fn matrixrank_flags_mmix_structural_correlation() {
        // MMIX's low bits are strongly correlated between successive
        // outputs, which biases rank-deficiency frequency away from the
        // random-matrix reference distribution.
        let mut g = Mmix::new(1);
        let params = MatrixRankParams {
            n: 64,
            fill: FillWidth::Low8,
            ntrials: 64,
            penalty: 3,
        };
        let r = matrixrank(&mut g, &params);
        assert!(r.p < 1e-2, "p={}", r.p);
    }
}
