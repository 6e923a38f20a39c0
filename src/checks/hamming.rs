// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Hamming-weight dispersion ("DC6") test (`hamming_dc6`): a
//! popcount z-test over a selectable byte-extraction mode, generalising
//! the teacher's `stats::u64_block_bit_frequency_test` (which fixes the
//! sample unit at one whole `u64` word) to four interchangeable slicing
//! strategies.

use crate::generator::{draw32, draw64, Generator};
use crate::result::TestResult;
use crate::specfuncs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HammingMode {
    /// Every byte of every native-width draw, in order.
    WholeBytes,
    /// The popcount of each full native-width draw taken as one unit;
    /// arithmetically equivalent to `WholeBytes` in aggregate (popcount
    /// is additive over a word's bytes) but sources its samples a whole
    /// draw at a time rather than byte-by-byte.
    Values,
    /// The lowest bit of each draw, eight draws packed into one byte.
    Low1Bytes,
    /// The low 8 bits of each draw, one draw per byte.
    Low8Bytes,
}

#[derive(Debug, Clone, Copy)]
pub struct HammingParams {
    pub mode: HammingMode,
    pub nbytes: usize,
    pub penalty: u32,
}

/// Streams `nbytes` worth of popcount samples under the selected mode and
/// returns the total number of set bits observed.
fn accumulate_ones(gen: &mut dyn Generator, mode: HammingMode, nbytes: usize) -> u64 {
    let mut ones: u64 = 0;
    match mode {
        HammingMode::WholeBytes => {
            let mut produced = 0usize;
            while produced < nbytes {
                let word = draw64(gen);
                for byte in word.to_le_bytes() {
                    if produced >= nbytes {
                        break;
                    }
                    ones += byte.count_ones() as u64;
                    produced += 1;
                }
            }
        }
        HammingMode::Values => {
            let width_bytes = (gen.width().bits() / 8) as usize;
            let ndraws = nbytes.div_ceil(width_bytes);
            let mut bits_budget = nbytes * 8;
            for _ in 0..ndraws {
                let word = draw64(gen);
                let take_bits = bits_budget.min(width_bytes * 8);
                ones += (word & mask_low_bits(take_bits as u32)).count_ones() as u64;
                bits_budget = bits_budget.saturating_sub(take_bits);
            }
        }
        HammingMode::Low1Bytes => {
            let mut byte = 0u8;
            let mut bits_in_byte = 0u32;
            let mut produced = 0usize;
            while produced < nbytes {
                let bit = (gen.draw() & 1) as u8;
                byte = (byte << 1) | bit;
                bits_in_byte += 1;
                if bits_in_byte == 8 {
                    ones += byte.count_ones() as u64;
                    byte = 0;
                    bits_in_byte = 0;
                    produced += 1;
                }
            }
        }
        HammingMode::Low8Bytes => {
            for _ in 0..nbytes {
                let byte = (draw32(gen) & 0xFF) as u8;
                ones += byte.count_ones() as u64;
            }
        }
    }
    ones
}

fn mask_low_bits(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// `hamming_dc6`: z-test of the observed popcount against the theoretical
/// mean `4 * nbytes` and standard deviation `sqrt(2 * nbytes)`.
pub fn hamming_dc6(gen: &mut dyn Generator, params: &HammingParams) -> TestResult {
    let ones = accumulate_ones(gen, params.mode, params.nbytes);
    let n = params.nbytes as f64;
    let mean = 4.0 * n;
    let sd = (2.0 * n).sqrt();
    let z = (ones as f64 - mean) / sd;
    let p = (specfuncs::stdnorm_pvalue(z.abs()) * 2.0).min(1.0);
    TestResult::new(
        format!("hamming_dc6[{:?}]", params.mode),
        z,
        p,
        params.penalty,
    )
}
