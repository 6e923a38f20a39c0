// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Linear complexity via Berlekamp-Massey (`linearcomp`).
//!
//! The Berlekamp-Massey recurrence itself has no direct counterpart in
//! the teacher crate; it is implemented straight from the canonical
//! reference (Massey, "Shift-register synthesis and BCH decoding",
//! IEEE Trans. Inf. Theory 15(1), 1969) over GF(2), using the same
//! plain-function module shape as `specfuncs`.

use crate::error::BatteryError;
use crate::generator::{Generator, Width};
use crate::result::TestResult;
use crate::specfuncs;

/// Symbolic bit position, resolved against the generator's native width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitPos {
    Low,
    Mid,
    High,
    Absolute(u32),
}

impl BitPos {
    fn resolve(self, width: Width) -> u32 {
        let w = width.bits();
        match self {
            BitPos::Low => 0,
            BitPos::Mid => w / 2 - 1,
            BitPos::High => w - 1,
            BitPos::Absolute(bit) => bit.min(w - 1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LinearCompParams {
    pub nbits: usize,
    pub bitpos: BitPos,
    pub penalty: u32,
}

impl LinearCompParams {
    pub fn validate(&self) -> Result<(), BatteryError> {
        if self.nbits < 2 {
            return Err(BatteryError::config("nbits must be >= 2"));
        }
        Ok(())
    }
}

/// Berlekamp-Massey linear complexity of a GF(2) bit sequence.
fn berlekamp_massey(bits: &[u8]) -> usize {
    let n = bits.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l = 0usize;
    let mut m = 1isize;

    for i in 0..n {
        let mut d = bits[i];
        for j in 1..=l {
            d ^= c[j] & bits[i - j];
        }
        if d == 0 {
            m += 1;
        } else if 2 * l <= i {
            let t = c.clone();
            let shift = (i as isize - m + 1) as usize;
            for (j, &bj) in b.iter().enumerate() {
                if shift + j <= n {
                    c[shift + j] ^= bj;
                }
            }
            l = i + 1 - l;
            b = t;
            m = 1;
        } else {
            let shift = (i as isize - m + 1) as usize;
            for (j, &bj) in b.iter().enumerate() {
                if shift + j <= n {
                    c[shift + j] ^= bj;
                }
            }
            m += 1;
        }
    }
    l
}

/// `linearcomp`: extracts one bit per draw at `bitpos`, runs
/// Berlekamp-Massey over the resulting sequence, and scores the
/// complexity deviation `T` against the discrete linear-complexity
/// distribution.
pub fn linearcomp(gen: &mut dyn Generator, params: &LinearCompParams) -> TestResult {
    let bit = params.bitpos.resolve(gen.width());
    let mut bits = Vec::with_capacity(params.nbits);
    for _ in 0..params.nbits {
        bits.push(((gen.draw() >> bit) & 1) as u8);
    }
    let l = berlekamp_massey(&bits);
    let n = params.nbits;
    let t = if n % 2 == 0 {
        l as f64 - n as f64 / 2.0
    } else {
        (n as f64 + 1.0) / 2.0 - l as f64
    };
    let p = specfuncs::linearcomp_tccdf(t);
    TestResult::new(
        format!("linearcomp[bit={bit}]"),
        l as f64,
        p,
        params.penalty,
    )
}
