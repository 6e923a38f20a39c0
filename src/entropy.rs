// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Seed source supplying 32-bit, 64-bit, and arbitrary-length seed draws.
//!
//! The default implementation blends an OS random source with a
//! wall-clock nanosecond fallback and a per-thread counter, so that even
//! without OS randomness available two calls never repeat within a
//! process. Deterministic mode accepts a fixed 128-bit seed and expands it
//! with a SplitMix64-style mixer, grounded in the seed-expansion helper
//! `flyingrobots-echo-math`'s `Prng::from_seed_u64` uses for the same
//! purpose.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// The seed-supplying surface consumed by generator factories.
pub trait SeedSource {
    fn get_seed32(&mut self) -> u32;
    fn get_seed64(&mut self) -> u64;
    fn get_seed_bytes(&mut self, n: usize) -> Vec<u8>;
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

static THREAD_COUNTER: AtomicU64 = AtomicU64::new(0);

fn wallclock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Default entropy source: OS randomness blended with a nanosecond
/// timestamp and a monotonically increasing per-thread counter, so the
/// stream cannot repeat across workers even if the OS source is weak.
pub struct Entropy {
    mix: u64,
}

impl Default for Entropy {
    fn default() -> Self {
        let counter = THREAD_COUNTER.fetch_add(1, Ordering::Relaxed);
        let os_word = rand::rng().next_u64();
        let mix = os_word ^ wallclock_nanos() ^ counter.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Entropy { mix }
    }
}

impl SeedSource for Entropy {
    fn get_seed32(&mut self) -> u32 {
        self.get_seed64() as u32
    }

    fn get_seed64(&mut self) -> u64 {
        splitmix64(&mut self.mix)
    }

    fn get_seed_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            out.extend_from_slice(&self.get_seed64().to_le_bytes());
        }
        out.truncate(n);
        out
    }
}

/// Deterministic entropy source: a fixed 128-bit seed expanded with a
/// SplitMix64-style mixer. Two `DeterministicEntropy` instances built from
/// the same seed produce bit-identical draw sequences.
pub struct DeterministicEntropy {
    state: u64,
}

impl DeterministicEntropy {
    pub fn new(seed: u128) -> Self {
        let hi = (seed >> 64) as u64;
        let lo = seed as u64;
        let mut state = hi ^ lo.rotate_left(32);
        if state == 0 {
            state = 0x9E37_79B9_7F4A_7C15;
        }
        DeterministicEntropy { state }
    }
}

impl SeedSource for DeterministicEntropy {
    fn get_seed32(&mut self) -> u32 {
        self.get_seed64() as u32
    }

    fn get_seed64(&mut self) -> u64 {
        splitmix64(&mut self.state)
    }

    fn get_seed_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            out.extend_from_slice(&self.get_seed64().to_le_bytes());
        }
        out.truncate(n);
        out
    }
}
