// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! A statistical test battery for 32/64-bit pseudorandom number
//! generators.
//!
//! The engine is organised into five layers:
//!
//! - [`generator`]: the abstract PRNG interface ([`generator::Generator`])
//!   and its immutable factory metadata ([`generator::GeneratorDescriptor`]).
//! - [`checks`]: the individual statistical test algorithms.
//! - [`battery`]: named, ordered lists of tests ([`battery::Battery`]),
//!   including the three standard tiers ([`battery::Tier`]).
//! - [`scheduler`]: the OS-thread worker pool that dispatches a battery's
//!   tests against a generator and collects a [`result::Report`].
//! - [`specfuncs`]: the special-function library (log-gamma, incomplete
//!   gamma/beta, chi-square, Student's t, ...) every test's p-value
//!   computation is built on.
//!
//! ```no_run
//! use prng_battery::battery::{Battery, Tier};
//! use prng_battery::generator::{GeneratorDescriptor, Width};
//! use prng_battery::scheduler::{run_battery, RunOptions};
//!
//! # fn make_generator(seed: u64) -> Box<dyn prng_battery::generator::Generator> {
//! #     unimplemented!()
//! # }
//! let battery = Battery::standard(Tier::Default);
//! let descriptor = GeneratorDescriptor::new("my_generator", Width::W64, make_generator);
//! let report = run_battery(&battery, &descriptor, &RunOptions::default()).unwrap();
//! println!("{}", report.render_full());
//! ```

pub mod battery;
pub mod checks;
pub mod entropy;
pub mod error;
pub mod generator;
pub mod result;
pub mod scheduler;
pub mod specfuncs;

/// Reference and degenerate generators used only by `checks::*`'s own unit
/// tests. Not part of the public API.
#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{BatteryError, Result};
