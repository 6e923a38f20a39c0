// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error kinds recognised by the core.
//!
//! `ConfigError` and `GeneratorSelfTestFailed` are the only two kinds that
//! bubble to the caller as `Err`; `OutOfMemory`, `InconclusiveTest`, and
//! `StatisticalFailure` are captured into [`crate::result::TestResult`]
//! data instead, per the spec's "the core never panics on statistical
//! extremes" rule. Modelled as a `thiserror`-derived enum, the nearest
//! idiomatic-error-typing example in the retrieval pack being
//! `wallstop-fortress-rollback`'s error enums (the teacher itself has no
//! error type at all, since it only prints results to stdout).

use thiserror::Error;

/// Fatal errors that abort a battery run before or during dispatch.
#[derive(Debug, Error)]
pub enum BatteryError {
    /// Invalid test or battery parameters, e.g. `nbits_per_dim * ndims > 64`.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A generator descriptor's self-test returned `false`.
    #[error("generator `{generator}` failed its self-test")]
    GeneratorSelfTestFailed { generator: String },
}

impl BatteryError {
    pub fn config(msg: impl Into<String>) -> Self {
        BatteryError::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BatteryError>;
