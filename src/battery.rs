// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Battery: an ordered, immutable list of [`TestDescriptor`]s plus a
//! threshold policy, generalising the teacher's `main.rs`/`rng_testing.rs`
//! fixed run-lists (a hardcoded sequence of `run_test!` invocations per
//! RNG) into a reusable, named, data-driven descriptor list.

use std::sync::Arc;

use crate::checks::{birthday, collision, common::KeyParams, frequency, gap, hamming, linearcomp, matrixrank};
use crate::error::Result;
use crate::generator::{Generator, Width};
use crate::result::TestResult;

/// One runnable unit of work: a name, a relative cost used only for
/// scheduling order, and the closure that drives a freshly seeded
/// generator through one statistical test.
#[derive(Clone)]
pub struct TestDescriptor {
    pub name: String,
    pub relative_cost_units: u32,
    /// Best-effort estimate of this test's peak scratch allocation, used
    /// only by the scheduler's memory-ceiling check. `0` means
    /// "negligible", not "unknown".
    pub estimated_peak_bytes: u64,
    run: Arc<dyn Fn(&mut dyn Generator) -> TestResult + Send + Sync>,
    /// Validates the parameters this descriptor was built with against
    /// the generator's native width; `run_battery` calls this for every
    /// selected test before dispatching any of them, so a
    /// `BatteryError::Config` aborts the whole run rather than surfacing
    /// only inside a unit test.
    validate: Arc<dyn Fn(Width) -> Result<()> + Send + Sync>,
}

impl TestDescriptor {
    pub fn new(
        name: impl Into<String>,
        relative_cost_units: u32,
        run: impl Fn(&mut dyn Generator) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        TestDescriptor {
            name: name.into(),
            relative_cost_units,
            estimated_peak_bytes: 0,
            run: Arc::new(run),
            validate: Arc::new(|_width| Ok(())),
        }
    }

    pub fn with_estimated_peak_bytes(mut self, bytes: u64) -> Self {
        self.estimated_peak_bytes = bytes;
        self
    }

    /// Attaches the parameter validation this descriptor's test was
    /// constructed with. `width` is the generator's native width, needed
    /// by tests (e.g. `gap_test`) whose valid parameter range depends on it.
    pub fn with_validate(
        mut self,
        validate: impl Fn(Width) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Arc::new(validate);
        self
    }

    pub fn run(&self, gen: &mut dyn Generator) -> TestResult {
        (self.run)(gen)
    }

    pub fn validate(&self, width: Width) -> Result<()> {
        (self.validate)(width)
    }
}

impl std::fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("relative_cost_units", &self.relative_cost_units)
            .finish()
    }
}

/// Threshold policy applied on top of each individual `TestResult`'s own
/// unambiguous-failure/suspicious classification (see
/// [`crate::result::TestResult`]): a ceiling on the battery's aggregate
/// failed score.
#[derive(Debug, Clone, Copy)]
pub struct VerdictPolicy {
    pub max_failed_score: f64,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        VerdictPolicy {
            max_failed_score: 0.0,
        }
    }
}

/// Named, ordered, immutable list of tests.
#[derive(Debug, Clone)]
pub struct Battery {
    pub name: String,
    pub tests: Vec<TestDescriptor>,
    pub verdict_policy: VerdictPolicy,
}

impl Battery {
    pub fn evaluate(&self, report: &crate::result::Report) -> bool {
        report.passed() && report.failed_score() <= self.verdict_policy.max_failed_score
    }
}

/// Standard tiers, each a fixed ordered list of pre-tuned
/// [`TestDescriptor`]s. Tiers are supersets of one another where
/// practical but this is not a strict requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// ~1 minute: smoke-test parameterisations only.
    Brief,
    /// ~5 minutes: the battery's general-purpose default.
    Default,
    /// ~1 hour: adds the memory-intensive 64-bit birthday test and
    /// larger matrix-rank/linear-complexity runs.
    Full,
}

fn brief_tests() -> Vec<TestDescriptor> {
    vec![
        TestDescriptor::new("monobit", 1, |g| frequency::monobit(g, 1 << 16, 2)),
        TestDescriptor::new("byte_frequency", 1, |g| frequency::byte_frequency(g, 1 << 18, 2)),
        TestDescriptor::new("hamming_dc6", 1, |g| {
            hamming::hamming_dc6(
                g,
                &hamming::HammingParams {
                    mode: hamming::HammingMode::WholeBytes,
                    nbytes: 1 << 18,
                    penalty: 2,
                },
            )
        }),
        {
            let params = birthday::BspaceNdParams {
                key: KeyParams {
                    nbits_per_dim: 32,
                    ndims: 1,
                    use_low_bits: true,
                },
                nsamples: 32,
                penalty: 4,
            };
            TestDescriptor::new("bspace_nd_32", 3, move |g| birthday::bspace_nd(g, &params))
                .with_validate(move |_w| params.validate())
        },
        {
            let params = matrixrank::MatrixRankParams {
                n: 512,
                fill: matrixrank::FillWidth::Native,
                ntrials: 8,
                penalty: 3,
            };
            TestDescriptor::new("matrixrank_512", 5, move |g| matrixrank::matrixrank(g, &params))
                .with_validate(move |_w| params.validate())
        },
    ]
}

fn default_tests() -> Vec<TestDescriptor> {
    let mut tests = brief_tests();
    tests.extend(vec![
        TestDescriptor::new("freq16", 2, |g| frequency::freq16(g, 1 << 20, 2)),
        {
            let params = collision::CollisionParams {
                key: KeyParams {
                    nbits_per_dim: 20,
                    ndims: 1,
                    use_low_bits: true,
                },
                n: 1 << 14,
                nsamples: 8,
                penalty: 4,
            };
            TestDescriptor::new("collision_over_20", 4, move |g| {
                collision::collision_over(g, &params)
            })
            .with_validate(move |_w| params.validate())
        },
        {
            let params = gap::GapParams {
                shl: 10,
                ngaps: 100_000,
                penalty: 3,
            };
            TestDescriptor::new("gap_test_shl10", 6, move |g| gap::gap_test(g, &params))
                .with_validate(move |w| params.validate(w.bits()))
        },
        {
            let params = linearcomp::LinearCompParams {
                nbits: 20_000,
                bitpos: linearcomp::BitPos::Low,
                penalty: 3,
            };
            TestDescriptor::new("linearcomp_low", 5, move |g| linearcomp::linearcomp(g, &params))
                .with_validate(move |_w| params.validate())
        },
        {
            let params = matrixrank::MatrixRankParams {
                n: 4096,
                fill: matrixrank::FillWidth::Native,
                ntrials: 16,
                penalty: 3,
            };
            TestDescriptor::new("matrixrank_4096", 10, move |g| matrixrank::matrixrank(g, &params))
                .with_validate(move |_w| params.validate())
                .with_estimated_peak_bytes(4096 * 4096 / 8 * 16)
        },
    ]);
    tests
}

fn full_tests() -> Vec<TestDescriptor> {
    let mut tests = default_tests();
    tests.extend(vec![
        {
            let params = birthday::Bspace64Params {
                n_exponent: 22,
                nsamples: 8,
                penalty: 5,
            };
            TestDescriptor::new("bspace64_1d_ns", 40, move |g| {
                birthday::bspace64_1d_ns(g, &params)
            })
            .with_validate(move |_w| params.validate())
            .with_estimated_peak_bytes((1u64 << 22) * 8 * 8)
        },
        {
            let params = linearcomp::LinearCompParams {
                nbits: 200_000,
                bitpos: linearcomp::BitPos::High,
                penalty: 3,
            };
            TestDescriptor::new("linearcomp_high", 20, move |g| {
                linearcomp::linearcomp(g, &params)
            })
            .with_validate(move |_w| params.validate())
        },
        {
            let params = matrixrank::MatrixRankParams {
                n: 8192,
                fill: matrixrank::FillWidth::Low8,
                ntrials: 16,
                penalty: 3,
            };
            TestDescriptor::new("matrixrank_8192_low8", 30, move |g| {
                matrixrank::matrixrank(g, &params)
            })
            .with_validate(move |_w| params.validate())
            .with_estimated_peak_bytes(8192 * 8192 / 8 * 16)
        },
    ]);
    tests
}

impl Battery {
    pub fn standard(tier: Tier) -> Self {
        let (name, tests) = match tier {
            Tier::Brief => ("brief", brief_tests()),
            Tier::Default => ("default", default_tests()),
            Tier::Full => ("full", full_tests()),
        };
        Battery {
            name: name.to_string(),
            tests,
            verdict_policy: VerdictPolicy::default(),
        }
    }
}

/// Builder for ad-hoc batteries, e.g. a subset selected by the caller's
/// `test_filter`.
pub struct BatteryBuilder {
    name: String,
    tests: Vec<TestDescriptor>,
    verdict_policy: VerdictPolicy,
}

impl BatteryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        BatteryBuilder {
            name: name.into(),
            tests: Vec::new(),
            verdict_policy: VerdictPolicy::default(),
        }
    }

    pub fn push(mut self, descriptor: TestDescriptor) -> Self {
        self.tests.push(descriptor);
        self
    }

    pub fn verdict_policy(mut self, policy: VerdictPolicy) -> Self {
        self.verdict_policy = policy;
        self
    }

    pub fn build(self) -> Battery {
        Battery {
            name: self.name,
            tests: self.tests,
            verdict_policy: self.verdict_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brief_tier_has_tests() {
        let b = Battery::standard(Tier::Brief);
        assert!(!b.tests.is_empty());
    }

    #[test]
    fn default_tier_is_superset_of_brief_by_count() {
        let brief = Battery::standard(Tier::Brief);
        let default = Battery::standard(Tier::Default);
        assert!(default.tests.len() > brief.tests.len());
    }

    #[test]
    fn full_tier_is_superset_of_default_by_count() {
        let default = Battery::standard(Tier::Default);
        let full = Battery::standard(Tier::Full);
        assert!(full.tests.len() > default.tests.len());
    }

    #[test]
    fn builder_produces_custom_battery() {
        let b = BatteryBuilder::new("custom")
            .push(TestDescriptor::new("monobit", 1, |g| {
                frequency::monobit(g, 1024, 1)
            }))
            .build();
        assert_eq!(b.tests.len(), 1);
        assert_eq!(b.name, "custom");
    }

    #[test]
    fn standard_tiers_validate_against_both_widths() {
        for tier in [Tier::Brief, Tier::Default, Tier::Full] {
            let battery = Battery::standard(tier);
            for width in [Width::W32, Width::W64] {
                for test in &battery.tests {
                    assert!(
                        test.validate(width).is_ok(),
                        "tier {tier:?} test {} failed to validate for {width:?}",
                        test.name
                    );
                }
            }
        }
    }
}
