// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Parallel dispatcher: assigns a [`Battery`]'s tests to a pool of OS
//! worker threads, longest-first, and accumulates results into a
//! [`Report`]. Generalises the teacher's single-threaded, hardcoded
//! `rng_testing::test_suite_with_seeds` loop into a data-driven,
//! multi-worker scheduler per the spec's concurrency model: plain OS
//! threads, no async runtime, one `Generator` owned exclusively by the
//! thread that created it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::battery::{Battery, TestDescriptor};
use crate::entropy::{DeterministicEntropy, Entropy, SeedSource};
use crate::error::{BatteryError, Result};
use crate::generator::GeneratorDescriptor;
use crate::result::{Report, ResultSink, TestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Brief,
    Full,
}

/// Options controlling one `run_battery` invocation.
#[derive(Clone)]
pub struct RunOptions {
    /// Worker thread count. `0` resolves to `max(1, cores - 1)`, the
    /// policy the teacher's own build scripts assume for CPU-bound work.
    pub threads: u32,
    /// Deterministic seed; when set, every test's `GeneratorState` is
    /// derived from it via a per-test offset so re-running with the same
    /// seed and `threads = 1` is bit-reproducible.
    pub seed: Option<u128>,
    pub report_mode: ReportMode,
    pub test_filter: Option<HashSet<String>>,
    /// Per-test wall-clock cap. `None` disables the watchdog.
    pub per_test_timeout: Option<Duration>,
    /// Fraction of total system RAM the scheduler refuses to exceed when
    /// admitting a new test with a nonzero `estimated_peak_bytes`.
    pub memory_ceiling_fraction: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            threads: 0,
            seed: None,
            report_mode: ReportMode::Brief,
            test_filter: None,
            per_test_timeout: None,
            memory_ceiling_fraction: 0.75,
        }
    }
}

fn default_thread_count() -> u32 {
    thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Best-effort estimate of total addressable system RAM in bytes. No
/// portable stdlib API exists for this, so the estimate defaults to a
/// conservative 8 GiB floor when it cannot be determined; callers with
/// stricter requirements should set `memory_ceiling_fraction` accordingly
/// or supply an explicit ceiling out-of-band.
fn estimated_system_memory_bytes() -> u64 {
    8 * 1024 * 1024 * 1024
}

struct Watchdog {
    done: Arc<Mutex<bool>>,
}

impl Watchdog {
    fn arm(timeout: Duration) -> (Self, mpsc::Receiver<()>) {
        let done = Arc::new(Mutex::new(false));
        let done_clone = Arc::clone(&done);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            thread::sleep(timeout);
            if !*done_clone.lock().unwrap() {
                let _ = tx.send(());
            }
        });
        (Watchdog { done }, rx)
    }

    fn disarm(self) {
        *self.done.lock().unwrap() = true;
    }
}

/// Runs `battery` against `descriptor`, returning the finalized
/// [`Report`]. Bubbles [`BatteryError::GeneratorSelfTestFailed`] if the
/// descriptor's self-test fails; every other error kind is captured into
/// individual `TestResult`s per the spec's "the core never panics on
/// statistical extremes" rule.
pub fn run_battery(
    battery: &Battery,
    descriptor: &GeneratorDescriptor,
    options: &RunOptions,
) -> Result<Report> {
    if let Some(self_test) = &descriptor.self_test {
        let mut probe = descriptor.create(options.seed.map(|s| s as u64).unwrap_or(0));
        if !self_test(probe.as_mut()) {
            return Err(BatteryError::GeneratorSelfTestFailed {
                generator: descriptor.name.clone(),
            });
        }
        info!(generator = %descriptor.name, "self-test passed");
    }

    let mut selected: Vec<TestDescriptor> = battery
        .tests
        .iter()
        .filter(|t| {
            options
                .test_filter
                .as_ref()
                .is_none_or(|f| f.contains(&t.name))
        })
        .cloned()
        .collect();
    // Config errors surface immediately and abort the run before any
    // worker is spawned, per the spec's error-propagation rule.
    for test in &selected {
        test.validate(descriptor.width)?;
    }
    // Longest-first: workers dequeue the most expensive remaining test
    // first so no worker idles while a single huge test finishes late.
    selected.sort_by(|a, b| b.relative_cost_units.cmp(&a.relative_cost_units));

    let nthreads = if options.threads > 0 {
        options.threads
    } else {
        default_thread_count()
    };

    let sink = Arc::new(ResultSink::new());
    let memory_ceiling = (estimated_system_memory_bytes() as f64 * options.memory_ceiling_fraction) as u64;
    // Tests whose own estimated peak allocation exceeds the ceiling can
    // never be admitted regardless of what else is in flight; record them
    // as inconclusive up front instead of leaving them stuck in the queue.
    let (unschedulable, schedulable): (Vec<_>, Vec<_>) = selected
        .into_iter()
        .partition(|t| t.estimated_peak_bytes > memory_ceiling);
    for test in unschedulable {
        warn!(
            test = %test.name,
            estimated_peak_bytes = test.estimated_peak_bytes,
            memory_ceiling,
            "test exceeds memory ceiling, marking inconclusive"
        );
        sink.submit(TestResult::inconclusive(
            test.name,
            0,
            "exceeds memory ceiling",
        ));
    }

    let queue = Arc::new(Mutex::new(VecDeque::from(schedulable)));
    let memory_in_use = Arc::new(AtomicU64::new(0));
    let seed_counter = Arc::new(AtomicU64::new(0));
    let base_seed = options.seed;
    let timeout = options.per_test_timeout;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(nthreads as usize);
        for worker_id in 0..nthreads {
            let queue = Arc::clone(&queue);
            let sink = Arc::clone(&sink);
            let memory_in_use = Arc::clone(&memory_in_use);
            let seed_counter = Arc::clone(&seed_counter);
            let descriptor = descriptor.clone();
            handles.push(scope.spawn(move || {
                worker_loop(
                    worker_id,
                    &queue,
                    &sink,
                    &descriptor,
                    &memory_in_use,
                    memory_ceiling,
                    &seed_counter,
                    base_seed,
                    timeout,
                );
            }));
        }
        for h in handles {
            let _ = h.join();
        }
    });

    Ok(sink.finalize())
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: u32,
    queue: &Mutex<VecDeque<TestDescriptor>>,
    sink: &ResultSink,
    descriptor: &GeneratorDescriptor,
    memory_in_use: &AtomicU64,
    memory_ceiling: u64,
    seed_counter: &AtomicU64,
    base_seed: Option<u128>,
    timeout: Option<Duration>,
) {
    loop {
        let next = {
            let mut q = queue.lock().unwrap();
            // Admission control: skip (requeue at the back) any test
            // whose estimated peak allocation would blow the ceiling
            // given what is currently in flight, so another worker gets
            // a chance to drain smaller work first.
            let pos = q.iter().position(|t| {
                memory_in_use.load(Ordering::Relaxed) + t.estimated_peak_bytes <= memory_ceiling
            });
            match pos {
                Some(i) => q.remove(i),
                None => None,
            }
        };
        let Some(test) = next else {
            break;
        };

        memory_in_use.fetch_add(test.estimated_peak_bytes, Ordering::Relaxed);
        let offset = seed_counter.fetch_add(1, Ordering::Relaxed);
        let seed64 = match base_seed {
            Some(seed) => {
                let mut d = DeterministicEntropy::new(seed ^ (offset as u128));
                d.get_seed64()
            }
            None => Entropy::default().get_seed64(),
        };

        debug!(worker = worker_id, test = %test.name, "starting test");
        let started = Instant::now();
        let result = run_one_test(descriptor, &test, seed64, timeout);
        debug!(worker = worker_id, test = %test.name, elapsed = ?started.elapsed(), "finished test");
        memory_in_use.fetch_sub(test.estimated_peak_bytes, Ordering::Relaxed);
        sink.submit(result);
    }
}

fn run_one_test(
    descriptor: &GeneratorDescriptor,
    test: &TestDescriptor,
    seed64: u64,
    timeout: Option<Duration>,
) -> TestResult {
    let Some(timeout) = timeout else {
        let mut gen = descriptor.create(seed64);
        return test.run(gen.as_mut());
    };

    let (watchdog, rx) = Watchdog::arm(timeout);
    let (tx, result_rx) = mpsc::channel();
    let descriptor = descriptor.clone();
    let test = test.clone();
    thread::spawn(move || {
        let mut gen = descriptor.create(seed64);
        let result = test.run(gen.as_mut());
        let _ = tx.send(result);
    });

    match result_rx.recv_timeout(timeout) {
        Ok(result) => {
            watchdog.disarm();
            result
        }
        Err(_) => {
            let _ = rx.try_recv();
            warn!(test = %test.name, "test exceeded its wall-clock budget");
            TestResult::inconclusive(test.name.clone(), 0, "timed out")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::{Battery, BatteryBuilder, VerdictPolicy};
    use crate::checks::frequency;
    use crate::generator::Width;

    fn chacha_descriptor() -> GeneratorDescriptor {
        GeneratorDescriptor::new("chacha_oracle", Width::W64, |seed| {
            Box::new(crate::fixtures::RngCoreGenerator::chacha_oracle(seed))
        })
    }

    #[test]
    fn run_battery_collects_all_results() {
        let battery = BatteryBuilder::new("t")
            .push(crate::battery::TestDescriptor::new("monobit", 1, |g| {
                frequency::monobit(g, 4096, 1)
            }))
            .push(crate::battery::TestDescriptor::new("byte_frequency", 2, |g| {
                frequency::byte_frequency(g, 4096, 1)
            }))
            .build();
        let options = RunOptions {
            threads: 2,
            seed: Some(42),
            ..RunOptions::default()
        };
        let report = run_battery(&battery, &chacha_descriptor(), &options).unwrap();
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn run_battery_respects_test_filter() {
        let battery = Battery::standard(crate::battery::Tier::Brief);
        let mut filter = HashSet::new();
        filter.insert("monobit".to_string());
        let options = RunOptions {
            threads: 1,
            seed: Some(1),
            test_filter: Some(filter),
            ..RunOptions::default()
        };
        let report = run_battery(&battery, &chacha_descriptor(), &options).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "monobit");
    }

    #[test]
    fn run_battery_fails_self_test() {
        let battery = BatteryBuilder::new("t")
            .push(crate::battery::TestDescriptor::new("monobit", 1, |g| {
                frequency::monobit(g, 64, 1)
            }))
            .verdict_policy(VerdictPolicy::default())
            .build();
        let descriptor = GeneratorDescriptor::new("broken", Width::W64, |seed| {
            Box::new(crate::fixtures::RngCoreGenerator::chacha_oracle(seed))
        })
        .with_self_test(|_| false);
        let options = RunOptions::default();
        let err = run_battery(&battery, &descriptor, &options).unwrap_err();
        matches!(err, BatteryError::GeneratorSelfTestFailed { .. });
    }

    #[test]
    fn deterministic_seed_reproduces_same_test_count_single_threaded() {
        let battery = Battery::standard(crate::battery::Tier::Brief);
        let options = RunOptions {
            threads: 1,
            seed: Some(7),
            ..RunOptions::default()
        };
        let a = run_battery(&battery, &chacha_descriptor(), &options).unwrap();
        let b = run_battery(&battery, &chacha_descriptor(), &options).unwrap();
        assert_eq!(a.results.len(), b.results.len());
    }

    #[test]
    fn run_battery_marks_over_ceiling_test_inconclusive_instead_of_dropping_it() {
        let battery = BatteryBuilder::new("t")
            .push(
                crate::battery::TestDescriptor::new("monobit", 1, |g| {
                    frequency::monobit(g, 64, 1)
                })
                .with_estimated_peak_bytes(u64::MAX),
            )
            .build();
        let options = RunOptions {
            threads: 1,
            seed: Some(1),
            memory_ceiling_fraction: 0.75,
            ..RunOptions::default()
        };
        let report = run_battery(&battery, &chacha_descriptor(), &options).unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(matches!(report.results[0].outcome, crate::result::Outcome::Inconclusive(_)));
        assert!(report.results[0].p.is_nan());
    }

    #[test]
    fn run_battery_aborts_on_invalid_test_configuration() {
        use crate::checks::birthday;
        use crate::checks::common::KeyParams;

        let bad_params = birthday::BspaceNdParams {
            key: KeyParams {
                nbits_per_dim: 40,
                ndims: 2,
                use_low_bits: true,
            },
            nsamples: 1,
            penalty: 4,
        };
        let battery = BatteryBuilder::new("t")
            .push(
                crate::battery::TestDescriptor::new("bspace_nd_bad", 1, move |g| {
                    birthday::bspace_nd(g, &bad_params)
                })
                .with_validate(move |_w| bad_params.validate()),
            )
            .build();
        let options = RunOptions::default();
        let err = run_battery(&battery, &chacha_descriptor(), &options).unwrap_err();
        assert!(matches!(err, BatteryError::Config(_)));
    }
}
