// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Result accumulation and report rendering.

use std::sync::Mutex;

/// Why a test did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Inconclusive(String),
}

/// One statistical test's verdict.
///
/// Invariants: `p + alpha ~= 1` (up to rounding) when both are finite;
/// each lies in `[0, 1]` or is `NaN` if the test was inapplicable.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub statistic: f64,
    pub p: f64,
    pub alpha: f64,
    pub penalty: u32,
    pub outcome: Outcome,
}

impl TestResult {
    pub fn new(name: impl Into<String>, statistic: f64, p: f64, penalty: u32) -> Self {
        TestResult {
            name: name.into(),
            statistic,
            p,
            alpha: 1.0 - p,
            penalty,
            outcome: Outcome::Completed,
        }
    }

    pub fn inconclusive(name: impl Into<String>, penalty: u32, reason: impl Into<String>) -> Self {
        TestResult {
            name: name.into(),
            statistic: f64::NAN,
            p: f64::NAN,
            alpha: f64::NAN,
            penalty,
            outcome: Outcome::Inconclusive(reason.into()),
        }
    }

    /// Unambiguous failure: either side of the threshold is beyond 1e-10.
    pub fn is_unambiguous_failure(&self) -> bool {
        self.p < 1e-10 || self.alpha < 1e-10
    }

    /// Suspicious but not fatal on its own.
    pub fn is_suspicious(&self) -> bool {
        !self.is_unambiguous_failure() && (self.p < 1e-4 || self.alpha < 1e-4)
    }

    /// Formats the p-value per the battery's display rules:
    /// `NAN` if either side is NaN, `???` if out of range, `0` below
    /// `f64::MIN_POSITIVE`, three-decimal form inside `[1e-3, 0.999]`,
    /// scientific notation for smaller values, and a `1 - %.2e` form when
    /// `p > 0.999` and the complementary value is available.
    pub fn format_p(&self) -> String {
        format_p_value(self.p, Some(self.alpha))
    }
}

/// Formats a p-value (optionally with its known complement) per the
/// battery's display rules.
pub fn format_p_value(p: f64, complement: Option<f64>) -> String {
    if p.is_nan() || complement.is_some_and(f64::is_nan) {
        return "NAN".to_string();
    }
    if !(0.0..=1.0).contains(&p) {
        return "???".to_string();
    }
    if p < f64::MIN_POSITIVE {
        return "0".to_string();
    }
    if p > 0.999 {
        return match complement {
            Some(alpha) if alpha > 0.0 => format!("1 - {:.2e}", alpha),
            _ => "1".to_string(),
        };
    }
    if p >= 1e-3 {
        format!("{:.3}", p)
    } else {
        format!("{:.2e}", p)
    }
}

/// Concurrent append-only log of [`TestResult`]s.
#[derive(Default)]
pub struct ResultSink {
    results: Mutex<Vec<TestResult>>,
}

impl ResultSink {
    pub fn new() -> Self {
        ResultSink::default()
    }

    pub fn submit(&self, result: TestResult) {
        self.results.lock().unwrap().push(result);
    }

    /// Finalise into a [`Report`], ordering by the order tests were
    /// submitted (the caller re-orders by battery descriptor order if a
    /// specific presentation order is required).
    pub fn finalize(&self) -> Report {
        let results = self.results.lock().unwrap().clone();
        Report::new(results)
    }
}

/// A finished battery run: all [`TestResult`]s plus the aggregate verdict.
#[derive(Debug, Clone)]
pub struct Report {
    pub results: Vec<TestResult>,
}

impl Report {
    pub fn new(results: Vec<TestResult>) -> Self {
        Report { results }
    }

    /// Sum of `penalty * weight` across all results, weight 1.0 for
    /// unambiguous failures, 0.1 for suspicious ones.
    pub fn failed_score(&self) -> f64 {
        self.results
            .iter()
            .map(|r| {
                if r.is_unambiguous_failure() {
                    r.penalty as f64
                } else if r.is_suspicious() {
                    r.penalty as f64 * 0.1
                } else {
                    0.0
                }
            })
            .sum()
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| !r.is_unambiguous_failure())
    }

    /// One line per test: name, statistic, formatted p-value.
    pub fn render_brief(&self) -> String {
        let mut out = String::new();
        for (i, r) in self.results.iter().enumerate() {
            out.push_str(&format!(
                "{:>3}  {:<16} x={:<14.6} p={}\n",
                i + 1,
                r.name,
                r.statistic,
                r.format_p()
            ));
        }
        out
    }

    /// Full rendering: adds pass/fail decision and inconclusive reasons.
    pub fn render_full(&self) -> String {
        let mut out = String::new();
        for (i, r) in self.results.iter().enumerate() {
            let verdict = match &r.outcome {
                Outcome::Inconclusive(reason) => format!("INCONCLUSIVE ({reason})"),
                Outcome::Completed if r.is_unambiguous_failure() => "FAILED".to_string(),
                Outcome::Completed if r.is_suspicious() => "SUSPICIOUS".to_string(),
                Outcome::Completed => "PASSED".to_string(),
            };
            out.push_str(&format!(
                "{:>3}  {:<16} x={:<14.6} p={:<12} alpha={:<12} penalty={:<4} {}\n",
                i + 1,
                r.name,
                r.statistic,
                r.format_p(),
                format_p_value(r.alpha, Some(r.p)),
                r.penalty,
                verdict
            ));
        }
        out.push_str(&format!(
            "\nOverall: {}  (failed score: {:.3})\n",
            if self.passed() { "PASSED" } else { "FAILED" },
            self.failed_score()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_p_value_rules() {
        assert_eq!(format_p_value(f64::NAN, Some(0.5)), "NAN");
        assert_eq!(format_p_value(1.5, Some(-0.5)), "???");
        assert_eq!(format_p_value(0.0, Some(1.0)), "0");
        assert_eq!(format_p_value(0.5, Some(0.5)), "0.500");
        assert_eq!(format_p_value(1e-6, Some(1.0)), "1.00e-6");
        assert_eq!(format_p_value(0.9999, Some(1e-4)), "1 - 1.00e-4");
    }

    #[test]
    fn unambiguous_and_suspicious_thresholds() {
        let fail = TestResult::new("t", 0.0, 1e-11, 1);
        assert!(fail.is_unambiguous_failure());
        let susp = TestResult::new("t", 0.0, 1e-5, 1);
        assert!(susp.is_suspicious());
        assert!(!susp.is_unambiguous_failure());
        let ok = TestResult::new("t", 0.0, 0.5, 1);
        assert!(!ok.is_unambiguous_failure() && !ok.is_suspicious());
    }

    #[test]
    fn result_sink_accumulates_concurrently() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(ResultSink::new());
        let mut handles = vec![];
        for i in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                sink.submit(TestResult::new(format!("t{i}"), 0.0, 0.5, 1));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let report = sink.finalize();
        assert_eq!(report.results.len(), 8);
    }

    #[test]
    fn failed_score_weighs_suspicious_at_tenth() {
        let sink = ResultSink::new();
        sink.submit(TestResult::new("a", 0.0, 1e-11, 4));
        sink.submit(TestResult::new("b", 0.0, 1e-5, 2));
        sink.submit(TestResult::new("c", 0.0, 0.5, 9));
        let report = sink.finalize();
        assert!((report.failed_score() - (4.0 + 0.2)).abs() < 1e-9);
        assert!(!report.passed());
    }
}
