//! Baseline comparison and reporting.
//!
//! Every key in either the computed record or the baseline yields one
//! `Comparison`; a key present on only one side fails.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::tolerance::{Decimals, TolerancePolicy};
use crate::models::{StatisticRecord, split_key};

/// Result of comparing one `"<field>:<statistic>"` entry.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub key: String,
    /// Baseline value, `None` when the baseline lacks the key
    pub expected: Option<f64>,
    /// Computed value, `None` when the output lacks the key
    pub actual: Option<f64>,
    pub decimals: Decimals,
    pub deviation: f64,
    pub passed: bool,
}

impl Comparison {
    pub fn field(&self) -> &str {
        split_key(&self.key).0
    }

    pub fn statistic(&self) -> &str {
        split_key(&self.key).1
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = if self.passed { "✓" } else { "✗" };
        match (self.expected, self.actual) {
            (Some(expected), Some(actual)) => write!(
                f,
                "{icon} {:<40} expected={expected:<24e} actual={actual:<24e} deviation={:.3e} ({})",
                self.key, self.deviation, self.decimals
            ),
            (None, Some(actual)) => {
                write!(f, "{icon} {:<40} not in baseline (actual={actual:e})", self.key)
            }
            (Some(expected), None) => {
                write!(f, "{icon} {:<40} missing from output (expected={expected:e})", self.key)
            }
            (None, None) => write!(f, "{icon} {:<40} absent", self.key),
        }
    }
}

/// All comparisons for one answer test.
#[derive(Debug, Clone, Serialize)]
#[must_use]
pub struct VerificationReport {
    pub test: String,
    pub comparisons: Vec<Comparison>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.comparisons.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.comparisons.iter().filter(|c| c.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.comparisons.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.iter().filter(|c| !c.passed)
    }

    /// Summary line followed by each failing comparison.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {}/{} statistics match",
            self.test,
            self.passed_count(),
            self.total_count()
        );
        for failure in self.failures() {
            out.push('\n');
            out.push_str(&format!("  {failure}"));
        }
        out
    }
}

/// Compare computed statistics against a baseline.
pub fn compare(
    test: &str,
    actual: &StatisticRecord,
    expected: &StatisticRecord,
    policy: &TolerancePolicy,
) -> VerificationReport {
    let keys: BTreeSet<&String> = actual.keys().chain(expected.keys()).collect();

    let comparisons = keys
        .into_iter()
        .map(|key| {
            let decimals = policy.decimals_for(key);
            let a = actual.get(key).copied();
            let e = expected.get(key).copied();
            let (passed, deviation) = match (a, e) {
                (Some(a), Some(e)) => {
                    let check = decimals.check(a, e);
                    (check.passed, check.deviation)
                }
                _ => (false, f64::NAN),
            };
            Comparison {
                key: key.clone(),
                expected: e,
                actual: a,
                decimals,
                deviation,
                passed,
            }
        })
        .collect();

    VerificationReport {
        test: test.to_string(),
        comparisons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Precision;

    fn record(entries: &[(&str, f64)]) -> StatisticRecord {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn identical_records_pass() {
        let r = record(&[("density:mean", 1.0), ("density:min_xloc", 0.25)]);
        let report = compare("t", &r, &r, &TolerancePolicy::new(Precision::Double));
        assert!(report.passed());
        assert_eq!(report.passed_count(), 2);
    }

    #[test]
    fn mismatch_reports_field_statistic_and_deviation() {
        let actual = record(&[("density:mean", 1.000000000001)]);
        let expected = record(&[("density:mean", 1.0)]);

        let report = compare("t", &actual, &expected, &TolerancePolicy::new(Precision::Double));
        assert!(!report.passed());

        let failure = report.failures().next().unwrap();
        assert_eq!(failure.field(), "density");
        assert_eq!(failure.statistic(), "mean");
        assert_eq!(failure.expected, Some(1.0));
        assert_eq!(failure.actual, Some(1.000000000001));
        assert!(failure.deviation > 1e-13 && failure.deviation < 1e-11);
        assert!(report.summary().contains("density:mean"));

        let report = compare("t", &actual, &expected, &TolerancePolicy::new(Precision::Single));
        assert!(report.passed());
    }

    #[test]
    fn location_shift_fails_even_in_single_precision() {
        let actual = record(&[("density:max_xloc", 0.5000001)]);
        let expected = record(&[("density:max_xloc", 0.5)]);
        let report = compare("t", &actual, &expected, &TolerancePolicy::new(Precision::Single));
        assert!(!report.passed());
    }

    #[test]
    fn one_sided_keys_fail() {
        let actual = record(&[("density:mean", 1.0), ("velocity_x:mean", 0.0)]);
        let expected = record(&[("density:mean", 1.0), ("energy:mean", 2.0)]);

        let report = compare("t", &actual, &expected, &TolerancePolicy::new(Precision::Single));
        assert_eq!(report.total_count(), 3);

        let failed: Vec<_> = report.failures().map(|c| c.key.as_str()).collect();
        assert_eq!(failed, ["energy:mean", "velocity_x:mean"]);
        let summary = report.summary();
        assert!(summary.contains("missing from output"));
        assert!(summary.contains("not in baseline"));
    }
}
