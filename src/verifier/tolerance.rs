//! Comparison tolerances for answer tests.
//!
//! Aggregate statistics (`min`, `max`, `mean`, `std_dev`) are compared to a
//! number of decimal digits that depends on build precision. Anything else
//! is a location coordinate and must match exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AnswersConfig, Precision, split_key};

/// Statistics compared with decimal tolerance.
pub const AGGREGATE_STATISTICS: [&str; 4] = ["min", "max", "mean", "std_dev"];

/// Required agreement between an actual and expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decimals {
    /// Equal values (or both NaN)
    Exact,
    /// `|actual/expected - 1| < 1.5 * 10^-n`
    Digits(u32),
}

/// Outcome of comparing one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Check {
    pub passed: bool,
    /// Relative deviation for decimal checks, absolute deviation for exact ones
    pub deviation: f64,
}

impl Decimals {
    /// Largest deviation that still passes.
    pub fn threshold(self) -> f64 {
        match self {
            Self::Exact => 0.0,
            Self::Digits(n) => 1.5 * 10f64.powi(-(n as i32)),
        }
    }

    pub fn check(self, actual: f64, expected: f64) -> Check {
        if actual.is_nan() || expected.is_nan() {
            let both = actual.is_nan() && expected.is_nan();
            return Check {
                passed: both,
                deviation: if both { 0.0 } else { f64::NAN },
            };
        }

        match self {
            Self::Exact => Check {
                passed: actual == expected,
                deviation: if actual == expected {
                    0.0
                } else {
                    (actual - expected).abs()
                },
            },
            Self::Digits(_) => {
                let deviation = if actual == expected {
                    0.0
                } else if expected == 0.0 {
                    actual.abs()
                } else {
                    (actual / expected - 1.0).abs()
                };
                Check {
                    passed: deviation < self.threshold(),
                    deviation,
                }
            }
        }
    }
}

impl fmt::Display for Decimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Digits(n) => write!(f, "{n} decimals"),
        }
    }
}

/// Decimal tolerance per precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TolerancePolicy {
    pub precision: Precision,
    pub single_decimals: u32,
    pub double_decimals: u32,
}

impl TolerancePolicy {
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            single_decimals: 6,
            double_decimals: 14,
        }
    }

    pub fn from_config(precision: Precision, answers: &AnswersConfig) -> Self {
        Self {
            precision,
            single_decimals: answers.single_decimals,
            double_decimals: answers.double_decimals,
        }
    }

    /// Tolerance for a `"<field>:<statistic>"` record key.
    pub fn decimals_for(&self, key: &str) -> Decimals {
        let (_, statistic) = split_key(key);
        if !AGGREGATE_STATISTICS.contains(&statistic) {
            return Decimals::Exact;
        }
        match self.precision {
            Precision::Single => Decimals::Digits(self.single_decimals),
            Precision::Double => Decimals::Digits(self.double_decimals),
        }
    }
}
