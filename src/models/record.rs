//! Statistic records and recorded baselines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Precision;

/// Flat mapping of `"<field>:<statistic>"` to value.
pub type StatisticRecord = BTreeMap<String, f64>;

/// Build the record key for a field/statistic pair.
pub fn record_key(field: &str, statistic: &str) -> String {
    format!("{field}:{statistic}")
}

/// Split a record key into its field and statistic parts.
///
/// The statistic is the last `:`-separated segment.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once(':') {
        Some((field, stat)) => (field, stat),
        None => ("", key),
    }
}

/// A recorded set of expected statistics for one answer test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    /// Answer test name
    pub test: String,

    /// Precision of the build that produced the values
    pub precision: Precision,

    /// When the baseline was recorded
    pub recorded_at: DateTime<Utc>,

    /// Identifier of the verification run that recorded it
    pub run_id: Uuid,

    /// Expected values; non-finite values are stored as null
    #[serde(
        serialize_with = "serialize_record",
        deserialize_with = "deserialize_record"
    )]
    pub values: StatisticRecord,
}

impl Baseline {
    /// Create a baseline from freshly computed statistics.
    pub fn new(test: &str, precision: Precision, run_id: Uuid, values: StatisticRecord) -> Self {
        Self {
            test: test.to_string(),
            precision,
            recorded_at: Utc::now(),
            run_id,
            values,
        }
    }
}

fn serialize_record<S: Serializer>(record: &StatisticRecord, s: S) -> Result<S::Ok, S::Error> {
    let stored: BTreeMap<&str, Option<f64>> = record
        .iter()
        .map(|(k, v)| (k.as_str(), v.is_finite().then_some(*v)))
        .collect();
    stored.serialize(s)
}

fn deserialize_record<'de, D: Deserializer<'de>>(d: D) -> Result<StatisticRecord, D::Error> {
    let stored = BTreeMap::<String, Option<f64>>::deserialize(d)?;
    Ok(stored
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
        .collect())
}
