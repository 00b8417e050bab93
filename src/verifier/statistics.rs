//! Per-field summary statistics.
//!
//! The set of statistics is closed: each `DerivedQuantity` variant produces
//! a fixed tuple of named results, and `compute` dispatches on the variant.

use tracing::debug;

use super::dataset::{CellSample, Dataset};
use crate::models::{DatasetError, StatisticRecord, record_key};

/// A derived quantity computed over every cell of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedQuantity {
    /// Minimum value and the centre of the cell holding it
    MinLocation,
    /// Maximum value and the centre of the cell holding it
    MaxLocation,
    /// Volume-weighted standard deviation and mean
    WeightedStandardDeviation,
}

impl DerivedQuantity {
    pub const ALL: [DerivedQuantity; 3] = [
        DerivedQuantity::MinLocation,
        DerivedQuantity::MaxLocation,
        DerivedQuantity::WeightedStandardDeviation,
    ];

    /// Names of the results, in the order `compute` returns them.
    pub fn result_names(self) -> &'static [&'static str] {
        match self {
            Self::MinLocation => &["min", "min_xloc", "min_yloc", "min_zloc"],
            Self::MaxLocation => &["max", "max_xloc", "max_yloc", "max_zloc"],
            Self::WeightedStandardDeviation => &["std_dev", "mean"],
        }
    }

    /// Compute the quantity over `samples`.
    ///
    /// Returns `None` when there is no finite value to work with.
    pub fn compute(self, samples: impl Iterator<Item = CellSample>) -> Option<Vec<f64>> {
        match self {
            Self::MinLocation => extremum(samples, |candidate, best| candidate < best),
            Self::MaxLocation => extremum(samples, |candidate, best| candidate > best),
            Self::WeightedStandardDeviation => weighted_std_dev(samples),
        }
    }
}

/// First cell whose value beats every earlier one, as `[value, x, y, z]`.
fn extremum(
    samples: impl Iterator<Item = CellSample>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<Vec<f64>> {
    let best = samples
        .filter(|s| !s.value.is_nan())
        .fold(None::<CellSample>, |best, s| match best {
            Some(b) if !better(s.value, b.value) => Some(b),
            _ => Some(s),
        })?;
    let [x, y, z] = best.position;
    Some(vec![best.value, x, y, z])
}

/// Weighted standard deviation and mean, as `[std_dev, mean]`.
fn weighted_std_dev(samples: impl Iterator<Item = CellSample>) -> Option<Vec<f64>> {
    let cells: Vec<(f64, f64)> = samples
        .filter(|s| !s.value.is_nan())
        .map(|s| (s.value, s.volume))
        .collect();

    let total_weight: f64 = cells.iter().map(|(_, w)| w).sum();
    if cells.is_empty() || total_weight <= 0.0 {
        return None;
    }

    let mean = cells.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight;
    let variance = cells
        .iter()
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / total_weight;

    Some(vec![variance.sqrt(), mean])
}

/// Compute every derived quantity for every field of `dataset`.
pub fn compute_statistics(dataset: &Dataset) -> Result<StatisticRecord, DatasetError> {
    let mut record = StatisticRecord::new();

    for field in dataset.field_list() {
        for quantity in DerivedQuantity::ALL {
            let results = quantity
                .compute(dataset.samples(field))
                .ok_or_else(|| DatasetError::EmptyField(field.clone()))?;
            let names = quantity.result_names();
            debug_assert_eq!(results.len(), names.len());
            for (name, value) in names.iter().zip(results) {
                record.insert(record_key(field, name), value);
            }
        }
        debug!(field = %field, "Computed field statistics");
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::dataset::tests::write_dataset;
    use tempfile::TempDir;

    fn cell(value: f64, x: f64, volume: f64) -> CellSample {
        CellSample {
            value,
            position: [x, 0.5, 0.5],
            volume,
        }
    }

    #[test]
    fn min_location_keeps_first_tie() {
        let cells = [cell(2.0, 0.0, 1.0), cell(1.0, 1.0, 1.0), cell(1.0, 2.0, 1.0)];
        let out = DerivedQuantity::MinLocation.compute(cells.into_iter()).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 0.5, 0.5]);
    }

    #[test]
    fn max_location_ignores_nan() {
        let cells = [cell(f64::NAN, 0.0, 1.0), cell(3.0, 1.0, 1.0), cell(2.0, 2.0, 1.0)];
        let out = DerivedQuantity::MaxLocation.compute(cells.into_iter()).unwrap();
        assert_eq!(out[0], 3.0);
        assert_eq!(out[1], 1.0);
    }

    #[test]
    fn weighted_std_dev_uses_volume() {
        // values 1 (w=3) and 5 (w=1): mean 2, variance (3*1 + 1*9)/4 = 3
        let cells = [cell(1.0, 0.0, 3.0), cell(5.0, 1.0, 1.0)];
        let out = DerivedQuantity::WeightedStandardDeviation
            .compute(cells.into_iter())
            .unwrap();
        assert!((out[1] - 2.0).abs() < 1e-15);
        assert!((out[0] - 3.0_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn all_nan_field_has_no_result() {
        let cells = [cell(f64::NAN, 0.0, 1.0)];
        for quantity in DerivedQuantity::ALL {
            assert!(quantity.compute(cells.into_iter()).is_none());
        }
    }

    #[test]
    fn record_has_every_field_statistic_pair() {
        let tmp = TempDir::new().unwrap();
        write_dataset(tmp.path(), "Run");
        let ds = Dataset::load(tmp.path(), "Run").unwrap();

        let record = compute_statistics(&ds).unwrap();
        assert_eq!(record.len(), 2 * 10);

        assert_eq!(record["density:min"], 0.5);
        assert_eq!(record["density:min_xloc"], 1.5);
        assert_eq!(record["density:max"], 3.0);
        assert_eq!(record["density:max_xloc"], 0.75);

        // weights 0.5, 0.5, 1.0 over 1, 3, 0.5 -> mean (0.5 + 1.5 + 0.5) / 2
        assert!((record["density:mean"] - 1.25).abs() < 1e-15);
        assert!((record["temperature:mean"] - 25.0).abs() < 1e-15);
        assert!((record["temperature:std_dev"] - 15.0).abs() < 1e-12);
    }
}
