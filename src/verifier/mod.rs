//! Answer verifier.
//!
//! Flow for one answer test:
//! requirements check → simulation run → dataset load → statistics →
//! store as baseline, or compare against the stored one.

mod compare;
mod dataset;
mod runner;
mod statistics;
mod tolerance;

pub use compare::*;
pub use dataset::*;
pub use runner::*;
pub use statistics::*;
pub use tolerance::*;

use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::baseline::BaselineStore;
use crate::models::{AnswerTestSpec, Baseline, BuildConfig, Library, Result};

/// What to do with computed statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Compare against the stored baseline
    Compare,
    /// Record the statistics as the new baseline
    Store,
}

/// Result of one answer test.
#[derive(Debug, Clone)]
pub enum TestOutcome {
    /// Compared against the baseline (check `report.passed()`)
    Compared(VerificationReport),
    /// Baseline written
    Stored { path: PathBuf, values: usize },
    /// Not run because the build lacks required libraries
    Skipped { missing: Vec<Library> },
}

impl TestOutcome {
    /// Whether this outcome counts as a failure for the exit status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Compared(report) if !report.passed())
    }
}

/// Runs answer tests and checks their output.
pub struct AnswerVerifier {
    runner: SimulationRunner,
    store: BaselineStore,
    policy: TolerancePolicy,
    build: Option<BuildConfig>,
    skip_run: bool,
    run_id: Uuid,
}

impl AnswerVerifier {
    pub fn new(runner: SimulationRunner, store: BaselineStore, policy: TolerancePolicy) -> Self {
        Self {
            runner,
            store,
            policy,
            build: None,
            skip_run: false,
            run_id: Uuid::new_v4(),
        }
    }

    /// Check test requirements against a resolved build.
    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = Some(build);
        self
    }

    /// Reuse existing simulation output instead of running the simulation.
    pub fn skip_run(mut self, skip: bool) -> Self {
        self.skip_run = skip;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn policy(&self) -> &TolerancePolicy {
        &self.policy
    }

    /// Libraries `test` requires that the build does not provide.
    pub fn missing_requirements(&self, test: &AnswerTestSpec) -> Vec<Library> {
        match &self.build {
            Some(build) => test
                .requires
                .iter()
                .copied()
                .filter(|lib| !build.has(*lib))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Run one answer test.
    pub async fn verify(&self, test: &AnswerTestSpec, mode: Mode) -> Result<TestOutcome> {
        let missing = self.missing_requirements(test);
        if !missing.is_empty() {
            warn!(test = %test.name, ?missing, "Skipping: build lacks required libraries");
            return Ok(TestOutcome::Skipped { missing });
        }

        let work_dir = if self.skip_run {
            self.runner.work_dir(test)
        } else {
            self.runner.run(test).await?
        };

        let dataset = Dataset::load(&work_dir, &test.dataset)?;
        let actual = compute_statistics(&dataset)?;

        match mode {
            Mode::Store => {
                let values = actual.len();
                let baseline = Baseline::new(&test.name, self.policy.precision, self.run_id, actual);
                let path = self.store.save(&baseline)?;
                Ok(TestOutcome::Stored { path, values })
            }
            Mode::Compare => {
                let baseline = self.store.load(&test.name)?;
                if baseline.precision != self.policy.precision {
                    warn!(
                        test = %test.name,
                        baseline = %baseline.precision,
                        build = %self.policy.precision,
                        "Baseline was recorded with a different precision"
                    );
                }
                let report = compare(&test.name, &actual, &baseline.values, &self.policy);
                info!(
                    test = %test.name,
                    passed = report.passed_count(),
                    total = report.total_count(),
                    "Compared against baseline"
                );
                Ok(TestOutcome::Compared(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HarnessError, Precision};
    use crate::resolver::{Platform, resolve, tests::FakeHost};
    use crate::verifier::dataset::tests::write_dataset;
    use tempfile::TempDir;

    fn grackle_test() -> AnswerTestSpec {
        AnswerTestSpec {
            name: "grackle_general".to_string(),
            parameter_file: PathBuf::from("Grackle/method_grackle_general.in"),
            dataset: "GeneralGrackle-500.00".to_string(),
            ncpus: 4,
            max_runtime_secs: 60,
            requires: vec![Library::Grackle],
        }
    }

    fn verifier(tmp: &TempDir, precision: Precision) -> AnswerVerifier {
        let runs = tmp.path().join("runs");
        let runner = SimulationRunner::new("enzo-e", tmp.path().join("input"), &runs);
        let store = BaselineStore::new(&tmp.path().join("answers")).unwrap();
        AnswerVerifier::new(runner, store, TolerancePolicy::new(precision)).skip_run(true)
    }

    fn write_output(tmp: &TempDir) {
        write_dataset(&tmp.path().join("runs").join("grackle_general"), "GeneralGrackle-500.00");
    }

    #[tokio::test]
    async fn store_then_compare_passes() {
        let tmp = TempDir::new().unwrap();
        write_output(&tmp);
        let v = verifier(&tmp, Precision::Double);

        let stored = v.verify(&grackle_test(), Mode::Store).await.unwrap();
        assert!(matches!(stored, TestOutcome::Stored { values: 20, .. }));

        let compared = v.verify(&grackle_test(), Mode::Compare).await.unwrap();
        assert!(!compared.is_failure());
    }

    #[tokio::test]
    async fn drifted_baseline_fails() {
        let tmp = TempDir::new().unwrap();
        write_output(&tmp);
        let v = verifier(&tmp, Precision::Double);
        v.verify(&grackle_test(), Mode::Store).await.unwrap();

        let store = BaselineStore::new(&tmp.path().join("answers")).unwrap();
        let mut baseline = store.load("grackle_general").unwrap();
        *baseline.values.get_mut("density:mean").unwrap() *= 1.0 + 1e-12;
        store.save(&baseline).unwrap();

        let outcome = v.verify(&grackle_test(), Mode::Compare).await.unwrap();
        assert!(outcome.is_failure());
        let TestOutcome::Compared(report) = outcome else {
            panic!("expected comparison");
        };
        let keys: Vec<_> = report.failures().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["density:mean"]);

        // the same drift is within single-precision tolerance
        let outcome = verifier(&tmp, Precision::Single)
            .verify(&grackle_test(), Mode::Compare)
            .await
            .unwrap();
        assert!(!outcome.is_failure());
    }

    #[tokio::test]
    async fn compare_without_baseline_errors() {
        let tmp = TempDir::new().unwrap();
        write_output(&tmp);
        let err = verifier(&tmp, Precision::Single)
            .verify(&grackle_test(), Mode::Compare)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::BaselineMissing { .. }));
    }

    #[tokio::test]
    async fn skips_when_build_lacks_grackle() {
        let tmp = TempDir::new().unwrap();
        let host = FakeHost::new()
            .env("CHARM_HOME", "/opt/charm")
            .env("HDF5_HOME", "/usr");
        let build = resolve(Platform::LinuxGnu, Precision::Single, &host).unwrap();

        let v = verifier(&tmp, Precision::Single).with_build(build);
        let outcome = v.verify(&grackle_test(), Mode::Compare).await.unwrap();
        assert!(matches!(
            outcome,
            TestOutcome::Skipped { ref missing } if missing == &[Library::Grackle]
        ));
        assert!(!outcome.is_failure());
    }

    #[tokio::test]
    async fn missing_output_is_dataset_error() {
        let tmp = TempDir::new().unwrap();
        let err = verifier(&tmp, Precision::Single)
            .verify(&grackle_test(), Mode::Store)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Dataset(_)));
    }
}
