//! Baseline persistence.
//!
//! - One `<test>.json` per answer test in the store directory
//! - Saves are atomic (write-then-rename) with the previous file kept as
//!   `<test>.backup.json`
//! - A missing baseline is an error at compare time, never an implicit pass

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{Baseline, ConfigError, HarnessError, Result, is_plain_name};

const BACKUP_SUFFIX: &str = ".backup.json";
const TEMP_SUFFIX: &str = ".tmp.json";

/// Directory of recorded baselines.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    /// Open (creating if needed) a baseline store.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| HarnessError::io("creating baseline dir", e))?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Path of the baseline file for a test.
    pub fn path_for(&self, test: &str) -> PathBuf {
        self.dir.join(format!("{test}.json"))
    }

    fn backup_path(&self, test: &str) -> PathBuf {
        self.dir.join(format!("{test}{BACKUP_SUFFIX}"))
    }

    /// Check if a baseline exists for a test.
    pub fn exists(&self, test: &str) -> bool {
        self.path_for(test).exists()
    }

    fn check_name(test: &str) -> Result<()> {
        if is_plain_name(test) {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!("'{test}' cannot be used as a baseline name")).into())
        }
    }

    /// Load the baseline for a test.
    pub fn load(&self, test: &str) -> Result<Baseline> {
        Self::check_name(test)?;
        let path = self.path_for(test);
        if !path.exists() {
            return Err(HarnessError::BaselineMissing {
                test: test.to_string(),
                path,
            });
        }

        let file = File::open(&path).map_err(|e| HarnessError::io("opening baseline", e))?;
        let baseline: Baseline = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| HarnessError::ParseError(format!("Invalid baseline {}: {e}", path.display())))?;

        if baseline.test != test {
            return Err(HarnessError::ParseError(format!(
                "Baseline {} was recorded for '{}'",
                path.display(),
                baseline.test
            )));
        }

        debug!(test, values = baseline.values.len(), "Loaded baseline");
        Ok(baseline)
    }

    /// Save a baseline (atomic write).
    pub fn save(&self, baseline: &Baseline) -> Result<PathBuf> {
        Self::check_name(&baseline.test)?;
        let path = self.path_for(&baseline.test);

        // Backup existing baseline
        if path.exists() {
            fs::copy(&path, self.backup_path(&baseline.test))
                .map_err(|e| HarnessError::io("backing up baseline", e))?;
        }

        // Write to temp file
        let temp_path = self.dir.join(format!("{}{TEMP_SUFFIX}", baseline.test));
        let file = File::create(&temp_path)
            .map_err(|e| HarnessError::io("creating temp baseline", e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, baseline)
            .map_err(|e| HarnessError::Internal(format!("Serializing baseline: {e}")))?;
        let file = writer
            .into_inner()
            .map_err(|e| HarnessError::io("flushing temp baseline", e.into_error()))?;
        file.sync_all()
            .map_err(|e| HarnessError::io("syncing temp baseline", e))?;

        // Atomic rename
        fs::rename(&temp_path, &path).map_err(|e| HarnessError::io("renaming baseline", e))?;

        info!(
            test = %baseline.test,
            values = baseline.values.len(),
            path = %path.display(),
            "Baseline saved"
        );
        Ok(path)
    }

    /// Names of all stored baselines, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let pattern = self.dir.join("*.json");
        let pattern_str = pattern.to_string_lossy();

        let mut names: Vec<String> = glob::glob(&pattern_str)
            .map_err(|e| HarnessError::Internal(format!("Invalid glob pattern: {e}")))?
            .filter_map(|r| r.ok())
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|n| !n.ends_with(BACKUP_SUFFIX) && !n.ends_with(TEMP_SUFFIX))
            .filter_map(|n| n.strip_suffix(".json").map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Get store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
