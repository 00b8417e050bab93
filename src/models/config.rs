//! Configuration models for enzo-harness.
//!
//! Everything the operator can tune lives in `harness.toml`; path-valued
//! strings may reference environment variables as `${VAR}`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::{Library, Precision};

/// Top-level configuration for enzo-harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Build settings (platform used for dependency checks)
    #[serde(default)]
    pub build: BuildSection,

    /// How to launch the simulation
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Baseline storage and tolerance settings
    #[serde(default)]
    pub answers: AnswersConfig,

    /// Answer tests
    #[serde(default)]
    pub tests: Vec<AnswerTestSpec>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Platform identifier (e.g. "linux_gnu"). Without it, library
    /// requirements of answer tests are not checked.
    #[serde(default)]
    pub platform: Option<String>,
}

/// `[simulation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Parallel launcher (e.g. "${CHARM_HOME}/bin/charmrun"); run directly when unset
    #[serde(default)]
    pub launcher: Option<String>,

    /// Extra launcher arguments placed after `+p<ncpus>`
    #[serde(default)]
    pub launcher_args: Vec<String>,

    /// Simulation executable
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Directory parameter files are relative to
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Root of per-test working directories
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

fn default_executable() -> String {
    "bin/enzo-e".to_string()
}

fn default_input_dir() -> String {
    "input".to_string()
}

fn default_work_dir() -> String {
    "answer-runs".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            launcher: None,
            launcher_args: Vec::new(),
            executable: default_executable(),
            input_dir: default_input_dir(),
            work_dir: default_work_dir(),
        }
    }
}

impl SimulationConfig {
    pub fn launcher_path(&self) -> Option<PathBuf> {
        self.launcher.as_deref().map(|s| PathBuf::from(expand_env_vars(s)))
    }

    pub fn executable_path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.executable))
    }

    pub fn input_dir_path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.input_dir))
    }

    pub fn work_dir_path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.work_dir))
    }
}

/// `[answers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswersConfig {
    /// Baseline directory
    #[serde(default = "default_answers_dir")]
    pub dir: String,

    /// Build precision; falls back to `USE_DOUBLE` when unset
    #[serde(default)]
    pub precision: Option<Precision>,

    /// Decimal tolerance for aggregate statistics in single precision
    #[serde(default = "default_single_decimals")]
    pub single_decimals: u32,

    /// Decimal tolerance for aggregate statistics in double precision
    #[serde(default = "default_double_decimals")]
    pub double_decimals: u32,
}

fn default_answers_dir() -> String {
    "answers".to_string()
}

fn default_single_decimals() -> u32 {
    6
}

fn default_double_decimals() -> u32 {
    14
}

impl Default for AnswersConfig {
    fn default() -> Self {
        Self {
            dir: default_answers_dir(),
            precision: None,
            single_decimals: default_single_decimals(),
            double_decimals: default_double_decimals(),
        }
    }
}

impl AnswersConfig {
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.dir))
    }
}

/// One answer test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerTestSpec {
    /// Test name (also the baseline file stem)
    pub name: String,

    /// Parameter file, relative to `simulation.input_dir`
    pub parameter_file: PathBuf,

    /// Output dataset name; loaded from `<name>/<name>.block_list`
    pub dataset: String,

    /// Worker processes for the simulation
    #[serde(default = "default_ncpus")]
    pub ncpus: usize,

    /// Wall-clock budget for the simulation in seconds
    #[serde(default = "default_max_runtime")]
    pub max_runtime_secs: u64,

    /// Libraries the build must have for this test to run
    #[serde(default)]
    pub requires: Vec<Library>,
}

fn default_ncpus() -> usize {
    4
}

fn default_max_runtime() -> u64 {
    60
}

impl AnswerTestSpec {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for test in &self.tests {
            if !seen.insert(test.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate answer test '{}'",
                    test.name
                )));
            }
            if !is_plain_name(&test.name) {
                return Err(ConfigError::Invalid(format!(
                    "answer test name '{}' must be a single plain path component",
                    test.name
                )));
            }
            if test.ncpus == 0 {
                return Err(ConfigError::Invalid(format!(
                    "answer test '{}' needs at least one cpu",
                    test.name
                )));
            }
            if !is_plain_name(&test.dataset) {
                return Err(ConfigError::Invalid(format!(
                    "answer test '{}' has invalid dataset name '{}'",
                    test.name, test.dataset
                )));
            }
        }
        if self.answers.single_decimals == 0 || self.answers.double_decimals == 0 {
            return Err(ConfigError::Invalid(
                "decimal tolerances must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up an answer test by name.
    pub fn test(&self, name: &str) -> Option<&AnswerTestSpec> {
        self.tests.iter().find(|t| t.name == name)
    }
}

/// Whether `name` is usable as a single file or directory name: non-empty,
/// no separators, not `.` or `..`.
pub fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    expand_with(s, |name| std::env::var(name).ok())
}

/// Expand `${VAR}` placeholders using a custom lookup.
pub fn expand_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();

    for cap in env_var_pattern().captures_iter(s) {
        if let Some(value) = lookup(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
