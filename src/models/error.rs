//! Error types for enzo-harness.
//!
//! Taxonomy:
//! - Operator-fixable failures: missing dependency, bad config, missing baseline
//! - External failures: the simulation process failed or ran too long
//! - Internal invariant violations (bugs)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::Library;

/// Top-level error type for enzo-harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    // ═══════════════════════════════════════════════════════════════════
    // OPERATOR-FIXABLE: set a variable, fix the config, record a baseline
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Unknown answer test: {0}")]
    UnknownTest(String),

    #[error("No baseline recorded for test '{test}' (expected {path})")]
    BaselineMissing { test: String, path: PathBuf },

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // EXTERNAL: the simulation process misbehaved
    // ═══════════════════════════════════════════════════════════════════

    #[error("Simulation for '{test}' failed: {status}")]
    SimulationFailed { test: String, status: String },

    #[error("Simulation for '{test}' exceeded its wall-clock budget of {limit:?}")]
    Timeout { test: String, limit: Duration },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // INTERNAL: invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is something the operator resolves by changing the
    /// environment or config rather than by fixing the simulation.
    pub fn is_operator_fixable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Resolve(_)
                | Self::UnknownTest(_)
                | Self::BaselineMissing { .. }
        )
    }
}

/// Dependency resolution errors.
///
/// Fatal to configuration: there is no automatic recovery, the message tells
/// the operator which variable to set.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{library} was not found.  Try setting the {env_var} environment variable{hint}.")]
    DependencyNotFound {
        library: Library,
        env_var: &'static str,
        /// Extra guidance appended to the message (may be empty)
        hint: &'static str,
    },

    #[error("Unknown platform '{0}' (known: {known})", known = crate::resolver::Platform::known_ids())]
    UnknownPlatform(String),
}

impl ResolveError {
    /// The library this error is about, if any.
    pub fn library(&self) -> Option<Library> {
        match self {
            Self::DependencyNotFound { library, .. } => Some(*library),
            Self::UnknownPlatform(_) => None,
        }
    }
}

/// Errors while loading a block-list dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse block file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{path}:{line}: malformed block list entry '{entry}'")]
    MalformedBlockList {
        path: PathBuf,
        line: usize,
        entry: String,
    },

    #[error("Block '{block}' not present in {file}")]
    MissingBlock { block: String, file: PathBuf },

    #[error("Block '{block}' has no field '{field}'")]
    MissingField { block: String, field: String },

    #[error("Block '{block}' field '{field}' has {actual} values, expected {expected}")]
    Shape {
        block: String,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Block '{block}' has invalid cell width {width:?}")]
    Geometry { block: String, width: [f64; 3] },

    #[error("Block '{block}' has more cells than can be addressed: dims {dims:?}")]
    Dims { block: String, dims: [usize; 3] },

    #[error("Dataset has no blocks: {0}")]
    Empty(PathBuf),

    #[error("Field '{0}' has no finite values")]
    EmptyField(String),
}

/// Result type alias for enzo-harness.
pub type Result<T> = std::result::Result<T, HarnessError>;
