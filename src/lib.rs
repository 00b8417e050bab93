//! enzo-harness - Build configuration and answer testing for Enzo-E/Cello.
//!
//! ## Architecture
//!
//! Two independent halves:
//! - **Resolver**: platform id → `BuildConfig`, locating Charm++, HDF5,
//!   libpng, Grackle (and MPI/PAPI on clusters) via environment variables
//!   and ordered filesystem probing
//! - **Verifier**: run a simulation, load its block-list output, compute
//!   per-field statistics and compare them to a stored baseline
//!
//! ## Tolerances
//!
//! - Location coordinates of extrema: exact match
//! - min / max / mean / std_dev: 6 decimals (single) or 14 (double)

pub mod baseline;
pub mod models;
pub mod resolver;
pub mod verifier;

// Re-exports for convenience
pub use baseline::BaselineStore;
pub use models::{
    BuildConfig, Config, HarnessError, Library, Precision, ResolveError, Result, StatisticRecord,
};
pub use resolver::{Host, Platform, SystemHost, resolve};
pub use verifier::{AnswerVerifier, Dataset, Mode, SimulationRunner, TestOutcome, TolerancePolicy};
