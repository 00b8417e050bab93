//! Core data models for enzo-harness.
//!
//! - Build configuration values produced by the resolver
//! - Statistic records and baselines consumed by the verifier
//! - The harness config file and error taxonomy

mod build;
mod config;
mod error;
mod record;

pub use build::*;
pub use config::*;
pub use error::*;
pub use record::*;
