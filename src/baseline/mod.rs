//! Baseline storage for answer tests.
//!
//! Provides:
//! - `BaselineStore`: persistence and loading of recorded baselines

mod store;

pub use store::*;
