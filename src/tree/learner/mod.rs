//! Tree learners.
//!
//! Training is data-parallel: every worker builds histograms over its own
//! rows and the grower reduces them before choosing a split.

pub mod grower;

pub use grower::{GrowerParams, TreeGrower};
