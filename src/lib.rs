//! # distgbt
//!
//! Distributed gradient-boosted decision tree training in pure Rust.
//!
//! Training data is split row-wise over a group of workers. Every worker
//! builds quantile cuts, gradient histograms and split decisions through the
//! same collective operations, so all workers grow identical trees and end
//! with byte-identical models.
//!
//! ## Quick Start
//!
//! ```rust
//! use distgbt::{train, ConfigBuilder, Dataset, TrainOptions};
//! use ndarray::Array2;
//!
//! # fn main() -> distgbt::Result<()> {
//! let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
//! let data = Dataset::new(x, vec![1.0, 1.0, 3.0, 3.0])?;
//!
//! let config = ConfigBuilder::new()
//!     .n_estimators(10)
//!     .max_depth(2)
//!     .min_child_weight(0.0)
//!     .build()?;
//! let result = train(&config, &data, &[], TrainOptions::new())?;
//!
//! let predictions = result.model.predict(&data)?;
//! assert!(predictions[[0, 0]] < predictions[[0, 3]]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Distributed training
//!
//! Set `num_workers` to split one dataset over in-process workers, or hand
//! pre-partitioned shards to [`train_distributed`]:
//!
//! ```rust
//! use distgbt::{train_distributed, ConfigBuilder, Dataset, TrainOptions, WorkerShard};
//! use ndarray::Array2;
//!
//! # fn main() -> distgbt::Result<()> {
//! let shard = |offset: f32| {
//!     let x = Array2::from_shape_fn((8, 2), |(r, c)| r as f32 + offset * c as f32);
//!     let y = (0..8).map(|r| r as f32 * 0.5).collect();
//!     Dataset::new(x, y).map(WorkerShard::new)
//! };
//! let config = ConfigBuilder::new().n_estimators(5).build()?;
//! let result = train_distributed(&config, vec![shard(0.0)?, shard(1.0)?], TrainOptions::new())?;
//! assert_eq!(result.model.num_rounds(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: shared types, constants and the error type
//! - [`config`]: training parameters with file and environment loading
//! - [`dataset`]: feature matrices, labels, groups, quantile binning and sharding
//! - [`network`]: the [`Communicator`] collectives and the in-process worker group
//! - [`objective`]: gradients and base scores for each learning task
//! - [`tree`]: histograms, split finding and the tree grower
//! - [`metrics`]: distributed evaluation metrics
//! - [`boosting`]: the training loop, models and early stopping
//! - [`io`]: model persistence and text dumps

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod boosting;
pub mod config;
pub mod core;
pub mod dataset;
pub mod io;
pub mod metrics;
pub mod network;
pub mod objective;
pub mod tree;

pub use crate::core::error::{GbtError, Result};
pub use crate::core::types::{
    DeviceType, GradientPair, GrowPolicy, ImportanceType, ObjectiveKind,
};

pub use boosting::{
    train, train_with_communicator, EarlyStopping, EvalHistory, GradientBooster,
    LearningRateSchedule, Model, RoundObserver, RoundSummary, TrainOptions, TrainResult,
};
pub use config::{Config, ConfigBuilder};
pub use dataset::{CsrMatrix, Dataset, DatasetBuilder, FeatureMatrix};
pub use io::{dump_model, load_model, save_model, SerializationFormat};
pub use metrics::Metric;
pub use network::{
    train_distributed, train_partitioned, CancellationToken, Communicator, LocalCommunicator,
    WorkerShard,
};
pub use objective::Objective;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the default `env_logger` backend, configured by `RUST_LOG`.
///
/// Calling it more than once, or after another logger was installed, is a
/// no-op.
pub fn init() {
    if env_logger::try_init().is_ok() {
        log::debug!("distgbt {} logging initialized", VERSION);
    }
}
