//! Dataset management for distgbt.
//!
//! Shards arrive already split by the caller: each is a [`Dataset`] of dense
//! or CSR features with labels and optional weights, base margins and query
//! groups. [`partition`] holds the helpers that split a whole dataset into
//! worker shards, and [`binning`] turns a shard into histogram bins.

pub mod binning;
pub mod dataset;
pub mod matrix;
pub mod partition;

pub use binning::{BinMapper, BinnedMatrix, FeatureCuts, WeightedSummary, MISSING_BIN};
pub use dataset::{dense_from_rows, Dataset, DatasetBuilder};
pub use matrix::{CsrMatrix, FeatureMatrix};
pub use partition::{repartition_by_group, shard_rows, split_by_indicator};
