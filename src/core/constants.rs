//! Constants and default hyperparameter values.

/// Default number of boosting rounds.
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Default learning rate (shrinkage) applied to every new tree.
pub const DEFAULT_LEARNING_RATE: f64 = 0.3;

/// Default maximum tree depth.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Default maximum number of leaves; zero means no limit.
pub const DEFAULT_MAX_LEAVES: usize = 0;

/// Default minimum hessian sum required in each child.
pub const DEFAULT_MIN_CHILD_WEIGHT: f64 = 1.0;

/// Default L2 regularization on leaf weights.
pub const DEFAULT_LAMBDA: f64 = 1.0;

/// Default L1 regularization on leaf weights.
pub const DEFAULT_ALPHA: f64 = 0.0;

/// Default minimum loss reduction required to split.
pub const DEFAULT_GAMMA: f64 = 0.0;

/// Default maximum number of bins per feature.
pub const DEFAULT_MAX_BIN: usize = 256;

/// Oversampling factor of the quantile summary relative to `max_bin`.
pub const SKETCH_OVERSAMPLE: usize = 8;

/// Default collective timeout in seconds.
pub const DEFAULT_COLLECTIVE_TIMEOUT_SECS: f64 = 1800.0;

/// Largest accepted collective timeout in seconds (one week).
pub const MAX_COLLECTIVE_TIMEOUT_SECS: f64 = 604_800.0;

/// Default ratio of the largest shard to the mean shard size tolerated after
/// repartitioning by query group.
pub const DEFAULT_MAX_SHARD_SKEW: f64 = 4.0;

/// Base score used for ranking objectives when none is configured.
pub const RANKING_BASE_SCORE: f64 = 0.0;

/// Base score used for softmax when none is configured.
pub const SOFTMAX_BASE_SCORE: f64 = 0.5;

/// Lower bound for second order gradients of probabilistic objectives.
pub const MIN_HESSIAN: f64 = 1e-16;

/// Clamp applied to probabilities in log-loss style metrics.
pub const PROB_EPSILON: f64 = 1e-16;

/// Clamp applied to an estimated logistic base score.
pub const BASE_SCORE_EPSILON: f64 = 1e-6;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DISTGBT_";

/// Magic bytes leading every binary model.
pub const MODEL_MAGIC: [u8; 4] = *b"DGBT";

/// Binary model format version.
pub const MODEL_FORMAT_VERSION: u32 = 1;
