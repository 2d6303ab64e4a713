//! Core configuration structures for distgbt.
//!
//! A [`Config`] carries every hyperparameter of a training job. It is plain
//! serde data so it can be loaded from JSON or TOML files, overridden from
//! `DISTGBT_*` environment variables, or assembled with [`ConfigBuilder`].

use crate::core::constants::*;
use crate::core::error::{GbtError, Result};
use crate::core::types::*;
use crate::metrics::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Objective function
    pub objective: ObjectiveKind,
    /// Number of classes, only meaningful for softmax
    pub num_class: usize,
    /// Number of boosting rounds to run
    pub n_estimators: usize,
    /// Shrinkage applied to every tree unless a schedule is supplied
    pub learning_rate: f64,
    /// Maximum tree depth; zero is unbounded and requires loss-guided growth
    pub max_depth: usize,
    /// Maximum number of leaves per tree; zero is unbounded
    pub max_leaves: usize,
    /// Node expansion order
    pub grow_policy: GrowPolicy,
    /// Minimum hessian sum in each child of a split
    pub min_child_weight: f64,
    /// L2 regularization
    pub lambda: f64,
    /// L1 regularization
    pub alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    /// Maximum absolute leaf weight; zero disables clipping
    pub max_delta_step: f64,
    /// Row subsampling ratio per tree
    pub subsample: f64,
    /// Column subsampling ratio per tree
    pub colsample_bytree: f64,
    /// Maximum number of histogram bins per feature
    pub max_bin: usize,
    /// Initial prediction; estimated from the labels when unset
    pub base_score: Option<f64>,
    /// Seed for row and column sampling
    pub seed: u64,
    /// Evaluation metrics; the objective's default when empty
    pub eval_metric: Vec<Metric>,
    /// Evaluate the training set every round
    pub evaluate_train: bool,
    /// Stop after this many rounds without validation improvement
    pub early_stopping_rounds: Option<usize>,
    /// Minimum improvement counted by early stopping
    pub early_stopping_tolerance: f64,
    /// Number of workers taking part in the job
    pub num_workers: usize,
    /// Threads per worker; zero uses every core
    pub num_threads: usize,
    /// Timeout of a single collective operation
    pub collective_timeout_secs: f64,
    /// Largest tolerated ratio between the biggest and the mean shard after
    /// repartitioning by query group
    pub max_shard_skew: f64,
    /// Compute device
    pub device: DeviceType,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            objective: ObjectiveKind::SquaredError,
            num_class: 0,
            n_estimators: DEFAULT_N_ESTIMATORS,
            learning_rate: DEFAULT_LEARNING_RATE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_leaves: DEFAULT_MAX_LEAVES,
            grow_policy: GrowPolicy::DepthWise,
            min_child_weight: DEFAULT_MIN_CHILD_WEIGHT,
            lambda: DEFAULT_LAMBDA,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            max_delta_step: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bin: DEFAULT_MAX_BIN,
            base_score: None,
            seed: 0,
            eval_metric: Vec::new(),
            evaluate_train: true,
            early_stopping_rounds: None,
            early_stopping_tolerance: 0.0,
            num_workers: 1,
            num_threads: 0,
            collective_timeout_secs: DEFAULT_COLLECTIVE_TIMEOUT_SECS,
            max_shard_skew: DEFAULT_MAX_SHARD_SKEW,
            device: DeviceType::Cpu,
        }
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GbtError::invalid_parameter(
            name,
            value,
            "must be a finite non-negative number",
        ));
    }
    Ok(())
}

fn fraction(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(GbtError::invalid_parameter(name, value, "must be in (0, 1]"));
    }
    Ok(())
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    ///
    /// Errors name the offending parameter. Nothing here depends on data.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GbtError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        non_negative("lambda", self.lambda)?;
        non_negative("alpha", self.alpha)?;
        non_negative("gamma", self.gamma)?;
        non_negative("min_child_weight", self.min_child_weight)?;
        non_negative("max_delta_step", self.max_delta_step)?;
        non_negative("early_stopping_tolerance", self.early_stopping_tolerance)?;
        fraction("subsample", self.subsample)?;
        fraction("colsample_bytree", self.colsample_bytree)?;

        if self.n_estimators == 0 {
            return Err(GbtError::invalid_parameter(
                "n_estimators",
                self.n_estimators,
                "must be at least 1",
            ));
        }
        if self.max_bin < 2 {
            return Err(GbtError::invalid_parameter(
                "max_bin",
                self.max_bin,
                "must be at least 2",
            ));
        }
        if self.max_depth == 0 && self.grow_policy == GrowPolicy::DepthWise {
            return Err(GbtError::invalid_parameter(
                "max_depth",
                self.max_depth,
                "unbounded depth requires grow_policy=lossguide",
            ));
        }
        if self.max_leaves == 1 {
            return Err(GbtError::invalid_parameter(
                "max_leaves",
                self.max_leaves,
                "must be 0 (unbounded) or at least 2",
            ));
        }

        match self.objective {
            ObjectiveKind::Softmax if self.num_class < 2 => {
                return Err(GbtError::invalid_parameter(
                    "num_class",
                    self.num_class,
                    "multi-class objectives need at least 2 classes",
                ));
            }
            ObjectiveKind::Softmax => {}
            _ if self.num_class > 1 => {
                return Err(GbtError::invalid_parameter(
                    "num_class",
                    self.num_class,
                    format!("only valid with multi:softprob, not {}", self.objective),
                ));
            }
            _ => {}
        }

        if let Some(base_score) = self.base_score {
            if !base_score.is_finite() {
                return Err(GbtError::invalid_parameter(
                    "base_score",
                    base_score,
                    "must be finite",
                ));
            }
            if self.objective == ObjectiveKind::Logistic && !(base_score > 0.0 && base_score < 1.0)
            {
                return Err(GbtError::invalid_parameter(
                    "base_score",
                    base_score,
                    "must be in (0, 1) for binary:logistic",
                ));
            }
        }

        for metric in &self.eval_metric {
            metric.check_objective(self.objective)?;
        }

        if self.early_stopping_rounds == Some(0) {
            return Err(GbtError::invalid_parameter(
                "early_stopping_rounds",
                0,
                "must be at least 1 when set",
            ));
        }

        if self.num_workers == 0 {
            return Err(GbtError::invalid_parameter(
                "num_workers",
                self.num_workers,
                "must be at least 1",
            ));
        }
        if !(self.collective_timeout_secs > 0.0
            && self.collective_timeout_secs <= MAX_COLLECTIVE_TIMEOUT_SECS)
        {
            return Err(GbtError::invalid_parameter(
                "collective_timeout_secs",
                self.collective_timeout_secs,
                format!("must be in (0, {}]", MAX_COLLECTIVE_TIMEOUT_SECS),
            ));
        }
        if !(self.max_shard_skew >= 1.0) {
            return Err(GbtError::invalid_parameter(
                "max_shard_skew",
                self.max_shard_skew,
                "must be at least 1",
            ));
        }
        if self.device == DeviceType::Cuda {
            return Err(GbtError::invalid_parameter(
                "device",
                self.device,
                "no accelerator backend is compiled into this build",
            ));
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GbtError::config(format!("Failed to read config file: {}", e)))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| GbtError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| GbtError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(GbtError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| {
                GbtError::config(format!("Failed to serialize TOML config: {}", e))
            })?,
            _ => {
                return Err(GbtError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default configuration with `DISTGBT_*` environment overrides applied
    pub fn load_from_environment() -> Result<Self> {
        let mut config = Config::default();
        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Apply every `DISTGBT_<PARAM>` environment variable through
    /// [`Config::set_param`], so aliases work there too.
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        let mut overrides: Vec<(String, String)> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|param| (param.to_ascii_lowercase(), value))
            })
            .collect();
        overrides.sort();

        for (param, value) in overrides {
            log::debug!("Environment override {}={}", param, value);
            self.set_param(&param, &value)?;
        }
        Ok(())
    }

    /// Threads each worker's pool should use
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Number of trees grown per boosting round
    pub fn num_outputs(&self) -> usize {
        match self.objective {
            ObjectiveKind::Softmax => self.num_class,
            _ => 1,
        }
    }

    /// Collective timeout as a duration; an out-of-range value saturates
    /// at the accepted maximum.
    pub fn collective_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.collective_timeout_secs)
            .unwrap_or(Duration::from_secs_f64(MAX_COLLECTIVE_TIMEOUT_SECS))
            .min(Duration::from_secs_f64(MAX_COLLECTIVE_TIMEOUT_SECS))
    }

    /// Check if early stopping is enabled
    pub fn is_early_stopping_enabled(&self) -> bool {
        self.early_stopping_rounds.is_some()
    }
}

/// Builder pattern for creating configurations
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    pub fn objective(mut self, objective: ObjectiveKind) -> Self {
        self.config.objective = objective;
        self
    }

    pub fn num_class(mut self, num_class: usize) -> Self {
        self.config.num_class = num_class;
        self
    }

    pub fn n_estimators(mut self, rounds: usize) -> Self {
        self.config.n_estimators = rounds;
        self
    }

    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.config.learning_rate = rate;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_leaves(mut self, leaves: usize) -> Self {
        self.config.max_leaves = leaves;
        self
    }

    pub fn grow_policy(mut self, policy: GrowPolicy) -> Self {
        self.config.grow_policy = policy;
        self
    }

    pub fn min_child_weight(mut self, weight: f64) -> Self {
        self.config.min_child_weight = weight;
        self
    }

    pub fn lambda(mut self, lambda: f64) -> Self {
        self.config.lambda = lambda;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn max_delta_step(mut self, step: f64) -> Self {
        self.config.max_delta_step = step;
        self
    }

    pub fn subsample(mut self, ratio: f64) -> Self {
        self.config.subsample = ratio;
        self
    }

    pub fn colsample_bytree(mut self, ratio: f64) -> Self {
        self.config.colsample_bytree = ratio;
        self
    }

    pub fn max_bin(mut self, max_bin: usize) -> Self {
        self.config.max_bin = max_bin;
        self
    }

    pub fn base_score(mut self, base_score: f64) -> Self {
        self.config.base_score = Some(base_score);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn eval_metric(mut self, metric: Metric) -> Self {
        self.config.eval_metric.push(metric);
        self
    }

    pub fn evaluate_train(mut self, evaluate: bool) -> Self {
        self.config.evaluate_train = evaluate;
        self
    }

    pub fn early_stopping_rounds(mut self, rounds: usize) -> Self {
        self.config.early_stopping_rounds = Some(rounds);
        self
    }

    pub fn early_stopping_tolerance(mut self, tolerance: f64) -> Self {
        self.config.early_stopping_tolerance = tolerance;
        self
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    pub fn collective_timeout_secs(mut self, secs: f64) -> Self {
        self.config.collective_timeout_secs = secs;
        self
    }

    pub fn max_shard_skew(mut self, skew: f64) -> Self {
        self.config.max_shard_skew = skew;
        self
    }

    pub fn device(mut self, device: DeviceType) -> Self {
        self.config.device = device;
        self
    }

    /// Build the configuration, validating all parameters
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.objective, ObjectiveKind::SquaredError);
        assert_eq!(config.n_estimators, DEFAULT_N_ESTIMATORS);
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.num_outputs(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_regularization_names_parameter() {
        let config = Config {
            lambda: -1.0,
            ..Config::default()
        };
        match config.validate() {
            Err(GbtError::InvalidParameter { parameter, .. }) => assert_eq!(parameter, "lambda"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ConfigBuilder::new().num_workers(0).build().unwrap_err();
        assert!(err.to_string().contains("num_workers"));
    }

    #[test]
    fn test_unbounded_depth_requires_lossguide() {
        assert!(ConfigBuilder::new().max_depth(0).build().is_err());
        let config = ConfigBuilder::new()
            .max_depth(0)
            .grow_policy(GrowPolicy::LossGuide)
            .max_leaves(8)
            .build()
            .unwrap();
        assert_eq!(config.max_depth, 0);
    }

    #[test]
    fn test_softmax_requires_classes() {
        assert!(ConfigBuilder::new()
            .objective(ObjectiveKind::Softmax)
            .build()
            .is_err());
        let config = ConfigBuilder::new()
            .objective(ObjectiveKind::Softmax)
            .num_class(3)
            .build()
            .unwrap();
        assert_eq!(config.num_outputs(), 3);
    }

    #[test]
    fn test_collective_timeout_bounds() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e30] {
            let err = ConfigBuilder::new()
                .collective_timeout_secs(secs)
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("collective_timeout_secs"));
        }
        let config = ConfigBuilder::new()
            .collective_timeout_secs(MAX_COLLECTIVE_TIMEOUT_SECS)
            .build()
            .unwrap();
        assert_eq!(config.collective_timeout(), Duration::from_secs(604_800));

        // unvalidated configs still yield a usable duration
        let mut raw = Config::default();
        raw.collective_timeout_secs = 1e30;
        assert_eq!(config.collective_timeout(), raw.collective_timeout());
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("DISTGBT_ETA", "0.05");
        std::env::set_var("DISTGBT_NUM_LEAVES", "12");
        std::env::set_var("DISTGBT_METRIC", "rmse,mae");
        let config = Config::load_from_environment();
        std::env::remove_var("DISTGBT_ETA");
        std::env::remove_var("DISTGBT_NUM_LEAVES");
        std::env::remove_var("DISTGBT_METRIC");
        let config = config.unwrap();
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.max_leaves, 12);
        assert_eq!(config.eval_metric, vec![Metric::Rmse, Metric::Mae]);

        std::env::set_var("DISTGBT_NOT_A_PARAM", "1");
        let err = Config::load_from_environment().unwrap_err();
        std::env::remove_var("DISTGBT_NOT_A_PARAM");
        assert_eq!(err.category(), "invalid_parameter");
        assert!(err.to_string().contains("not_a_param"));
    }

    #[test]
    fn test_cuda_device_rejected() {
        let err = ConfigBuilder::new()
            .device(DeviceType::Cuda)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("device"));
    }

    #[test]
    fn test_metric_objective_mismatch() {
        let err = ConfigBuilder::new()
            .eval_metric(Metric::MLogLoss)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("eval_metric"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let config = ConfigBuilder::new()
            .objective(ObjectiveKind::RankNdcg)
            .eval_metric(Metric::Ndcg { k: Some(5) })
            .early_stopping_rounds(3)
            .seed(7)
            .build()
            .unwrap();

        for name in ["config.json", "config.toml"] {
            let path = dir.path().join(name);
            config.save_to_file(&path).unwrap();
            let loaded = Config::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
        }

        assert!(config.save_to_file(dir.path().join("config.yaml")).is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "learning_rate = 0.05\nobjective = \"binary:logistic\"\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.objective, ObjectiveKind::Logistic);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }
}
