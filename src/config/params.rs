//! String-keyed parameter access with xgboost-style aliases.

use crate::config::core::Config;
use crate::core::error::{GbtError, Result};
use crate::metrics::Metric;
use std::str::FromStr;

/// Resolve an alias to the canonical parameter name.
pub fn canonical_name(key: &str) -> &str {
    match key {
        "eta" | "shrinkage_rate" => "learning_rate",
        "reg_lambda" | "lambda_l2" => "lambda",
        "reg_alpha" | "lambda_l1" => "alpha",
        "min_split_loss" | "min_gain_to_split" => "gamma",
        "num_boost_round" | "num_round" | "num_iterations" => "n_estimators",
        "max_leaves" | "num_leaves" => "max_leaves",
        "colsample_bytree" | "feature_fraction" => "colsample_bytree",
        "subsample" | "bagging_fraction" => "subsample",
        "min_child_weight" | "min_sum_hessian_in_leaf" => "min_child_weight",
        "random_state" | "random_seed" => "seed",
        "nthread" | "n_jobs" => "num_threads",
        "metric" => "eval_metric",
        other => other,
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        GbtError::invalid_parameter(key, value, "could not parse value")
    })
}

fn parse_optional<T: FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    match value.trim() {
        "" | "none" | "None" | "null" => Ok(None),
        other => parse(key, other).map(Some),
    }
}

impl Config {
    /// Set a single parameter from its string form.
    ///
    /// Accepts the canonical field names and the usual aliases (`eta`,
    /// `reg_lambda`, `num_boost_round`, ...). Multiple metrics are separated by
    /// commas.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        let name = canonical_name(key.trim());
        match name {
            "objective" => self.objective = value.parse()?,
            "num_class" => self.num_class = parse(key, value)?,
            "n_estimators" => self.n_estimators = parse(key, value)?,
            "learning_rate" => self.learning_rate = parse(key, value)?,
            "max_depth" => self.max_depth = parse(key, value)?,
            "max_leaves" => self.max_leaves = parse(key, value)?,
            "grow_policy" => self.grow_policy = value.parse()?,
            "min_child_weight" => self.min_child_weight = parse(key, value)?,
            "lambda" => self.lambda = parse(key, value)?,
            "alpha" => self.alpha = parse(key, value)?,
            "gamma" => self.gamma = parse(key, value)?,
            "max_delta_step" => self.max_delta_step = parse(key, value)?,
            "subsample" => self.subsample = parse(key, value)?,
            "colsample_bytree" => self.colsample_bytree = parse(key, value)?,
            "max_bin" => self.max_bin = parse(key, value)?,
            "base_score" => self.base_score = parse_optional(key, value)?,
            "seed" => self.seed = parse(key, value)?,
            "eval_metric" => {
                self.eval_metric = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Metric::from_str)
                    .collect::<Result<Vec<_>>>()?;
            }
            "evaluate_train" => self.evaluate_train = parse(key, value)?,
            "early_stopping_rounds" => self.early_stopping_rounds = parse_optional(key, value)?,
            "early_stopping_tolerance" => self.early_stopping_tolerance = parse(key, value)?,
            "num_workers" => self.num_workers = parse(key, value)?,
            "num_threads" => self.num_threads = parse(key, value)?,
            "collective_timeout_secs" => self.collective_timeout_secs = parse(key, value)?,
            "max_shard_skew" => self.max_shard_skew = parse(key, value)?,
            "device" => self.device = value.parse()?,
            _ => {
                return Err(GbtError::invalid_parameter(
                    key,
                    value,
                    "unknown parameter",
                ))
            }
        }
        Ok(())
    }

    /// Apply a list of parameters in order; later entries win.
    pub fn set_params<'a, I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeviceType, ObjectiveKind};

    #[test]
    fn test_aliases_map_to_same_field() {
        let mut a = Config::default();
        let mut b = Config::default();
        a.set_params([
            ("eta", "0.05"),
            ("reg_lambda", "2.5"),
            ("reg_alpha", "0.1"),
            ("min_split_loss", "0.3"),
            ("num_boost_round", "17"),
            ("colsample_bytree", "0.5"),
        ])
        .unwrap();
        b.set_params([
            ("learning_rate", "0.05"),
            ("lambda", "2.5"),
            ("alpha", "0.1"),
            ("gamma", "0.3"),
            ("n_estimators", "17"),
            ("feature_fraction", "0.5"),
        ])
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.learning_rate, 0.05);
        assert_eq!(a.n_estimators, 17);
    }

    #[test]
    fn test_metric_list_parsing() {
        let mut config = Config::default();
        config.set_param("eval_metric", "rmse, mae").unwrap();
        assert_eq!(config.eval_metric, vec![Metric::Rmse, Metric::Mae]);
    }

    #[test]
    fn test_optional_values() {
        let mut config = Config::default();
        config.set_param("early_stopping_rounds", "5").unwrap();
        assert_eq!(config.early_stopping_rounds, Some(5));
        config.set_param("early_stopping_rounds", "none").unwrap();
        assert_eq!(config.early_stopping_rounds, None);
        config.set_param("base_score", "0.25").unwrap();
        assert_eq!(config.base_score, Some(0.25));
    }

    #[test]
    fn test_enum_params() {
        let mut config = Config::default();
        config.set_param("objective", "multi:softmax").unwrap();
        config.set_param("num_class", "4").unwrap();
        config.set_param("device", "cuda").unwrap();
        assert_eq!(config.objective, ObjectiveKind::Softmax);
        assert_eq!(config.device, DeviceType::Cuda);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_and_malformed_params() {
        let mut config = Config::default();
        let err = config.set_param("evals_result", "{}").unwrap_err();
        assert!(err.to_string().contains("evals_result"));
        let err = config.set_param("eta", "fast").unwrap_err();
        assert!(err.to_string().contains("eta"));
    }
}
