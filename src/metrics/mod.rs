//! Evaluation metrics.
//!
//! A [`Metric`] is evaluated on every worker over its own shard. Decomposable
//! metrics reduce a `(sum, weight)` pair, AUC gathers the scored rows of all
//! workers, and ranking metrics reduce `(sum over groups, group count)`.
//! Every worker gets the same value back.
//!
//! ```rust
//! use distgbt::metrics::Metric;
//!
//! let metric: Metric = "ndcg@5".parse().unwrap();
//! assert_eq!(metric, Metric::Ndcg { k: Some(5) });
//! assert!(metric.higher_is_better());
//! assert_eq!(metric.to_string(), "ndcg@5");
//! ```

pub mod classification;
pub mod ranking;
pub mod regression;

use crate::core::error::{GbtError, Result};
use crate::core::types::ObjectiveKind;
use crate::dataset::Dataset;
use crate::network::Communicator;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Evaluation metric, named as in xgboost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    Rmse,
    Mae,
    LogLoss,
    /// Binary error rate at threshold 0.5
    Error,
    Auc,
    MLogLoss,
    MError,
    Ndcg { k: Option<usize> },
    Map { k: Option<usize> },
}

impl Metric {
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::Auc | Metric::Ndcg { .. } | Metric::Map { .. })
    }

    /// Reject metrics that cannot be computed from this objective's output.
    pub fn check_objective(&self, objective: ObjectiveKind) -> Result<()> {
        let ok = match self {
            Metric::Rmse | Metric::Mae => objective != ObjectiveKind::Softmax,
            Metric::LogLoss | Metric::Error => objective == ObjectiveKind::Logistic,
            Metric::Auc => objective == ObjectiveKind::Logistic || objective.is_ranking(),
            Metric::MLogLoss | Metric::MError => objective == ObjectiveKind::Softmax,
            Metric::Ndcg { .. } | Metric::Map { .. } => objective.is_ranking(),
        };
        if ok {
            Ok(())
        } else {
            Err(GbtError::invalid_parameter(
                "eval_metric",
                self,
                format!("not supported for objective {}", objective),
            ))
        }
    }

    /// Metric value over the predictions of all workers.
    ///
    /// `predictions` is output-major and already transformed by the
    /// objective. An empty evaluation set yields NaN.
    pub fn evaluate<C: Communicator + ?Sized>(
        &self,
        dataset: &Dataset,
        predictions: ArrayView2<'_, f64>,
        comm: &C,
    ) -> Result<f64> {
        match self {
            Metric::Rmse => {
                let sums = regression::squared_error_sums(dataset, predictions);
                Ok(reduce_ratio(sums, comm)?.sqrt())
            }
            Metric::Mae => {
                reduce_ratio(regression::absolute_error_sums(dataset, predictions), comm)
            }
            Metric::LogLoss => {
                reduce_ratio(classification::logloss_sums(dataset, predictions), comm)
            }
            Metric::Error => reduce_ratio(classification::error_sums(dataset, predictions), comm),
            Metric::MLogLoss => {
                reduce_ratio(classification::mlogloss_sums(dataset, predictions), comm)
            }
            Metric::MError => reduce_ratio(classification::merror_sums(dataset, predictions), comm),
            Metric::Auc => classification::distributed_auc(dataset, predictions, comm),
            Metric::Ndcg { k } => reduce_ratio(ranking::ndcg_sums(dataset, predictions, *k)?, comm),
            Metric::Map { k } => reduce_ratio(ranking::map_sums(dataset, predictions, *k)?, comm),
        }
    }
}

/// All-reduce `[numerator, denominator]` and divide; NaN when the
/// denominator is zero everywhere.
pub(crate) fn reduce_ratio<C: Communicator + ?Sized>(mut sums: [f64; 2], comm: &C) -> Result<f64> {
    comm.allreduce_sum(&mut sums)?;
    Ok(if sums[1] > 0.0 {
        sums[0] / sums[1]
    } else {
        f64::NAN
    })
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Rmse => write!(f, "rmse"),
            Metric::Mae => write!(f, "mae"),
            Metric::LogLoss => write!(f, "logloss"),
            Metric::Error => write!(f, "error"),
            Metric::Auc => write!(f, "auc"),
            Metric::MLogLoss => write!(f, "mlogloss"),
            Metric::MError => write!(f, "merror"),
            Metric::Ndcg { k: None } => write!(f, "ndcg"),
            Metric::Ndcg { k: Some(k) } => write!(f, "ndcg@{}", k),
            Metric::Map { k: None } => write!(f, "map"),
            Metric::Map { k: Some(k) } => write!(f, "map@{}", k),
        }
    }
}

impl FromStr for Metric {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        let (base, k) = match name.split_once('@') {
            Some((base, k)) => {
                let k = k.parse::<usize>().map_err(|_| {
                    GbtError::invalid_parameter("eval_metric", s, "cutoff must be an integer")
                })?;
                (base.to_string(), Some(k))
            }
            None => (name, None),
        };
        let metric = match base.as_str() {
            "rmse" => Metric::Rmse,
            "mae" => Metric::Mae,
            "logloss" => Metric::LogLoss,
            "error" => Metric::Error,
            "auc" => Metric::Auc,
            "mlogloss" => Metric::MLogLoss,
            "merror" => Metric::MError,
            "ndcg" => return Ok(Metric::Ndcg { k }),
            "map" => return Ok(Metric::Map { k }),
            _ => {
                return Err(GbtError::invalid_parameter(
                    "eval_metric",
                    s,
                    "unknown metric",
                ))
            }
        };
        if k.is_some() {
            return Err(GbtError::invalid_parameter(
                "eval_metric",
                s,
                "only ranking metrics take a cutoff",
            ));
        }
        Ok(metric)
    }
}

impl TryFrom<String> for Metric {
    type Error = GbtError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> String {
        metric.to_string()
    }
}
