//! Training objectives.
//!
//! [`Objective`] is a closed set of loss functions selected from the
//! configuration. Every objective turns the current margins into one
//! [`GradientPair`] per (output, row) and maps margins to predictions.
//!
//! Margins are stored output-major: `margins[[k, i]]` is output `k` of row
//! `i`. Single-output objectives use one row of that array.

pub mod classification;
pub mod ranking;
pub mod regression;

use crate::config::Config;
use crate::core::constants::{BASE_SCORE_EPSILON, RANKING_BASE_SCORE, SOFTMAX_BASE_SCORE};
use crate::core::error::{GbtError, Result};
use crate::core::types::{GradientPair, ObjectiveKind};
use crate::dataset::Dataset;
use crate::metrics::Metric;
use crate::network::Communicator;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// A loss function with its gradient, link and default metric.
///
/// Stored in models under the same name the configuration uses, e.g.
/// `{"name": "multi:softprob", "num_class": 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObjectiveRepr", into = "ObjectiveRepr")]
pub enum Objective {
    SquaredError,
    Logistic,
    Softmax { num_class: usize },
    RankPairwise,
    RankNdcg,
}

#[derive(Serialize, Deserialize)]
struct ObjectiveRepr {
    name: ObjectiveKind,
    #[serde(default)]
    num_class: usize,
}

impl TryFrom<ObjectiveRepr> for Objective {
    type Error = GbtError;

    fn try_from(repr: ObjectiveRepr) -> Result<Self> {
        match (repr.name, repr.num_class) {
            (ObjectiveKind::Softmax, n) if n < 2 => Err(GbtError::serialization(format!(
                "multi:softprob needs num_class >= 2, found {}",
                n
            ))),
            (ObjectiveKind::Softmax, _) => Ok(Objective::new(repr.name, repr.num_class)),
            (kind, 0) => Ok(Objective::new(kind, 0)),
            (kind, n) => Err(GbtError::serialization(format!(
                "{} takes no num_class, found {}",
                kind, n
            ))),
        }
    }
}

impl From<Objective> for ObjectiveRepr {
    fn from(objective: Objective) -> Self {
        let num_class = match objective {
            Objective::Softmax { num_class } => num_class,
            _ => 0,
        };
        ObjectiveRepr {
            name: objective.kind(),
            num_class,
        }
    }
}

impl Objective {
    pub fn from_config(config: &Config) -> Self {
        Objective::new(config.objective, config.num_class)
    }

    pub fn new(kind: ObjectiveKind, num_class: usize) -> Self {
        match kind {
            ObjectiveKind::SquaredError => Objective::SquaredError,
            ObjectiveKind::Logistic => Objective::Logistic,
            ObjectiveKind::Softmax => Objective::Softmax { num_class },
            ObjectiveKind::RankPairwise => Objective::RankPairwise,
            ObjectiveKind::RankNdcg => Objective::RankNdcg,
        }
    }

    pub fn kind(&self) -> ObjectiveKind {
        match self {
            Objective::SquaredError => ObjectiveKind::SquaredError,
            Objective::Logistic => ObjectiveKind::Logistic,
            Objective::Softmax { .. } => ObjectiveKind::Softmax,
            Objective::RankPairwise => ObjectiveKind::RankPairwise,
            Objective::RankNdcg => ObjectiveKind::RankNdcg,
        }
    }

    /// Trees grown per round.
    pub fn num_outputs(&self) -> usize {
        match self {
            Objective::Softmax { num_class } => *num_class,
            _ => 1,
        }
    }

    pub fn default_metric(&self) -> Metric {
        match self {
            Objective::SquaredError => Metric::Rmse,
            Objective::Logistic => Metric::LogLoss,
            Objective::Softmax { .. } => Metric::MLogLoss,
            Objective::RankPairwise | Objective::RankNdcg => Metric::Ndcg { k: None },
        }
    }

    /// Gradients of the loss at `margins`, shape `(num_outputs, num_rows)`.
    pub fn gradients(
        &self,
        dataset: &Dataset,
        margins: ArrayView2<'_, f64>,
    ) -> Result<Array2<GradientPair>> {
        if margins.dim() != (self.num_outputs(), dataset.num_rows()) {
            return Err(GbtError::internal(format!(
                "margin buffer has shape {:?}, expected ({}, {})",
                margins.dim(),
                self.num_outputs(),
                dataset.num_rows()
            )));
        }
        match self {
            Objective::SquaredError => Ok(regression::squared_error_gradients(dataset, margins)),
            Objective::Logistic => classification::logistic_gradients(dataset, margins),
            Objective::Softmax { num_class } => {
                classification::softmax_gradients(dataset, margins, *num_class)
            }
            Objective::RankPairwise => ranking::lambda_gradients(dataset, margins, false),
            Objective::RankNdcg => ranking::lambda_gradients(dataset, margins, true),
        }
    }

    /// Map margins to predictions (probabilities for the classifiers).
    pub fn transform(&self, margins: ArrayView2<'_, f64>) -> Array2<f64> {
        match self {
            Objective::Logistic => margins.mapv(classification::sigmoid),
            Objective::Softmax { .. } => classification::softmax_columns(margins),
            _ => margins.to_owned(),
        }
    }

    /// Margin corresponding to a base score given in prediction space.
    pub fn base_margin(&self, base_score: f64) -> f64 {
        match self {
            Objective::Logistic => classification::logit(base_score),
            _ => base_score,
        }
    }

    /// Initial prediction estimated from the labels of all workers.
    ///
    /// Every worker must call this since it runs a collective.
    pub fn estimate_base_score<C: Communicator + ?Sized>(
        &self,
        dataset: &Dataset,
        comm: &C,
    ) -> Result<f64> {
        match self {
            Objective::SquaredError => regression::weighted_label_mean(dataset, comm),
            Objective::Logistic => {
                let mean = regression::weighted_label_mean(dataset, comm)?;
                Ok(mean.clamp(BASE_SCORE_EPSILON, 1.0 - BASE_SCORE_EPSILON))
            }
            Objective::Softmax { .. } => Ok(SOFTMAX_BASE_SCORE),
            Objective::RankPairwise | Objective::RankNdcg => Ok(RANKING_BASE_SCORE),
        }
    }
}
