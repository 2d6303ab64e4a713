//! The boosting loop run by every worker.
//!
//! [`GradientBooster`] is the explicit per-worker training context: it owns
//! the binned shard, the running margins of the training and validation sets
//! and this worker's copy of the model. Every worker executes the same
//! sequence of collectives, so all copies of the model stay identical.

use crate::boosting::early_stopping::{EarlyStopping, StoppingState};
use crate::boosting::ensemble::Model;
use crate::boosting::schedule::LearningRateSchedule;
use crate::config::Config;
use crate::core::error::{GbtError, Result};
use crate::core::types::{GradientPair, Round};
use crate::dataset::{BinnedMatrix, Dataset, FeatureCuts};
use crate::metrics::Metric;
use crate::network::{CancellationToken, Communicator, LocalCommunicator};
use crate::objective::ranking::require_groups;
use crate::objective::Objective;
use crate::tree::sampling::{sample_columns, sample_rows};
use crate::tree::{GrowerParams, Tree, TreeGrower};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callback receiving every round's metrics on rank 0.
pub type RoundObserver = Arc<dyn Fn(&RoundSummary) + Send + Sync>;

/// Optional inputs of a training run.
#[derive(Clone, Default)]
pub struct TrainOptions {
    /// Continue boosting from this model
    pub init_model: Option<Model>,
    /// Overrides the constant `learning_rate`
    pub learning_rate_schedule: Option<LearningRateSchedule>,
    pub cancel: Option<CancellationToken>,
    pub observer: Option<RoundObserver>,
}

impl TrainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_model(mut self, model: Model) -> Self {
        self.init_model = Some(model);
        self
    }

    pub fn learning_rate_schedule(mut self, schedule: LearningRateSchedule) -> Self {
        self.learning_rate_schedule = Some(schedule);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn observer<F>(mut self, f: F) -> Self
    where
        F: Fn(&RoundSummary) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for TrainOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainOptions")
            .field("init_model", &self.init_model.as_ref().map(Model::num_rounds))
            .field("learning_rate_schedule", &self.learning_rate_schedule)
            .field("cancel", &self.cancel)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// One metric value of one evaluation set.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalScore {
    pub dataset: String,
    pub metric: Metric,
    pub value: f64,
}

/// Metric values after a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: Round,
    pub scores: Vec<EvalScore>,
}

impl RoundSummary {
    pub fn get(&self, dataset: &str, metric: Metric) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.dataset == dataset && s.metric == metric)
            .map(|s| s.value)
    }

    /// Dataset name to metric name to value.
    pub fn to_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        let mut map: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for s in &self.scores {
            map.entry(s.dataset.clone())
                .or_default()
                .insert(s.metric.to_string(), s.value);
        }
        map
    }
}

impl fmt::Display for RoundSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.round)?;
        for s in &self.scores {
            write!(f, "\t{}-{}:{:.5}", s.dataset, s.metric, s.value)?;
        }
        Ok(())
    }
}

/// Per-round metric values: dataset name to metric name to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalHistory {
    scores: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

impl EvalHistory {
    pub fn record(&mut self, summary: &RoundSummary) {
        for s in &summary.scores {
            self.scores
                .entry(s.dataset.clone())
                .or_default()
                .entry(s.metric.to_string())
                .or_default()
                .push(s.value);
        }
    }

    pub fn get(&self, dataset: &str, metric: &str) -> Option<&[f64]> {
        self.scores
            .get(dataset)
            .and_then(|m| m.get(metric))
            .map(Vec::as_slice)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.scores.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, BTreeMap<String, Vec<f64>>> {
        &self.scores
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainResult {
    pub model: Model,
    pub history: EvalHistory,
    /// Global index of the best round when early stopping was configured
    pub best_iteration: Option<Round>,
    pub best_score: Option<f64>,
    /// Whether training stopped on a cancellation request
    pub cancelled: bool,
}

/// Name of the `i`-th validation set in summaries and history.
pub fn validation_name(index: usize) -> String {
    format!("validation_{}", index)
}

/// Per-worker training context.
pub struct GradientBooster<'a, C: Communicator + ?Sized> {
    config: &'a Config,
    comm: &'a C,
    objective: Objective,
    metrics: Vec<Metric>,
    train: &'a Dataset,
    validation: &'a [Dataset],
    cuts: FeatureCuts,
    binned: BinnedMatrix,
    grower_params: GrowerParams,
    schedule: LearningRateSchedule,
    model: Model,
    train_margins: Array2<f64>,
    valid_margins: Vec<Array2<f64>>,
}

impl<C: Communicator + ?Sized> fmt::Debug for GradientBooster<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBooster")
            .field("rank", &self.comm.rank())
            .field("objective", &self.objective)
            .field("metrics", &self.metrics)
            .field("num_rows", &self.train.num_rows())
            .field("num_validation", &self.validation.len())
            .field("rounds", &self.model.num_rounds())
            .finish()
    }
}

impl<'a, C: Communicator + ?Sized> GradientBooster<'a, C> {
    /// Set up training on this worker's shard. Runs collectives, so every
    /// worker of the group must call it.
    pub fn new(
        config: &'a Config,
        train: &'a Dataset,
        validation: &'a [Dataset],
        init_model: Option<Model>,
        comm: &'a C,
    ) -> Result<Self> {
        config.validate()?;
        let objective = Objective::from_config(config);
        if config.is_early_stopping_enabled() && validation.is_empty() {
            return Err(GbtError::config(
                "early_stopping_rounds requires at least one validation set",
            ));
        }
        check_shards(train, validation, comm)?;
        if objective.kind().is_ranking() {
            require_groups(train)?;
        }

        let model = match init_model {
            Some(model) => {
                if model.objective() != &objective {
                    return Err(GbtError::config(format!(
                        "initial model was trained with {}, configured objective is {}",
                        model.objective().kind(),
                        objective.kind()
                    )));
                }
                if model.num_features() != train.num_features() {
                    return Err(GbtError::dimension_mismatch(
                        comm.rank(),
                        model.num_features(),
                        train.num_features(),
                    ));
                }
                model
            }
            None => {
                let base_score = match config.base_score {
                    Some(score) => score,
                    None => objective.estimate_base_score(train, comm)?,
                };
                let mut model = Model::new(objective, base_score, train.num_features());
                model.set_feature_names(train.feature_names().map(<[String]>::to_vec));
                model
            }
        };

        let metrics = if config.eval_metric.is_empty() {
            vec![objective.default_metric()]
        } else {
            config.eval_metric.clone()
        };

        let cuts = FeatureCuts::build(train, config.max_bin, comm)?;
        let binned = BinnedMatrix::from_dataset(train, &cuts)?;
        let train_margins = model.predict_margin(train.features(), train.base_margin())?;
        let valid_margins = validation
            .iter()
            .map(|ds| model.predict_margin(ds.features(), ds.base_margin()))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Rank {}: {} rows, {} features, {} histogram slots, starting at round {}",
            comm.rank(),
            train.num_rows(),
            train.num_features(),
            cuts.total_slots(),
            model.num_rounds()
        );

        Ok(GradientBooster {
            config,
            comm,
            objective,
            metrics,
            train,
            validation,
            cuts,
            binned,
            grower_params: GrowerParams::from_config(config),
            schedule: LearningRateSchedule::Constant(config.learning_rate),
            model,
            train_margins,
            valid_margins,
        })
    }

    pub fn set_learning_rate_schedule(&mut self, schedule: LearningRateSchedule) {
        self.schedule = schedule;
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    /// Current training margins, shape `(num_outputs, num_rows)`.
    pub fn train_margins(&self) -> ArrayView2<'_, f64> {
        self.train_margins.view()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// One round with the configured objective.
    pub fn boost_round(&mut self) -> Result<()> {
        let gpairs = self
            .objective
            .gradients(self.train, self.train_margins.view())?;
        self.boost_with_gradients(gpairs.view())
    }

    /// One round from caller supplied gradients, shape
    /// `(num_outputs, num_rows)`.
    pub fn boost_with_gradients(&mut self, gpairs: ArrayView2<'_, GradientPair>) -> Result<()> {
        let num_outputs = self.objective.num_outputs();
        let num_rows = self.train.num_rows();
        if gpairs.dim() != (num_outputs, num_rows) {
            return Err(GbtError::training(format!(
                "gradients have shape {:?}, expected ({}, {})",
                gpairs.dim(),
                num_outputs,
                num_rows
            )));
        }
        let round = self.model.num_rounds();
        let rate = self.schedule.rate(round)?;
        let config = self.config;

        let mut trees = Vec::with_capacity(num_outputs);
        for output in 0..num_outputs {
            let rows = sample_rows(
                num_rows,
                config.subsample,
                config.seed,
                round,
                output,
                self.comm.rank(),
            );
            let features = sample_columns(
                self.train.num_features(),
                config.colsample_bytree,
                config.seed,
                round,
                output,
            );
            let grads = gpairs.row(output).to_vec();
            let mut tree = TreeGrower::new(&self.cuts, &self.binned, &self.grower_params, self.comm)
                .grow(&grads, rows, &features)?;
            tree.scale(rate);
            self.apply_tree(&tree, output);
            trees.push(tree);
        }
        self.model.push_round(trees)
    }

    fn apply_tree(&mut self, tree: &Tree, output: usize) {
        let binned = &self.binned;
        let deltas: Vec<f64> = (0..self.train.num_rows())
            .into_par_iter()
            .map(|row| tree.predict_binned(binned, row))
            .collect();
        for (margin, delta) in self.train_margins.row_mut(output).iter_mut().zip(deltas) {
            *margin += delta;
        }
        for (ds, margins) in self.validation.iter().zip(&mut self.valid_margins) {
            let deltas: Vec<f64> = (0..ds.num_rows())
                .into_par_iter()
                .map(|row| tree.predict_row(&ds.features().dense_row(row)))
                .collect();
            for (margin, delta) in margins.row_mut(output).iter_mut().zip(deltas) {
                *margin += delta;
            }
        }
    }

    /// Metrics of the current model on the training (if enabled) and
    /// validation sets.
    pub fn evaluate(&self, round: Round) -> Result<RoundSummary> {
        let mut scores = Vec::new();
        if self.config.evaluate_train {
            self.evaluate_set("train", self.train, &self.train_margins, &mut scores)?;
        }
        for (i, (ds, margins)) in self.validation.iter().zip(&self.valid_margins).enumerate() {
            self.evaluate_set(&validation_name(i), ds, margins, &mut scores)?;
        }
        Ok(RoundSummary { round, scores })
    }

    fn evaluate_set(
        &self,
        name: &str,
        dataset: &Dataset,
        margins: &Array2<f64>,
        scores: &mut Vec<EvalScore>,
    ) -> Result<()> {
        let predictions = self.objective.transform(margins.view());
        for &metric in &self.metrics {
            scores.push(EvalScore {
                dataset: name.to_string(),
                metric,
                value: metric.evaluate(dataset, predictions.view(), self.comm)?,
            });
        }
        Ok(())
    }

    /// Run the configured number of rounds.
    pub fn run(
        mut self,
        cancel: Option<&CancellationToken>,
        observer: Option<&RoundObserver>,
    ) -> Result<TrainResult> {
        let start = self.model.num_rounds();
        let end = start + self.config.n_estimators;
        let watched_set = validation_name(self.validation.len().saturating_sub(1));
        let watched_metric = self.metrics.last().copied().unwrap_or(Metric::Rmse);
        let mut stopper = self.config.early_stopping_rounds.map(|patience| {
            EarlyStopping::new(
                patience,
                self.config.early_stopping_tolerance,
                watched_metric.higher_is_better(),
            )
        });
        let is_root = self.comm.rank() == 0;
        if is_root {
            log::info!(
                "Training rounds {}..{} on {} worker(s), objective {}",
                start,
                end,
                self.comm.world_size(),
                self.objective.kind()
            );
        }

        let mut history = EvalHistory::default();
        let mut cancelled = false;
        for round in start..end {
            if self.cancellation_requested(cancel)? {
                log::info!("Training cancelled before round {}", round);
                cancelled = true;
                break;
            }
            self.boost_round()?;
            let summary = self.evaluate(round)?;
            history.record(&summary);
            if is_root {
                log::info!("{}", summary);
                if let Some(observer) = observer {
                    observer(&summary);
                }
            }
            if let Some(stopper) = stopper.as_mut() {
                let score = summary
                    .get(&watched_set, watched_metric)
                    .unwrap_or(f64::NAN);
                if stopper.update(round, score) == StoppingState::Stopped {
                    break;
                }
            }
        }

        let (best_iteration, best_score) = match &stopper {
            Some(stopper) => (stopper.best_round(), stopper.best_score()),
            None => (None, None),
        };
        if let (Some(best), Some(score)) = (best_iteration, best_score) {
            self.model.truncate_rounds(best + 1);
            self.model.set_attr("best_iteration", best.to_string());
            self.model.set_attr("best_score", score.to_string());
        }

        Ok(TrainResult {
            model: self.model,
            history,
            best_iteration,
            best_score,
            cancelled,
        })
    }

    /// All-reduced cancellation flag, so every worker stops on the same round.
    fn cancellation_requested(&self, cancel: Option<&CancellationToken>) -> Result<bool> {
        let local = cancel.map_or(false, CancellationToken::is_cancelled);
        let mut flag = [if local { 1.0 } else { 0.0 }];
        self.comm.allreduce_sum(&mut flag)?;
        Ok(flag[0] > 0.0)
    }
}

/// First-round shard scan: every worker must agree on the feature count and
/// the number of validation sets.
fn check_shards<C: Communicator + ?Sized>(
    train: &Dataset,
    validation: &[Dataset],
    comm: &C,
) -> Result<()> {
    let mut local = vec![train.num_features() as f64, validation.len() as f64];
    local.extend(validation.iter().map(|ds| ds.num_features() as f64));
    let shapes = comm.allgather(local)?;
    let reference = &shapes[0];
    let expected = reference[0] as usize;
    for (shard, shape) in shapes.iter().enumerate() {
        if shape[1] != reference[1] {
            return Err(GbtError::dataset(
                "validation",
                format!(
                    "shard {} has {} validation sets, shard 0 has {}",
                    shard, shape[1], reference[1]
                ),
            ));
        }
        if let Some(&actual) = shape.iter().enumerate().find_map(|(i, v)| {
            (i != 1 && *v as usize != expected).then_some(v)
        }) {
            return Err(GbtError::dimension_mismatch(shard, expected, actual as usize));
        }
    }
    Ok(())
}

/// Train on this worker's shard with an explicit communicator.
///
/// Runs inside a worker-local rayon pool of `num_threads` threads.
pub fn train_with_communicator<C: Communicator + ?Sized>(
    config: &Config,
    train: &Dataset,
    validation: &[Dataset],
    options: TrainOptions,
    comm: &C,
) -> Result<TrainResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_num_threads())
        .build()
        .map_err(|e| GbtError::training(format!("failed to start worker thread pool: {}", e)))?;
    pool.install(move || {
        let TrainOptions {
            init_model,
            learning_rate_schedule,
            cancel,
            observer,
        } = options;
        let mut booster = GradientBooster::new(config, train, validation, init_model, comm)?;
        if let Some(schedule) = learning_rate_schedule {
            booster.set_learning_rate_schedule(schedule);
        }
        booster.run(cancel.as_ref(), observer.as_ref())
    })
}

/// Train a model. With `num_workers > 1` the data is sharded across an
/// in-process worker group.
pub fn train(
    config: &Config,
    train: &Dataset,
    validation: &[Dataset],
    options: TrainOptions,
) -> Result<TrainResult> {
    if config.num_workers > 1 {
        return crate::network::train_partitioned(config, train, validation, options);
    }
    train_with_communicator(config, train, validation, options, &LocalCommunicator::new())
}
