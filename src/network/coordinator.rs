//! Runs a group of training workers inside one process.
//!
//! Each worker is a scoped thread with its own shard, communicator and rayon
//! pool. A worker that fails tells its peers through
//! [`Communicator::abort`], so the whole group fails fast with the root
//! cause instead of waiting for the collective timeout.

use crate::boosting::{train_with_communicator, TrainOptions, TrainResult};
use crate::config::Config;
use crate::core::error::{GbtError, Result};
use crate::dataset::{repartition_by_group, shard_rows, Dataset};
use crate::network::inproc::InProcessGroup;
use crate::network::Communicator;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Rows owned by one worker.
#[derive(Debug, Clone)]
pub struct WorkerShard {
    pub train: Dataset,
    pub validation: Vec<Dataset>,
}

impl WorkerShard {
    pub fn new(train: Dataset) -> Self {
        WorkerShard {
            train,
            validation: Vec::new(),
        }
    }

    pub fn with_validation(mut self, validation: Dataset) -> Self {
        self.validation.push(validation);
        self
    }
}

/// Train on pre-partitioned shards, one worker thread per shard.
///
/// Returns rank 0's result after checking that every worker built the same
/// model.
pub fn train_distributed(
    config: &Config,
    shards: Vec<WorkerShard>,
    options: TrainOptions,
) -> Result<TrainResult> {
    config.validate()?;
    let world_size = shards.len();
    let comms = InProcessGroup::create(world_size, config.collective_timeout())?;
    log::info!("Starting {} training workers", world_size);

    let results: Vec<Result<TrainResult>> = thread::scope(|scope| {
        let handles: Vec<_> = shards
            .iter()
            .zip(comms)
            .map(|(shard, comm)| {
                let options = options.clone();
                scope.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        train_with_communicator(
                            config,
                            &shard.train,
                            &shard.validation,
                            options,
                            &comm,
                        )
                    }));
                    let result = outcome.unwrap_or_else(|_| {
                        Err(GbtError::training(format!(
                            "worker {} panicked",
                            comm.rank()
                        )))
                    });
                    if let Err(e) = &result {
                        comm.abort(&e.to_string());
                    }
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(GbtError::training(format!("worker {} panicked", rank)))
                })
            })
            .collect()
    });

    let mut results = root_cause(results)?;
    check_identical_models(&results)?;
    Ok(results.swap_remove(0))
}

/// The first non-collective error if any worker failed with one; those are
/// what made the others abort.
fn root_cause(results: Vec<Result<TrainResult>>) -> Result<Vec<TrainResult>> {
    let mut collective = None;
    let mut ok = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(r) => ok.push(r),
            Err(e @ GbtError::Collective { .. }) => {
                collective.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match collective {
        Some(e) => Err(e),
        None => Ok(ok),
    }
}

fn check_identical_models(results: &[TrainResult]) -> Result<()> {
    let Some((first, rest)) = results.split_first() else {
        return Ok(());
    };
    let reference = bincode::serialize(&first.model)?;
    for (i, result) in rest.iter().enumerate() {
        if bincode::serialize(&result.model)? != reference {
            return Err(GbtError::internal(format!(
                "model of rank {} differs from rank 0",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Split `train` and `validation` over `config.num_workers` workers and
/// train. Ranking objectives keep every query group on a single worker.
pub fn train_partitioned(
    config: &Config,
    train: &Dataset,
    validation: &[Dataset],
    options: TrainOptions,
) -> Result<TrainResult> {
    config.validate()?;
    let workers = config.num_workers;
    let ranking = config.objective.is_ranking();
    let split = |ds: &Dataset, max_skew: f64| {
        if ranking {
            repartition_by_group(ds, workers, max_skew)
        } else {
            shard_rows(ds, workers)
        }
    };

    let mut shards: Vec<WorkerShard> = split(train, config.max_shard_skew)?
        .into_iter()
        .map(WorkerShard::new)
        .collect();
    for ds in validation {
        // evaluation sets are not held to the skew limit
        for (shard, part) in shards.iter_mut().zip(split(ds, f64::INFINITY)?) {
            shard.validation.push(part);
        }
    }
    train_distributed(config, shards, options)
}
