//! Multi-worker training over the in-process collective group.

use approx::assert_relative_eq;
use distgbt::network::InProcessGroup;
use distgbt::*;
use ndarray::Array2;
use std::thread;
use std::time::Duration;

mod common;
use common::*;

/// Low-cardinality features so every layout derives the same cuts.
fn discrete_dataset(rows: usize) -> Dataset {
    let x = Array2::from_shape_fn((rows, 2), |(r, c)| match c {
        0 => (r % 10) as f32,
        _ => ((r * 7) % 13) as f32,
    });
    let y = (0..rows)
        .map(|r| ((r % 10) as f32 * 0.5 + ((r * 7) % 13) as f32 * 0.37).sin() + (r % 10) as f32)
        .collect();
    Dataset::new(x, y).unwrap()
}

#[test]
fn test_sharded_training_matches_single_worker() {
    let data = discrete_dataset(240);
    let single = ConfigBuilder::new().n_estimators(6).build().unwrap();
    let sharded = ConfigBuilder::new()
        .n_estimators(6)
        .num_workers(3)
        .build()
        .unwrap();

    let a = train(&single, &data, &[], TrainOptions::new()).unwrap();
    let b = train(&sharded, &data, &[], TrainOptions::new()).unwrap();
    assert_eq!(a.model.num_trees(), b.model.num_trees());
    let pa = a.model.predict(&data).unwrap();
    let pb = b.model.predict(&data).unwrap();
    for (x, y) in pa.iter().zip(pb.iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-6);
    }
}

#[test]
fn test_same_layout_gives_identical_models() {
    let data = regression_dataset(300, 4, 99);
    let config = ConfigBuilder::new()
        .n_estimators(5)
        .num_workers(4)
        .subsample(0.8)
        .seed(3)
        .build()
        .unwrap();
    let first = train(&config, &data, &[], TrainOptions::new()).unwrap();
    let second = train(&config, &data, &[], TrainOptions::new()).unwrap();
    assert_eq!(first.model.to_bytes().unwrap(), second.model.to_bytes().unwrap());
}

#[test]
fn test_explicit_communicators_match_coordinator() {
    let data = regression_dataset(120, 3, 17);
    let config = ConfigBuilder::new().n_estimators(4).build().unwrap();
    let shards = distgbt::dataset::shard_rows(&data, 2).unwrap();

    let comms = InProcessGroup::create(2, Duration::from_secs(30)).unwrap();
    let models: Vec<Model> = thread::scope(|scope| {
        let handles: Vec<_> = shards
            .iter()
            .zip(comms)
            .map(|(shard, comm)| {
                let config = &config;
                scope.spawn(move || {
                    train_with_communicator(config, shard, &[], TrainOptions::new(), &comm)
                        .unwrap()
                        .model
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(models[0], models[1]);

    let workers: Vec<WorkerShard> = shards.into_iter().map(WorkerShard::new).collect();
    let coordinated = train_distributed(&config, workers, TrainOptions::new()).unwrap();
    assert_eq!(coordinated.model, models[0]);
}

#[test]
fn test_ranking_groups_stay_on_one_worker() {
    let data = ranking_dataset(12, 6, 4);
    let config = ConfigBuilder::new()
        .objective(ObjectiveKind::RankNdcg)
        .n_estimators(5)
        .min_child_weight(0.01)
        .num_workers(3)
        .build()
        .unwrap();
    let result = train(&config, &data, std::slice::from_ref(&data), TrainOptions::new()).unwrap();
    let ndcg = result.history.get("validation_0", "ndcg").unwrap();
    assert_eq!(ndcg.len(), 5);

    // per-group ndcg averages only agree when no group was split
    let preds = result.model.predict(&data).unwrap();
    let local = Metric::Ndcg { k: None }
        .evaluate(&data, preds.view(), &LocalCommunicator::new())
        .unwrap();
    assert_relative_eq!(local, ndcg[4], epsilon = 1e-9);
}

#[test]
fn test_cancellation_stops_every_worker_on_the_same_round() {
    let data = regression_dataset(90, 2, 5);
    let config = ConfigBuilder::new()
        .n_estimators(10)
        .num_workers(3)
        .build()
        .unwrap();
    let token = CancellationToken::new();
    let observer_token = token.clone();
    let options = TrainOptions::new().cancel(token).observer(move |summary| {
        if summary.round == 2 {
            observer_token.cancel();
        }
    });
    let result = train(&config, &data, &[], options).unwrap();
    assert!(result.cancelled);
    assert_eq!(result.model.num_rounds(), 3);
    assert_eq!(result.history.get("train", "rmse").map(<[f64]>::len), Some(3));
}

#[test]
fn test_mismatched_validation_sets_are_a_data_error() {
    let data = regression_dataset(40, 2, 6);
    let halves = distgbt::dataset::shard_rows(&data, 2).unwrap();
    let shards = vec![
        WorkerShard::new(halves[0].clone()).with_validation(halves[0].clone()),
        WorkerShard::new(halves[1].clone()),
    ];
    let config = ConfigBuilder::new().n_estimators(2).build().unwrap();
    let err = train_distributed(&config, shards, TrainOptions::new()).unwrap_err();
    assert!(err.to_string().contains("validation"));
}

#[test]
fn test_collective_timeout_names_rank_and_timeout() {
    let mut comms = InProcessGroup::create(2, Duration::from_millis(50)).unwrap();
    let lonely = comms.remove(0);
    let _silent_peer = comms;
    let mut buf = [1.0];
    let err = lonely.allreduce_sum(&mut buf).unwrap_err();
    assert_eq!(err.category(), "collective");
    let message = err.to_string();
    assert!(message.contains("rank 0"));
    assert!(message.contains("50ms"));
}
