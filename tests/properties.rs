//! Property-based tests for reduction order, missing-value routing and
//! ranking gradient independence.

use distgbt::network::{reduce_in_rank_order, InProcessGroup};
use distgbt::objective::ranking::lambda_gradients;
use distgbt::*;
use ndarray::Array2;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;
use std::thread;
use std::time::Duration;

mod common;
use common::weighted_rmse;

fn arb_parts() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..5, 1usize..6).prop_flat_map(|(ranks, len)| {
        prop_vec(prop_vec(-1e6f64..1e6, len), ranks)
    })
}

/// Features on a coarse grid, with NaN wherever the mask is set.
fn arb_dataset_with_missing() -> impl Strategy<Value = Dataset> {
    (8usize..40).prop_flat_map(|rows| {
        (
            prop_vec(0u8..6, rows * 2),
            prop_vec(any::<bool>(), rows * 2),
            prop_vec(-3.0f32..3.0, rows),
        )
            .prop_map(move |(grid, mask, labels)| {
                let x = Array2::from_shape_fn((rows, 2), |(r, c)| {
                    let i = r * 2 + c;
                    if mask[i] {
                        f32::NAN
                    } else {
                        f32::from(grid[i])
                    }
                });
                Dataset::new(x, labels).unwrap()
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn allreduce_is_bit_identical_on_every_rank(parts in arb_parts()) {
        let mut expected = vec![0.0; parts[0].len()];
        reduce_in_rank_order(&parts, &mut expected).unwrap();
        let sequential: Vec<f64> = (0..expected.len())
            .map(|i| parts.iter().skip(1).fold(parts[0][i], |acc, p| acc + p[i]))
            .collect();
        prop_assert_eq!(&expected, &sequential);

        let comms = InProcessGroup::create(parts.len(), Duration::from_secs(10)).unwrap();
        let results: Vec<Vec<f64>> = thread::scope(|scope| {
            let handles: Vec<_> = parts
                .iter()
                .zip(comms)
                .map(|(part, comm)| {
                    scope.spawn(move || {
                        let mut buf = part.clone();
                        comm.allreduce_sum(&mut buf).unwrap();
                        buf
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            let bits: Vec<u64> = result.iter().map(|v| v.to_bits()).collect();
            let expected_bits: Vec<u64> = expected.iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(bits, expected_bits);
        }
    }

    #[test]
    fn missing_values_route_the_same_in_training_and_scoring(data in arb_dataset_with_missing()) {
        let config = ConfigBuilder::new()
            .n_estimators(3)
            .min_child_weight(0.0)
            .build()
            .unwrap();
        let result = train(&config, &data, &[], TrainOptions::new()).unwrap();
        let preds = result.model.predict(&data).unwrap();
        let history = result.history.get("train", "rmse").unwrap();
        prop_assert!((weighted_rmse(&data, preds.view()) - history[2]).abs() < 1e-9);

        // every all-missing row lands in the same leaf of every tree
        let blank = FeatureMatrix::from(Array2::from_elem((2, 2), f32::NAN));
        let leaves = result.model.predict_leaf(&blank).unwrap();
        prop_assert_eq!(leaves.row(0), leaves.row(1));
    }

    #[test]
    fn ranking_gradients_are_independent_across_groups(
        first in prop_vec((0u8..4, -2.0f64..2.0), 2..6),
        second in prop_vec((0u8..4, -2.0f64..2.0), 2..6),
        relabel in prop_vec(0u8..4, 6),
        ndcg in any::<bool>(),
    ) {
        let rows = first.len() + second.len();
        let build = |second_labels: Vec<f32>| {
            let labels: Vec<f32> = first
                .iter()
                .map(|(y, _)| f32::from(*y))
                .chain(second_labels)
                .collect();
            let qid = (0..rows).map(|r| u64::from(r >= first.len())).collect();
            Dataset::builder(Array2::<f32>::zeros((rows, 1)))
                .labels(labels)
                .qid(qid)
                .build()
                .unwrap()
        };
        let margins = Array2::from_shape_fn((1, rows), |(_, r)| {
            first.iter().chain(&second).nth(r).map_or(0.0, |(_, m)| *m)
        });

        let original = build(second.iter().map(|(y, _)| f32::from(*y)).collect());
        let changed = build(relabel[..second.len()].iter().map(|y| f32::from(*y)).collect());
        let a = lambda_gradients(&original, margins.view(), ndcg).unwrap();
        let b = lambda_gradients(&changed, margins.view(), ndcg).unwrap();
        for row in 0..first.len() {
            prop_assert_eq!(a[[0, row]], b[[0, row]]);
        }
    }
}
