//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use distgbt::{Dataset, Model};
use ndarray::{Array2, ArrayView2};
use rand::prelude::*;

/// Uniform features in `[-5, 5)`, seeded.
pub fn create_test_features(num_samples: usize, num_features: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_samples, num_features), |_| rng.gen_range(-5.0..5.0))
}

/// Linear target with a step on the first feature.
pub fn regression_dataset(num_samples: usize, num_features: usize, seed: u64) -> Dataset {
    let x = create_test_features(num_samples, num_features, seed);
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let linear: f32 = row
                .iter()
                .enumerate()
                .map(|(j, v)| v * (j + 1) as f32 * 0.1)
                .sum();
            linear + if row[0] > 0.0 { 2.0 } else { 0.0 }
        })
        .collect();
    Dataset::new(x, y).unwrap()
}

/// Labels in {0, 1} from a sign pattern over the features.
pub fn binary_dataset(num_samples: usize, num_features: usize, seed: u64) -> Dataset {
    let x = create_test_features(num_samples, num_features, seed);
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let score: f32 = row
                .iter()
                .enumerate()
                .map(|(j, v)| if j % 2 == 0 { *v } else { -v })
                .sum();
            if score > 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Dataset::new(x, y).unwrap()
}

/// Class given by which third of the range the first feature falls in.
pub fn multiclass_dataset(num_samples: usize, num_features: usize, seed: u64) -> Dataset {
    let x = create_test_features(num_samples, num_features, seed);
    let y = x
        .column(0)
        .iter()
        .map(|&v| {
            if v < -5.0 / 3.0 {
                0.0
            } else if v < 5.0 / 3.0 {
                1.0
            } else {
                2.0
            }
        })
        .collect();
    Dataset::new(x, y).unwrap()
}

/// Query groups of `group_size` rows whose relevance grows with feature 0.
pub fn ranking_dataset(num_groups: usize, group_size: usize, seed: u64) -> Dataset {
    let rows = num_groups * group_size;
    let x = create_test_features(rows, 3, seed);
    let y = x
        .column(0)
        .iter()
        .map(|&v| ((v + 5.0) / 2.5).floor().clamp(0.0, 3.0))
        .collect();
    let qid = (0..rows).map(|r| (r / group_size) as u64).collect();
    Dataset::builder(x).labels(y).qid(qid).build().unwrap()
}

/// Weighted RMSE of the first output against the labels.
pub fn weighted_rmse(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> f64 {
    let (num, den) = (0..dataset.num_rows()).fold((0.0, 0.0), |(num, den), row| {
        let w = dataset.weight(row);
        let diff = predictions[[0, row]] - f64::from(dataset.labels()[row]);
        (num + w * diff * diff, den + w)
    });
    (num / den).sqrt()
}

/// Predictions of two models must agree bit for bit.
pub fn assert_same_predictions(a: &Model, b: &Model, dataset: &Dataset) {
    let pa = a.predict(dataset).unwrap();
    let pb = b.predict(dataset).unwrap();
    assert_eq!(pa.dim(), pb.dim());
    for (x, y) in pa.iter().zip(pb.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}
