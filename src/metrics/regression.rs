//! Regression metrics as `(weighted sum, total weight)` partials.

use crate::dataset::Dataset;
use ndarray::ArrayView2;

fn weighted_sums<F>(dataset: &Dataset, predictions: ArrayView2<'_, f64>, loss: F) -> [f64; 2]
where
    F: Fn(f64, f64) -> f64,
{
    let labels = dataset.labels();
    let mut sums = [0.0; 2];
    for (i, &p) in predictions.row(0).iter().enumerate() {
        let w = dataset.weight(i);
        sums[0] += w * loss(p, labels[i] as f64);
        sums[1] += w;
    }
    sums
}

pub fn squared_error_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    weighted_sums(dataset, predictions, |p, y| (p - y) * (p - y))
}

pub fn absolute_error_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    weighted_sums(dataset, predictions, |p, y| (p - y).abs())
}
