//! Classification metrics.

use crate::core::constants::PROB_EPSILON;
use crate::core::error::Result;
use crate::dataset::Dataset;
use crate::network::Communicator;
use ndarray::{ArrayView2, Axis};

#[inline]
fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
}

pub fn logloss_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    let labels = dataset.labels();
    let mut sums = [0.0; 2];
    for (i, &p) in predictions.row(0).iter().enumerate() {
        let w = dataset.weight(i);
        let y = labels[i] as f64;
        let p = clamp_prob(p);
        sums[0] -= w * (y * p.ln() + (1.0 - y) * (1.0 - p).ln());
        sums[1] += w;
    }
    sums
}

pub fn error_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    let labels = dataset.labels();
    let mut sums = [0.0; 2];
    for (i, &p) in predictions.row(0).iter().enumerate() {
        let w = dataset.weight(i);
        if (p > 0.5) != (labels[i] > 0.5) {
            sums[0] += w;
        }
        sums[1] += w;
    }
    sums
}

pub fn mlogloss_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    let labels = dataset.labels();
    let mut sums = [0.0; 2];
    for (i, column) in predictions.axis_iter(Axis(1)).enumerate() {
        let w = dataset.weight(i);
        let p = column.get(labels[i] as usize).copied().unwrap_or(0.0);
        sums[0] -= w * clamp_prob(p).ln();
        sums[1] += w;
    }
    sums
}

/// Rows whose first most probable class differs from the label.
pub fn merror_sums(dataset: &Dataset, predictions: ArrayView2<'_, f64>) -> [f64; 2] {
    let labels = dataset.labels();
    let mut sums = [0.0; 2];
    for (i, column) in predictions.axis_iter(Axis(1)).enumerate() {
        let w = dataset.weight(i);
        let mut best = 0;
        for (k, &p) in column.iter().enumerate() {
            if p > column[best] {
                best = k;
            }
        }
        if best as f32 != labels[i] {
            sums[0] += w;
        }
        sums[1] += w;
    }
    sums
}

/// Weighted ROC AUC of `(score, label, weight)` triples; equal scores
/// contribute half. `None` when only one class carries weight.
pub fn weighted_auc(mut rows: Vec<(f64, f64, f64)>) -> Option<f64> {
    rows.sort_by(|a, b| b.0.total_cmp(&a.0));
    let (mut tp, mut fp, mut area) = (0.0, 0.0, 0.0);
    let mut i = 0;
    while i < rows.len() {
        let (mut pos, mut neg) = (0.0, 0.0);
        let score = rows[i].0;
        while i < rows.len() && rows[i].0 == score {
            let (_, y, w) = rows[i];
            if y > 0.5 {
                pos += w;
            } else {
                neg += w;
            }
            i += 1;
        }
        area += neg * (tp + 0.5 * pos);
        tp += pos;
        fp += neg;
    }
    if tp > 0.0 && fp > 0.0 {
        Some(area / (tp * fp))
    } else {
        None
    }
}

/// AUC over the rows of every worker.
pub fn distributed_auc<C: Communicator + ?Sized>(
    dataset: &Dataset,
    predictions: ArrayView2<'_, f64>,
    comm: &C,
) -> Result<f64> {
    let labels = dataset.labels();
    let mut local = Vec::with_capacity(3 * dataset.num_rows());
    for (i, &p) in predictions.row(0).iter().enumerate() {
        local.extend_from_slice(&[p, labels[i] as f64, dataset.weight(i)]);
    }
    let gathered = comm.allgather(local)?;
    let rows: Vec<(f64, f64, f64)> = gathered
        .iter()
        .flat_map(|part| part.chunks_exact(3).map(|c| (c[0], c[1], c[2])))
        .collect();
    Ok(weighted_auc(rows).unwrap_or_else(|| {
        log::warn!("AUC is undefined when only one class is present, reporting 0.5");
        0.5
    }))
}
