//! Ranking metrics, averaged over query groups.

use crate::core::error::Result;
use crate::dataset::Dataset;
use crate::objective::ranking::{dcg, ideal_dcg, rank_by_score, require_groups};
use ndarray::ArrayView2;

/// Per-group metric values summed, with the number of groups.
fn group_sums<F>(
    dataset: &Dataset,
    predictions: ArrayView2<'_, f64>,
    per_group: F,
) -> Result<[f64; 2]>
where
    F: Fn(&[f64], &[usize]) -> f64,
{
    let group_ptr = require_groups(dataset)?;
    let labels = dataset.labels();
    let scores = predictions.row(0);
    let mut sums = [0.0; 2];
    for bounds in group_ptr.windows(2) {
        let (start, end) = (bounds[0], bounds[1]);
        let group_labels: Vec<f64> = (start..end).map(|i| labels[i] as f64).collect();
        let group_scores: Vec<f64> = (start..end).map(|i| scores[i]).collect();
        sums[0] += per_group(&group_labels, &rank_by_score(&group_scores));
        sums[1] += 1.0;
    }
    Ok(sums)
}

/// NDCG@k; a group without relevant documents scores 1.
pub fn ndcg_sums(
    dataset: &Dataset,
    predictions: ArrayView2<'_, f64>,
    k: Option<usize>,
) -> Result<[f64; 2]> {
    group_sums(dataset, predictions, |labels, order| {
        let ideal = ideal_dcg(labels, k);
        if ideal <= 0.0 {
            return 1.0;
        }
        dcg(order.iter().map(|&doc| labels[doc]), k) / ideal
    })
}

/// Average precision at k, relevant meaning label > 0. A group without
/// relevant documents scores 1.
pub fn map_sums(
    dataset: &Dataset,
    predictions: ArrayView2<'_, f64>,
    k: Option<usize>,
) -> Result<[f64; 2]> {
    group_sums(dataset, predictions, |labels, order| {
        let relevant = labels.iter().filter(|&&y| y > 0.0).count();
        if relevant == 0 {
            return 1.0;
        }
        let cutoff = k.unwrap_or(usize::MAX);
        let mut hits = 0;
        let mut precision_sum = 0.0;
        for (pos, &doc) in order.iter().take(cutoff).enumerate() {
            if labels[doc] > 0.0 {
                hits += 1;
                precision_sum += hits as f64 / (pos + 1) as f64;
            }
        }
        precision_sum / relevant.min(cutoff) as f64
    })
}
