//! Pairwise and NDCG-weighted learning to rank.
//!
//! Pairs are formed only inside a query group, so the gradients of one group
//! never depend on another group's labels or scores.

use crate::core::constants::MIN_HESSIAN;
use crate::core::error::{GbtError, Result};
use crate::core::types::GradientPair;
use crate::dataset::Dataset;
use ndarray::{Array2, ArrayView2};

/// DCG gain of a relevance label, `2^y - 1`.
#[inline]
pub fn relevance_gain(label: f64) -> f64 {
    label.exp2() - 1.0
}

/// DCG discount of a zero-based rank position.
#[inline]
pub fn discount(position: usize) -> f64 {
    1.0 / ((position + 2) as f64).log2()
}

/// DCG of labels already listed in ranked order, truncated at `k`.
pub fn dcg(ranked_labels: impl IntoIterator<Item = f64>, k: Option<usize>) -> f64 {
    ranked_labels
        .into_iter()
        .take(k.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(pos, y)| relevance_gain(y) * discount(pos))
        .sum()
}

/// DCG of the best possible ordering.
pub fn ideal_dcg(labels: &[f64], k: Option<usize>) -> f64 {
    let mut sorted = labels.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    dcg(sorted, k)
}

/// Positions of a group's documents ordered by descending score; equal
/// scores keep their row order.
pub fn rank_by_score(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Group boundaries of a ranking dataset. An empty shard has no groups.
pub fn require_groups(dataset: &Dataset) -> Result<&[usize]> {
    static NO_GROUPS: [usize; 1] = [0];
    if dataset.is_empty() {
        return Ok(dataset.group_ptr().unwrap_or(&NO_GROUPS));
    }
    dataset.group_ptr().ok_or_else(|| {
        GbtError::dataset("qid", "ranking objectives need query groups on every shard")
    })
}

/// LambdaRank style gradients. With `ndcg_weighted` every pair is scaled by
/// the NDCG change of swapping the two documents.
pub fn lambda_gradients(
    dataset: &Dataset,
    margins: ArrayView2<'_, f64>,
    ndcg_weighted: bool,
) -> Result<Array2<GradientPair>> {
    let group_ptr = require_groups(dataset)?;
    let labels = dataset.labels();
    let mut gpairs = Array2::from_elem(margins.dim(), GradientPair::default());

    for bounds in group_ptr.windows(2) {
        let (start, end) = (bounds[0], bounds[1]);
        if end - start < 2 {
            continue;
        }
        let group_labels: Vec<f64> = (start..end).map(|i| labels[i] as f64).collect();
        let scores: Vec<f64> = (start..end).map(|i| margins[[0, i]]).collect();

        let idcg = if ndcg_weighted {
            ideal_dcg(&group_labels, None)
        } else {
            1.0
        };
        if idcg <= 0.0 {
            continue;
        }
        let order = rank_by_score(&scores);
        let mut position = vec![0; order.len()];
        for (pos, &doc) in order.iter().enumerate() {
            position[doc] = pos;
        }

        for hi in 0..group_labels.len() {
            for lo in 0..group_labels.len() {
                if group_labels[hi] <= group_labels[lo] {
                    continue;
                }
                let delta = if ndcg_weighted {
                    ((relevance_gain(group_labels[hi]) - relevance_gain(group_labels[lo]))
                        * (discount(position[hi]) - discount(position[lo]))
                        / idcg)
                        .abs()
                } else {
                    1.0
                };
                let (row_hi, row_lo) = (start + hi, start + lo);
                let pair_weight = 0.5 * (dataset.weight(row_hi) + dataset.weight(row_lo));
                let rho = 1.0 / (1.0 + (scores[hi] - scores[lo]).exp());
                let grad = rho * delta * pair_weight;
                let hess = (rho * (1.0 - rho)).max(MIN_HESSIAN) * delta * pair_weight;

                gpairs[[0, row_hi]].grad -= grad;
                gpairs[[0, row_lo]].grad += grad;
                gpairs[[0, row_hi]].hess += hess;
                gpairs[[0, row_lo]].hess += hess;
            }
        }
    }
    Ok(gpairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn ranking_set(labels: Vec<f32>, sizes: Vec<usize>) -> Dataset {
        let n = labels.len();
        Dataset::builder(Array2::<f32>::zeros((n, 1)))
            .labels(labels)
            .group_sizes(sizes)
            .build()
            .unwrap()
    }

    #[test]
    fn test_relevant_document_is_pushed_up() {
        let ds = ranking_set(vec![0.0, 1.0], vec![2]);
        let g = lambda_gradients(&ds, array![[0.0, 0.0]].view(), false).unwrap();
        assert_relative_eq!(g[[0, 1]].grad, -0.5);
        assert_relative_eq!(g[[0, 0]].grad, 0.5);
        assert_relative_eq!(g[[0, 0]].hess, 0.25);
    }

    #[test]
    fn test_groups_are_independent() {
        let margins = array![[0.3, -0.2, 0.1, 0.5, 0.0]];
        let a = ranking_set(vec![1.0, 0.0, 2.0, 0.0, 1.0], vec![2, 3]);
        let b = ranking_set(vec![0.0, 1.0, 2.0, 0.0, 1.0], vec![2, 3]);
        for ndcg in [false, true] {
            let ga = lambda_gradients(&a, margins.view(), ndcg).unwrap();
            let gb = lambda_gradients(&b, margins.view(), ndcg).unwrap();
            for i in 2..5 {
                assert_eq!(ga[[0, i]], gb[[0, i]]);
            }
            assert_ne!(ga[[0, 0]], gb[[0, 0]]);
        }
    }

    #[test]
    fn test_ndcg_skips_groups_without_relevance() {
        let ds = ranking_set(vec![0.0, 0.0, 0.0], vec![3]);
        let g = lambda_gradients(&ds, array![[1.0, 2.0, 3.0]].view(), true).unwrap();
        assert!(g.iter().all(|p| *p == GradientPair::default()));
    }

    #[test]
    fn test_missing_groups_is_a_data_error() {
        let ds = Dataset::new(array![[0.0], [1.0]], vec![0.0, 1.0]).unwrap();
        let err = lambda_gradients(&ds, array![[0.0, 0.0]].view(), true).unwrap_err();
        assert!(err.to_string().contains("qid"));
    }

    #[test]
    fn test_dcg_helpers() {
        assert_relative_eq!(dcg([1.0, 0.0], None), 1.0);
        assert_relative_eq!(ideal_dcg(&[0.0, 1.0], None), 1.0);
        assert_relative_eq!(dcg([0.0, 1.0], None), 1.0 / 3f64.log2());
        assert_eq!(rank_by_score(&[0.5, 2.0, 0.5]), vec![1, 0, 2]);
    }
}
