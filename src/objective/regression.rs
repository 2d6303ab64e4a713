//! Squared error regression.

use crate::core::error::Result;
use crate::core::types::GradientPair;
use crate::dataset::Dataset;
use crate::network::Communicator;
use ndarray::{Array2, ArrayView2};

/// `g = w (m - y)`, `h = w`.
pub fn squared_error_gradients(
    dataset: &Dataset,
    margins: ArrayView2<'_, f64>,
) -> Array2<GradientPair> {
    let labels = dataset.labels();
    Array2::from_shape_fn(margins.dim(), |(k, i)| {
        let w = dataset.weight(i);
        GradientPair::new(w * (margins[[k, i]] - labels[i] as f64), w)
    })
}

/// Weighted mean label over every worker's shard, 0 when there is no weight.
pub fn weighted_label_mean<C: Communicator + ?Sized>(dataset: &Dataset, comm: &C) -> Result<f64> {
    let labels = dataset.labels();
    let mut sums = [0.0f64; 2];
    for (i, &y) in labels.iter().enumerate() {
        let w = dataset.weight(i);
        sums[0] += w * y as f64;
        sums[1] += w;
    }
    comm.allreduce_sum(&mut sums)?;
    Ok(if sums[1] > 0.0 { sums[0] / sums[1] } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::LocalCommunicator;
    use ndarray::array;

    #[test]
    fn test_weighted_gradients() {
        let ds = Dataset::builder(array![[0.0], [1.0]])
            .labels(vec![1.0, 3.0])
            .weights(vec![1.0, 2.0])
            .build()
            .unwrap();
        let g = squared_error_gradients(&ds, array![[2.0, 2.0]].view());
        assert_eq!(g[[0, 0]], GradientPair::new(1.0, 1.0));
        assert_eq!(g[[0, 1]], GradientPair::new(-2.0, 2.0));
    }

    #[test]
    fn test_empty_shard_mean_is_zero() {
        let ds = Dataset::new(Array2::<f32>::zeros((0, 2)), vec![]).unwrap();
        assert_eq!(weighted_label_mean(&ds, &LocalCommunicator::new()).unwrap(), 0.0);
    }
}
