//! Binary logistic and multiclass softmax objectives.

use crate::core::constants::MIN_HESSIAN;
use crate::core::error::{GbtError, Result};
use crate::core::types::GradientPair;
use crate::dataset::Dataset;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Softmax of one row's margins, shifted by the maximum.
pub fn softmax(margins: ArrayView1<'_, f64>) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|&m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Column-wise softmax of an output-major margin matrix.
pub fn softmax_columns(margins: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = Array2::zeros(margins.dim());
    for (i, column) in margins.axis_iter(Axis(1)).enumerate() {
        for (k, p) in softmax(column).into_iter().enumerate() {
            out[[k, i]] = p;
        }
    }
    out
}

pub fn logistic_gradients(
    dataset: &Dataset,
    margins: ArrayView2<'_, f64>,
) -> Result<Array2<GradientPair>> {
    let labels = dataset.labels();
    if let Some((row, y)) = labels
        .iter()
        .enumerate()
        .find(|(_, y)| !(0.0..=1.0).contains(*y))
    {
        return Err(GbtError::dataset(
            "label",
            format!("binary:logistic needs labels in [0, 1], row {} has {}", row, y),
        ));
    }
    Ok(Array2::from_shape_fn(margins.dim(), |(k, i)| {
        let w = dataset.weight(i);
        let p = sigmoid(margins[[k, i]]);
        GradientPair::new(
            w * (p - labels[i] as f64),
            w * (p * (1.0 - p)).max(MIN_HESSIAN),
        )
    }))
}

pub fn softmax_gradients(
    dataset: &Dataset,
    margins: ArrayView2<'_, f64>,
    num_class: usize,
) -> Result<Array2<GradientPair>> {
    let labels = dataset.labels();
    let mut gpairs = Array2::from_elem(margins.dim(), GradientPair::default());
    for (i, column) in margins.axis_iter(Axis(1)).enumerate() {
        let y = labels[i];
        if y < 0.0 || y.fract() != 0.0 || y as usize >= num_class {
            return Err(GbtError::dataset(
                "label",
                format!(
                    "multi:softprob needs integer labels in [0, {}), row {} has {}",
                    num_class, i, y
                ),
            ));
        }
        let class = y as usize;
        let w = dataset.weight(i);
        for (k, p) in softmax(column).into_iter().enumerate() {
            let target = if k == class { 1.0 } else { 0.0 };
            gpairs[[k, i]] =
                GradientPair::new(w * (p - target), w * (2.0 * p * (1.0 - p)).max(MIN_HESSIAN));
        }
    }
    Ok(gpairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_logistic_gradient_at_zero_margin() {
        let ds = Dataset::new(array![[0.0], [1.0]], vec![0.0, 1.0]).unwrap();
        let g = logistic_gradients(&ds, array![[0.0, 0.0]].view()).unwrap();
        assert_relative_eq!(g[[0, 0]].grad, 0.5);
        assert_relative_eq!(g[[0, 1]].grad, -0.5);
        assert_relative_eq!(g[[0, 1]].hess, 0.25);
    }

    #[test]
    fn test_logistic_hessian_is_floored() {
        let ds = Dataset::new(array![[0.0]], vec![1.0]).unwrap();
        let g = logistic_gradients(&ds, array![[800.0]].view()).unwrap();
        assert!(g[[0, 0]].hess >= MIN_HESSIAN);
    }

    #[test]
    fn test_logistic_rejects_out_of_range_labels() {
        let ds = Dataset::new(array![[0.0]], vec![2.0]).unwrap();
        let err = logistic_gradients(&ds, array![[0.0]].view()).unwrap_err();
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_softmax_gradients_sum_to_zero() {
        let ds = Dataset::new(array![[0.0], [1.0]], vec![2.0, 0.0]).unwrap();
        let margins = array![[0.1, 0.5], [0.2, -1.0], [0.3, 0.0]];
        let g = softmax_gradients(&ds, margins.view(), 3).unwrap();
        for i in 0..2 {
            let total: f64 = (0..3).map(|k| g[[k, i]].grad).sum();
            assert_relative_eq!(total, 0.0, epsilon = 1e-12);
        }
        assert!(g[[2, 0]].grad < 0.0);
        assert!(g[[0, 1]].grad < 0.0);
    }

    #[test]
    fn test_softmax_rejects_unknown_class() {
        let ds = Dataset::new(array![[0.0]], vec![3.0]).unwrap();
        assert!(softmax_gradients(&ds, array![[0.0], [0.0], [0.0]].view(), 3).is_err());
        let fractional = Dataset::new(array![[0.0]], vec![0.5]).unwrap();
        assert!(softmax_gradients(&fractional, array![[0.0], [0.0]].view(), 2).is_err());
    }

    #[test]
    fn test_softmax_columns_normalize() {
        let probs = softmax_columns(array![[1.0, 0.0], [1.0, 1000.0]].view());
        assert_relative_eq!(probs[[0, 0]], 0.5);
        assert_relative_eq!(probs[[1, 1]], 1.0);
        assert_relative_eq!(logit(sigmoid(0.7)), 0.7, epsilon = 1e-12);
    }
}
