//! Training and evaluation datasets.

use crate::core::error::{GbtError, Result};
use crate::core::types::{FeatureValue, Label};
use crate::dataset::matrix::FeatureMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Rows of features with their labels and optional metadata.
///
/// Query groups are stored as boundaries: group `g` spans rows
/// `group_ptr[g]..group_ptr[g + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: FeatureMatrix,
    labels: Array1<Label>,
    weights: Option<Array1<Label>>,
    base_margin: Option<Array2<f64>>,
    group_ptr: Option<Vec<usize>>,
    feature_names: Option<Vec<String>>,
}

impl Dataset {
    /// Create a dataset with only features and labels
    pub fn new<M: Into<FeatureMatrix>>(features: M, labels: Vec<Label>) -> Result<Self> {
        DatasetBuilder::new(features).labels(labels).build()
    }

    pub fn builder<M: Into<FeatureMatrix>>(features: M) -> DatasetBuilder {
        DatasetBuilder::new(features)
    }

    pub fn num_rows(&self) -> usize {
        self.features.num_rows()
    }

    pub fn num_features(&self) -> usize {
        self.features.num_features()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn labels(&self) -> ArrayView1<'_, Label> {
        self.labels.view()
    }

    pub fn weights(&self) -> Option<ArrayView1<'_, Label>> {
        self.weights.as_ref().map(|w| w.view())
    }

    /// Weight of one row, 1 when unweighted.
    pub fn weight(&self, row: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[row] as f64)
    }

    pub fn base_margin(&self) -> Option<ArrayView2<'_, f64>> {
        self.base_margin.as_ref().map(|m| m.view())
    }

    pub fn group_ptr(&self) -> Option<&[usize]> {
        self.group_ptr.as_deref()
    }

    pub fn num_groups(&self) -> usize {
        self.group_ptr.as_ref().map_or(0, |g| g.len() - 1)
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Group index of every row.
    pub fn group_ids(&self) -> Option<Vec<usize>> {
        self.group_ptr.as_ref().map(|ptr| {
            let mut ids = Vec::with_capacity(self.num_rows());
            for (g, window) in ptr.windows(2).enumerate() {
                ids.extend(std::iter::repeat(g).take(window[1] - window[0]));
            }
            ids
        })
    }

    /// New dataset with the given rows, in order.
    ///
    /// Query groups are rebuilt from the selected rows; rows of one group must
    /// stay adjacent in `rows` for the result to keep that group whole.
    pub fn subset(&self, rows: &[usize]) -> Result<Self> {
        let mut builder = DatasetBuilder::new(self.features.select_rows(rows))
            .labels(rows.iter().map(|&r| self.labels[r]).collect());
        if let Some(weights) = &self.weights {
            builder = builder.weights(rows.iter().map(|&r| weights[r]).collect());
        }
        if let Some(margin) = &self.base_margin {
            builder = builder.base_margin(margin.select(Axis(0), rows));
        }
        if let Some(ids) = self.group_ids() {
            builder = builder.qid(rows.iter().map(|&r| ids[r] as u64).collect());
        }
        if let Some(names) = &self.feature_names {
            builder = builder.feature_names(names.clone());
        }
        builder.build()
    }
}

/// Builder assembling and validating a [`Dataset`].
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    features: FeatureMatrix,
    labels: Option<Vec<Label>>,
    weights: Option<Vec<Label>>,
    base_margin: Option<Array2<f64>>,
    qid: Option<Vec<u64>>,
    group_sizes: Option<Vec<usize>>,
    feature_names: Option<Vec<String>>,
}

impl DatasetBuilder {
    pub fn new<M: Into<FeatureMatrix>>(features: M) -> Self {
        DatasetBuilder {
            features: features.into(),
            labels: None,
            weights: None,
            base_margin: None,
            qid: None,
            group_sizes: None,
            feature_names: None,
        }
    }

    pub fn labels(mut self, labels: Vec<Label>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn weights(mut self, weights: Vec<Label>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Per-row initial margins, one column per model output.
    pub fn base_margin(mut self, margin: Array2<f64>) -> Self {
        self.base_margin = Some(margin);
        self
    }

    /// Per-row query id; equal ids must be contiguous.
    pub fn qid(mut self, qid: Vec<u64>) -> Self {
        self.qid = Some(qid);
        self.group_sizes = None;
        self
    }

    /// Query groups given as consecutive group sizes.
    pub fn group_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.group_sizes = Some(sizes);
        self.qid = None;
        self
    }

    pub fn feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn build(self) -> Result<Dataset> {
        let num_rows = self.features.num_rows();
        let labels = self.labels.unwrap_or_default();
        if labels.len() != num_rows {
            return Err(GbtError::dataset(
                "label",
                format!("expected {} labels, got {}", num_rows, labels.len()),
            ));
        }
        if let Some(row) = labels.iter().position(|l| !l.is_finite()) {
            return Err(GbtError::dataset(
                "label",
                format!("row {} has non-finite label {}", row, labels[row]),
            ));
        }

        if let Some(weights) = &self.weights {
            if weights.len() != num_rows {
                return Err(GbtError::dataset(
                    "weight",
                    format!("expected {} weights, got {}", num_rows, weights.len()),
                ));
            }
            if let Some(row) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
                return Err(GbtError::dataset(
                    "weight",
                    format!("row {} has invalid weight {}", row, weights[row]),
                ));
            }
        }

        if let Some(margin) = &self.base_margin {
            if margin.nrows() != num_rows || margin.ncols() == 0 {
                return Err(GbtError::dataset(
                    "base_margin",
                    format!(
                        "expected {} rows with at least one column, got {:?}",
                        num_rows,
                        margin.dim()
                    ),
                ));
            }
        }

        if let Some(names) = &self.feature_names {
            if names.len() != self.features.num_features() {
                return Err(GbtError::dataset(
                    "feature_names",
                    format!(
                        "expected {} names, got {}",
                        self.features.num_features(),
                        names.len()
                    ),
                ));
            }
        }

        let group_ptr = match (&self.qid, &self.group_sizes) {
            (Some(qid), _) => Some(group_ptr_from_qid(qid, num_rows)?),
            (None, Some(sizes)) => Some(group_ptr_from_sizes(sizes, num_rows)?),
            (None, None) => None,
        };

        Ok(Dataset {
            features: self.features,
            labels: Array1::from(labels),
            weights: self.weights.map(Array1::from),
            base_margin: self.base_margin,
            group_ptr,
            feature_names: self.feature_names,
        })
    }
}

fn group_ptr_from_qid(qid: &[u64], num_rows: usize) -> Result<Vec<usize>> {
    if qid.len() != num_rows {
        return Err(GbtError::dataset(
            "qid",
            format!("expected {} query ids, got {}", num_rows, qid.len()),
        ));
    }
    let mut ptr = vec![0];
    let mut seen = std::collections::HashSet::new();
    for (row, window) in qid.windows(2).enumerate() {
        if window[0] != window[1] {
            seen.insert(window[0]);
            if seen.contains(&window[1]) {
                return Err(GbtError::dataset(
                    "qid",
                    format!(
                        "query group {} is not contiguous (reappears at row {})",
                        window[1],
                        row + 1
                    ),
                ));
            }
            ptr.push(row + 1);
        }
    }
    if num_rows > 0 {
        ptr.push(num_rows);
    }
    Ok(ptr)
}

fn group_ptr_from_sizes(sizes: &[usize], num_rows: usize) -> Result<Vec<usize>> {
    if let Some(g) = sizes.iter().position(|&s| s == 0) {
        return Err(GbtError::dataset(
            "group",
            format!("empty query group at position {}", g),
        ));
    }
    let mut ptr = Vec::with_capacity(sizes.len() + 1);
    ptr.push(0);
    for &size in sizes {
        let last = ptr[ptr.len() - 1];
        ptr.push(last + size);
    }
    if ptr[ptr.len() - 1] != num_rows {
        return Err(GbtError::dataset(
            "group",
            format!(
                "group sizes cover {} rows but the dataset has {}",
                ptr[ptr.len() - 1],
                num_rows
            ),
        ));
    }
    Ok(ptr)
}

/// Convenience for tests and callers holding plain row vectors.
pub fn dense_from_rows(rows: &[Vec<FeatureValue>]) -> Result<FeatureMatrix> {
    let num_cols = rows.first().map_or(0, |r| r.len());
    let mut data = Vec::with_capacity(rows.len() * num_cols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != num_cols {
            return Err(GbtError::dataset(
                "features",
                format!("row {} has {} features, expected {}", i, row.len(), num_cols),
            ));
        }
        data.extend_from_slice(row);
    }
    let matrix = Array2::from_shape_vec((rows.len(), num_cols), data)
        .map_err(|e| GbtError::dataset("features", e.to_string()))?;
    Ok(FeatureMatrix::Dense(matrix))
}
