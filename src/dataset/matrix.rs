//! Dense and CSR feature matrices.
//!
//! Missing values are `NaN` in dense storage and absent entries in sparse
//! storage. Both surface as `None` from [`FeatureMatrix::value`].

use crate::core::error::{GbtError, Result};
use crate::core::types::FeatureValue;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<FeatureValue>,
    num_cols: usize,
}

impl CsrMatrix {
    /// Create a CSR matrix, checking the structural invariants.
    ///
    /// Column indices must be strictly increasing within each row.
    pub fn new(
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<FeatureValue>,
        num_cols: usize,
    ) -> Result<Self> {
        if indptr.first() != Some(&0) {
            return Err(GbtError::dataset("features", "indptr must start at 0"));
        }
        if indices.len() != values.len() || indptr.last() != Some(&indices.len()) {
            return Err(GbtError::dataset(
                "features",
                format!(
                    "indptr ends at {:?} but there are {} indices and {} values",
                    indptr.last(),
                    indices.len(),
                    values.len()
                ),
            ));
        }
        for (row, window) in indptr.windows(2).enumerate() {
            if window[0] > window[1] {
                return Err(GbtError::dataset(
                    "features",
                    format!("indptr decreases at row {}", row),
                ));
            }
            let cols = &indices[window[0]..window[1]];
            if cols.windows(2).any(|c| c[0] >= c[1]) {
                return Err(GbtError::dataset(
                    "features",
                    format!("column indices of row {} are not strictly increasing", row),
                ));
            }
            if let Some(&col) = cols.last() {
                if col >= num_cols {
                    return Err(GbtError::dimension_mismatch(0, num_cols, col + 1));
                }
            }
        }
        Ok(CsrMatrix {
            indptr,
            indices,
            values,
            num_cols,
        })
    }

    /// Build a CSR matrix from per-row `(column, value)` lists.
    pub fn from_rows(rows: &[Vec<(usize, FeatureValue)>], num_cols: usize) -> Result<Self> {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for row in rows {
            for &(col, value) in row {
                indices.push(col);
                values.push(value);
            }
            indptr.push(indices.len());
        }
        CsrMatrix::new(indptr, indices, values, num_cols)
    }

    pub fn num_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Stored entries of one row.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, FeatureValue)> + '_ {
        let range = self.indptr[row]..self.indptr[row + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    fn get(&self, row: usize, col: usize) -> Option<FeatureValue> {
        let range = self.indptr[row]..self.indptr[row + 1];
        self.indices[range.clone()]
            .binary_search(&col)
            .ok()
            .map(|pos| self.values[range.start + pos])
    }

    fn select_rows(&self, rows: &[usize]) -> CsrMatrix {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for &row in rows {
            let range = self.indptr[row]..self.indptr[row + 1];
            indices.extend_from_slice(&self.indices[range.clone()]);
            values.extend_from_slice(&self.values[range]);
            indptr.push(indices.len());
        }
        CsrMatrix {
            indptr,
            indices,
            values,
            num_cols: self.num_cols,
        }
    }
}

/// Row-major feature storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureMatrix {
    Dense(Array2<FeatureValue>),
    Sparse(CsrMatrix),
}

impl FeatureMatrix {
    pub fn num_rows(&self) -> usize {
        match self {
            FeatureMatrix::Dense(m) => m.nrows(),
            FeatureMatrix::Sparse(m) => m.num_rows(),
        }
    }

    pub fn num_features(&self) -> usize {
        match self {
            FeatureMatrix::Dense(m) => m.ncols(),
            FeatureMatrix::Sparse(m) => m.num_cols(),
        }
    }

    /// Value at `(row, col)`, `None` when missing.
    pub fn value(&self, row: usize, col: usize) -> Option<FeatureValue> {
        match self {
            FeatureMatrix::Dense(m) => {
                let v = m[[row, col]];
                if v.is_nan() {
                    None
                } else {
                    Some(v)
                }
            }
            FeatureMatrix::Sparse(m) => m.get(row, col).filter(|v| !v.is_nan()),
        }
    }

    /// Call `f(col, value)` for every present value of `row`, in column order.
    pub fn for_each_present<F: FnMut(usize, FeatureValue)>(&self, row: usize, mut f: F) {
        match self {
            FeatureMatrix::Dense(m) => {
                for (col, &v) in m.row(row).iter().enumerate() {
                    if !v.is_nan() {
                        f(col, v);
                    }
                }
            }
            FeatureMatrix::Sparse(m) => {
                for (col, v) in m.row(row) {
                    if !v.is_nan() {
                        f(col, v);
                    }
                }
            }
        }
    }

    /// Dense copy of one row with `NaN` for missing values.
    pub fn dense_row(&self, row: usize) -> Vec<FeatureValue> {
        match self {
            FeatureMatrix::Dense(m) => m.row(row).to_vec(),
            FeatureMatrix::Sparse(m) => {
                let mut out = vec![FeatureValue::NAN; m.num_cols()];
                for (col, v) in m.row(row) {
                    out[col] = v;
                }
                out
            }
        }
    }

    /// New matrix holding the given rows in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        match self {
            FeatureMatrix::Dense(m) => FeatureMatrix::Dense(m.select(Axis(0), rows)),
            FeatureMatrix::Sparse(m) => FeatureMatrix::Sparse(m.select_rows(rows)),
        }
    }
}

impl From<Array2<FeatureValue>> for FeatureMatrix {
    fn from(m: Array2<FeatureValue>) -> Self {
        FeatureMatrix::Dense(m)
    }
}

impl From<CsrMatrix> for FeatureMatrix {
    fn from(m: CsrMatrix) -> Self {
        FeatureMatrix::Sparse(m)
    }
}
