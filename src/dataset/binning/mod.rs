//! Feature binning for histogram construction.
//!
//! Cuts are derived from weighted quantile summaries that every worker builds
//! over its own shard. The summaries are all-gathered and merged in rank
//! order, so each worker derives identical [`FeatureCuts`] and can bin its rows
//! into a [`BinnedMatrix`].

pub mod mapper;
pub mod sketch;

pub use mapper::{BinMapper, MISSING_BIN};
pub use sketch::{SummaryEntry, WeightedSummary};

use crate::core::constants::SKETCH_OVERSAMPLE;
use crate::core::error::{GbtError, Result};
use crate::core::types::{BinIndex, FeatureIndex, FeatureValue};
use crate::dataset::dataset::Dataset;
use crate::network::Communicator;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Cut values of every feature plus the flat histogram layout they imply.
///
/// In a flat histogram feature `f` owns `num_bins(f) + 1` slots starting at
/// `offset(f)`; the last slot is its missing bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCuts {
    mappers: Vec<BinMapper>,
    offsets: Vec<usize>,
}

impl FeatureCuts {
    pub fn new(mappers: Vec<BinMapper>) -> Self {
        let mut offsets = Vec::with_capacity(mappers.len() + 1);
        let mut acc = 0;
        offsets.push(0);
        for m in &mappers {
            acc += m.num_bins() + 1;
            offsets.push(acc);
        }
        FeatureCuts { mappers, offsets }
    }

    /// Build cuts for a dataset sharded over the workers of `comm`.
    pub fn build<C: Communicator + ?Sized>(
        dataset: &Dataset,
        max_bin: usize,
        comm: &C,
    ) -> Result<Self> {
        let num_features = dataset.num_features();
        let limit = max_bin * SKETCH_OVERSAMPLE;

        let mut columns: Vec<Vec<(FeatureValue, f64)>> = vec![Vec::new(); num_features];
        for row in 0..dataset.num_rows() {
            let weight = dataset.weight(row);
            dataset
                .features()
                .for_each_present(row, |col, v| columns[col].push((v, weight)));
        }

        let mut flat = Vec::new();
        for values in columns {
            WeightedSummary::from_values(values, limit).write_flat(&mut flat);
        }

        let gathered = comm.allgather(flat)?;
        let mut positions = vec![0usize; gathered.len()];
        let mut mappers = Vec::with_capacity(num_features);
        for _ in 0..num_features {
            let parts = gathered
                .iter()
                .zip(positions.iter_mut())
                .map(|(data, pos)| WeightedSummary::read_flat(data, pos))
                .collect::<Result<Vec<_>>>()?;
            let merged = WeightedSummary::merge(&parts, limit);
            mappers.push(BinMapper::from_summary(&merged, max_bin));
        }

        let cuts = FeatureCuts::new(mappers);
        log::debug!(
            "Built cuts for {} features, {} histogram slots",
            num_features,
            cuts.total_slots()
        );
        Ok(cuts)
    }

    pub fn num_features(&self) -> usize {
        self.mappers.len()
    }

    pub fn mapper(&self, feature: FeatureIndex) -> &BinMapper {
        &self.mappers[feature]
    }

    pub fn num_bins(&self, feature: FeatureIndex) -> usize {
        self.mappers[feature].num_bins()
    }

    pub fn offset(&self, feature: FeatureIndex) -> usize {
        self.offsets[feature]
    }

    /// Slot of the missing bucket of `feature`.
    pub fn missing_slot(&self, feature: FeatureIndex) -> usize {
        self.offsets[feature + 1] - 1
    }

    pub fn total_slots(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }
}

/// Bin indices of a shard, stored feature-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedMatrix {
    bins: Array2<BinIndex>,
}

impl BinnedMatrix {
    pub fn from_dataset(dataset: &Dataset, cuts: &FeatureCuts) -> Result<Self> {
        if dataset.num_features() != cuts.num_features() {
            return Err(GbtError::dimension_mismatch(
                0,
                cuts.num_features(),
                dataset.num_features(),
            ));
        }
        let mut bins = Array2::from_elem((dataset.num_features(), dataset.num_rows()), MISSING_BIN);
        for row in 0..dataset.num_rows() {
            dataset.features().for_each_present(row, |col, v| {
                bins[[col, row]] = cuts.mapper(col).value_to_bin(v);
            });
        }
        Ok(BinnedMatrix { bins })
    }

    pub fn num_rows(&self) -> usize {
        self.bins.ncols()
    }

    pub fn num_features(&self) -> usize {
        self.bins.nrows()
    }

    /// Bins of one feature for all rows.
    pub fn feature(&self, feature: FeatureIndex) -> ArrayView1<'_, BinIndex> {
        self.bins.row(feature)
    }

    pub fn bin(&self, row: usize, feature: FeatureIndex) -> BinIndex {
        self.bins[[feature, row]]
    }
}
