//! Histogram construction.
//!
//! Features are processed in parallel; within a feature rows are accumulated
//! sequentially in the order given, so results do not depend on the thread
//! count.

use crate::core::types::{FeatureIndex, GradientPair};
use crate::dataset::binning::{BinnedMatrix, FeatureCuts, MISSING_BIN};
use crate::tree::histogram::{GradStats, NodeHistogram};
use rayon::prelude::*;

/// Builds local node histograms over a binned shard.
#[derive(Debug)]
pub struct HistogramBuilder<'a> {
    cuts: &'a FeatureCuts,
    binned: &'a BinnedMatrix,
}

impl<'a> HistogramBuilder<'a> {
    pub fn new(cuts: &'a FeatureCuts, binned: &'a BinnedMatrix) -> Self {
        HistogramBuilder { cuts, binned }
    }

    /// Histogram of `rows` restricted to `features`; other features stay zero.
    pub fn build(
        &self,
        gpairs: &[GradientPair],
        rows: &[usize],
        features: &[FeatureIndex],
    ) -> NodeHistogram {
        let per_feature: Vec<(FeatureIndex, Vec<GradStats>)> = features
            .par_iter()
            .map(|&f| (f, self.build_feature(f, gpairs, rows)))
            .collect();

        let mut hist = NodeHistogram::zeros(self.cuts.total_slots());
        let slots = hist.slots_mut();
        for (f, bins) in per_feature {
            let offset = self.cuts.offset(f);
            slots[offset..offset + bins.len()].copy_from_slice(&bins);
        }
        hist
    }

    fn build_feature(
        &self,
        feature: FeatureIndex,
        gpairs: &[GradientPair],
        rows: &[usize],
    ) -> Vec<GradStats> {
        let num_bins = self.cuts.num_bins(feature);
        let mut bins = vec![GradStats::default(); num_bins + 1];
        let column = self.binned.feature(feature);
        for &row in rows {
            let bin = column[row];
            let slot = if bin == MISSING_BIN {
                num_bins
            } else {
                bin as usize
            };
            bins[slot].add_pair(gpairs[row]);
        }
        bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::network::LocalCommunicator;
    use ndarray::array;

    #[test]
    fn test_histogram_sums_and_missing_bucket() {
        let ds = Dataset::new(
            array![[1.0, f32::NAN], [2.0, 7.0], [1.0, 7.0], [3.0, f32::NAN]],
            vec![0.0; 4],
        )
        .unwrap();
        let cuts = FeatureCuts::build(&ds, 16, &LocalCommunicator::new()).unwrap();
        let binned = BinnedMatrix::from_dataset(&ds, &cuts).unwrap();
        let gpairs: Vec<GradientPair> = (0..4)
            .map(|i| GradientPair::new(i as f64, 1.0))
            .collect();

        let builder = HistogramBuilder::new(&cuts, &binned);
        let hist = builder.build(&gpairs, &[0, 1, 2, 3], &[0, 1]);

        let f0 = hist.feature(&cuts, 0);
        assert_eq!(f0.len(), 4);
        assert_eq!(f0[0], GradStats::new(2.0, 2.0, 2.0));
        assert_eq!(f0[1], GradStats::new(1.0, 1.0, 1.0));
        assert_eq!(f0[2], GradStats::new(3.0, 1.0, 1.0));
        assert_eq!(f0[3], GradStats::default());

        let f1 = hist.feature(&cuts, 1);
        assert_eq!(f1[0], GradStats::new(3.0, 2.0, 2.0));
        assert_eq!(f1[1], GradStats::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn test_unsampled_features_stay_zero() {
        let ds = Dataset::new(array![[1.0, 2.0], [3.0, 4.0]], vec![0.0, 1.0]).unwrap();
        let cuts = FeatureCuts::build(&ds, 16, &LocalCommunicator::new()).unwrap();
        let binned = BinnedMatrix::from_dataset(&ds, &cuts).unwrap();
        let gpairs = vec![GradientPair::new(1.0, 1.0); 2];
        let hist = HistogramBuilder::new(&cuts, &binned).build(&gpairs, &[0, 1], &[1]);
        assert!(hist.feature(&cuts, 0).iter().all(|s| *s == GradStats::default()));
        assert_eq!(hist.feature(&cuts, 1)[0].count, 1.0);
    }
}
