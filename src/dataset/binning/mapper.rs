//! Bin mapper implementation for feature discretization.
//!
//! A mapper holds the cut values of one feature. A value falls into the bin of
//! the first cut strictly greater than it, so a split at bin `b` sends a row
//! left exactly when `value < cuts[b]`.

use crate::core::types::{BinIndex, FeatureValue};
use crate::dataset::binning::sketch::WeightedSummary;
use serde::{Deserialize, Serialize};

/// Bin index of missing values.
pub const MISSING_BIN: BinIndex = BinIndex::MAX;

/// Cut values of one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    /// Exclusive upper bound of every bin, strictly increasing
    upper_bounds: Vec<FeatureValue>,
}

/// Smallest cut guaranteed to lie above `max`.
fn cut_above(max: FeatureValue) -> FeatureValue {
    let bumped = max as f64 + (max.abs() as f64 + 1e-5);
    bumped as FeatureValue
}

impl BinMapper {
    /// Derive cuts from a merged summary.
    ///
    /// Features with at most `max_bin` distinct values get one bin per value.
    /// Otherwise interior cuts sit at evenly spaced weighted quantiles.
    pub fn from_summary(summary: &WeightedSummary, max_bin: usize) -> Self {
        let entries = summary.entries();
        let Some(last) = entries.last() else {
            return BinMapper::default();
        };

        let mut upper_bounds: Vec<FeatureValue> = if entries.len() <= max_bin {
            entries[1..].iter().map(|e| e.value).collect()
        } else {
            let ranks = summary.cumulative_ranks();
            let total = ranks[ranks.len() - 1];
            let mut cuts: Vec<FeatureValue> = Vec::with_capacity(max_bin);
            let mut idx = 1;
            for j in 1..max_bin {
                let target = total * j as f64 / max_bin as f64;
                // first entry whose exclusive prefix reaches the target
                while idx < entries.len() - 1 && ranks[idx - 1] < target {
                    idx += 1;
                }
                let value = entries[idx].value;
                if cuts.last().map_or(true, |&c| c < value) {
                    cuts.push(value);
                }
            }
            cuts
        };
        upper_bounds.push(cut_above(last.value));

        BinMapper { upper_bounds }
    }

    /// Construct from explicit cuts; used when loading or in tests.
    pub fn from_cuts(upper_bounds: Vec<FeatureValue>) -> Self {
        BinMapper { upper_bounds }
    }

    pub fn num_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    pub fn upper_bounds(&self) -> &[FeatureValue] {
        &self.upper_bounds
    }

    /// Bin of a present value; values beyond the last cut clamp to the last bin.
    pub fn value_to_bin(&self, value: FeatureValue) -> BinIndex {
        if self.upper_bounds.is_empty() {
            return MISSING_BIN;
        }
        let idx = self.upper_bounds.partition_point(|&cut| cut <= value);
        idx.min(self.upper_bounds.len() - 1) as BinIndex
    }

    /// Split threshold of bin `bin`.
    pub fn threshold(&self, bin: BinIndex) -> FeatureValue {
        self.upper_bounds[bin as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(values: &[f32]) -> WeightedSummary {
        WeightedSummary::from_values(values.iter().map(|&v| (v, 1.0)).collect(), 1024)
    }

    #[test]
    fn test_exact_cuts_for_low_cardinality() {
        let mapper = BinMapper::from_summary(&summary(&[3.0, 1.0, 2.0, 2.0]), 16);
        assert_eq!(mapper.num_bins(), 3);
        assert_eq!(&mapper.upper_bounds()[..2], &[2.0, 3.0]);
        assert!(mapper.upper_bounds()[2] > 3.0);
        assert_eq!(mapper.value_to_bin(1.0), 0);
        assert_eq!(mapper.value_to_bin(2.0), 1);
        assert_eq!(mapper.value_to_bin(3.0), 2);
    }

    #[test]
    fn test_routing_matches_threshold() {
        let values: Vec<f32> = (0..500).map(|i| (i as f32 * 0.37).sin()).collect();
        let mapper = BinMapper::from_summary(&summary(&values), 32);
        assert!(mapper.num_bins() <= 32);
        for &v in &values {
            let bin = mapper.value_to_bin(v);
            for split in 0..mapper.num_bins() as BinIndex {
                assert_eq!(bin <= split, v < mapper.threshold(split));
            }
        }
    }

    #[test]
    fn test_quantile_cuts_follow_weights() {
        // all the weight sits on the high values
        let values: Vec<(f32, f64)> = (0..100)
            .map(|i| (i as f32, if i >= 90 { 100.0 } else { 0.01 }))
            .collect();
        let s = WeightedSummary::from_values(values, 1024);
        let mapper = BinMapper::from_summary(&s, 4);
        assert!(mapper.upper_bounds()[0] >= 90.0);
    }

    #[test]
    fn test_empty_feature_has_no_bins() {
        let mapper = BinMapper::from_summary(&WeightedSummary::default(), 16);
        assert_eq!(mapper.num_bins(), 0);
        assert_eq!(mapper.value_to_bin(1.0), MISSING_BIN);
    }

    #[test]
    fn test_constant_feature_single_bin() {
        let mapper = BinMapper::from_summary(&summary(&[-5.0, -5.0]), 16);
        assert_eq!(mapper.num_bins(), 1);
        assert!(mapper.threshold(0) > -5.0);
    }
}
