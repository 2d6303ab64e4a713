//! Best split search over a reduced node histogram.
//!
//! Candidates are visited feature by feature in ascending order, bins in
//! ascending order, missing-left before missing-right. A candidate replaces
//! the incumbent only on strictly greater gain, which makes the earliest
//! (feature, bin, direction) win every tie. Because the input histogram is the
//! same on every worker, so is the result.

use crate::core::types::{BinIndex, FeatureIndex, FeatureValue};
use crate::dataset::binning::FeatureCuts;
use crate::tree::histogram::{GradStats, NodeHistogram};
use crate::tree::split::evaluator::SplitParams;

/// Best split found for a node.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    pub feature: FeatureIndex,
    pub split_bin: BinIndex,
    pub threshold: FeatureValue,
    pub default_left: bool,
    pub gain: f64,
    pub left: GradStats,
    pub right: GradStats,
}

/// Split search over the sampled features of one tree.
#[derive(Debug)]
pub struct SplitFinder<'a> {
    cuts: &'a FeatureCuts,
    params: &'a SplitParams,
}

impl<'a> SplitFinder<'a> {
    pub fn new(cuts: &'a FeatureCuts, params: &'a SplitParams) -> Self {
        SplitFinder { cuts, params }
    }

    /// Best split with positive net gain, if any.
    pub fn find_best(
        &self,
        hist: &NodeHistogram,
        node: &GradStats,
        features: &[FeatureIndex],
    ) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        for &feature in features {
            let Some(candidate) = self.best_for_feature(hist, node, feature) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_for_feature(
        &self,
        hist: &NodeHistogram,
        node: &GradStats,
        feature: FeatureIndex,
    ) -> Option<SplitCandidate> {
        let num_bins = self.cuts.num_bins(feature);
        if num_bins == 0 {
            return None;
        }
        let slots = hist.feature(self.cuts, feature);
        let missing = slots[num_bins];

        let mut best: Option<SplitCandidate> = None;
        let mut prefix = GradStats::default();
        for (bin, stats) in slots[..num_bins].iter().enumerate() {
            prefix += *stats;
            for default_left in [true, false] {
                let left = if default_left { prefix + missing } else { prefix };
                let right = *node - left;
                if !self.params.child_ok(&left) || !self.params.child_ok(&right) {
                    continue;
                }
                let gain = self.params.split_gain(&left, &right, node);
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        split_bin: bin as BinIndex,
                        threshold: self.cuts.mapper(feature).threshold(bin as BinIndex),
                        default_left,
                        gain,
                        left,
                        right,
                    });
                }
            }
        }
        best
    }
}
