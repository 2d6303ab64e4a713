//! Gradient histograms.
//!
//! A [`NodeHistogram`] holds one [`GradStats`] slot per (feature, bin) plus a
//! missing bucket per feature, laid out as described by
//! [`FeatureCuts`](crate::dataset::FeatureCuts). Histograms are flattened to
//! plain `f64` buffers for the all-reduce.

pub mod builder;

pub use builder::HistogramBuilder;

use crate::core::error::{GbtError, Result};
use crate::core::types::{FeatureIndex, GradientPair, Hist};
use crate::dataset::binning::FeatureCuts;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// Accumulated gradient statistics of a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradStats {
    pub grad: Hist,
    pub hess: Hist,
    /// Number of rows, kept as a float so it travels with the sums
    pub count: Hist,
}

impl GradStats {
    pub fn new(grad: Hist, hess: Hist, count: Hist) -> Self {
        GradStats { grad, hess, count }
    }

    #[inline]
    pub fn add_pair(&mut self, pair: GradientPair) {
        self.grad += pair.grad;
        self.hess += pair.hess;
        self.count += 1.0;
    }

    /// Sum over the given rows.
    pub fn from_rows(gpairs: &[GradientPair], rows: &[usize]) -> Self {
        let mut stats = GradStats::default();
        for &row in rows {
            stats.add_pair(gpairs[row]);
        }
        stats
    }

    pub fn to_array(self) -> [Hist; 3] {
        [self.grad, self.hess, self.count]
    }

    pub fn from_slice(values: &[Hist]) -> Self {
        GradStats::new(values[0], values[1], values[2])
    }
}

impl Add for GradStats {
    type Output = GradStats;

    fn add(self, rhs: GradStats) -> GradStats {
        GradStats::new(self.grad + rhs.grad, self.hess + rhs.hess, self.count + rhs.count)
    }
}

impl AddAssign for GradStats {
    fn add_assign(&mut self, rhs: GradStats) {
        self.grad += rhs.grad;
        self.hess += rhs.hess;
        self.count += rhs.count;
    }
}

impl Sub for GradStats {
    type Output = GradStats;

    fn sub(self, rhs: GradStats) -> GradStats {
        GradStats::new(self.grad - rhs.grad, self.hess - rhs.hess, self.count - rhs.count)
    }
}

/// Per-bin statistics of one tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHistogram {
    slots: Vec<GradStats>,
}

impl NodeHistogram {
    pub fn zeros(num_slots: usize) -> Self {
        NodeHistogram {
            slots: vec![GradStats::default(); num_slots],
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[GradStats] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [GradStats] {
        &mut self.slots
    }

    /// Bins of `feature` followed by its missing bucket.
    pub fn feature<'a>(&'a self, cuts: &FeatureCuts, feature: FeatureIndex) -> &'a [GradStats] {
        &self.slots[cuts.offset(feature)..=cuts.missing_slot(feature)]
    }

    /// Sibling histogram: `self - child`, slot by slot.
    pub fn subtract(&self, child: &NodeHistogram) -> NodeHistogram {
        NodeHistogram {
            slots: self
                .slots
                .iter()
                .zip(&child.slots)
                .map(|(&p, &c)| p - c)
                .collect(),
        }
    }

    /// `[grad, hess, count]` per slot.
    pub fn to_flat(&self) -> Vec<Hist> {
        self.slots.iter().flat_map(|s| s.to_array()).collect()
    }

    pub fn from_flat(values: &[Hist]) -> Result<Self> {
        if values.len() % 3 != 0 {
            return Err(GbtError::internal(format!(
                "flat histogram length {} is not a multiple of 3",
                values.len()
            )));
        }
        Ok(NodeHistogram {
            slots: values.chunks_exact(3).map(GradStats::from_slice).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grad_stats_arithmetic() {
        let a = GradStats::new(1.0, 2.0, 3.0);
        let b = GradStats::new(0.5, 0.5, 1.0);
        assert_eq!(a + b, GradStats::new(1.5, 2.5, 4.0));
        assert_eq!(a - b, GradStats::new(0.5, 1.5, 2.0));
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn test_flat_round_trip_and_subtraction() {
        let mut parent = NodeHistogram::zeros(2);
        parent.slots_mut()[0] = GradStats::new(4.0, 4.0, 4.0);
        parent.slots_mut()[1] = GradStats::new(-1.0, 2.0, 2.0);
        let flat = parent.to_flat();
        assert_eq!(flat.len(), 6);
        assert_eq!(NodeHistogram::from_flat(&flat).unwrap(), parent);
        assert!(NodeHistogram::from_flat(&flat[..5]).is_err());

        let mut child = NodeHistogram::zeros(2);
        child.slots_mut()[0] = GradStats::new(1.0, 1.0, 1.0);
        let sibling = parent.subtract(&child);
        assert_eq!(sibling.slots()[0], GradStats::new(3.0, 3.0, 3.0));
        assert_eq!(sibling.slots()[1], parent.slots()[1]);
    }
}
