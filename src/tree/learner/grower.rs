//! Histogram-based tree growing over a sharded dataset.
//!
//! Every worker runs the same grower on its own shard. Node statistics and
//! histograms are all-reduced before any decision is taken, so all workers
//! make the same decisions and end up with identical trees.
//!
//! Each node is OPEN until popped from the frontier, then becomes SPLIT (with
//! two OPEN children) or stays a LEAF. The frontier is FIFO for depth-wise
//! growth and a max-heap on gain (ties to the lower node id) for loss-guided
//! growth.

use crate::config::Config;
use crate::core::error::Result;
use crate::core::types::{FeatureIndex, GradientPair, GrowPolicy, NodeId};
use crate::dataset::binning::{BinnedMatrix, FeatureCuts, MISSING_BIN};
use crate::network::Communicator;
use crate::tree::histogram::{GradStats, HistogramBuilder, NodeHistogram};
use crate::tree::split::{SplitCandidate, SplitFinder, SplitParams};
use crate::tree::tree::Tree;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

/// Structural limits and regularization of a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowerParams {
    /// Zero means unbounded
    pub max_depth: usize,
    /// Zero means unbounded
    pub max_leaves: usize,
    pub grow_policy: GrowPolicy,
    pub split: SplitParams,
}

impl GrowerParams {
    pub fn from_config(config: &Config) -> Self {
        GrowerParams {
            max_depth: config.max_depth,
            max_leaves: config.max_leaves,
            grow_policy: config.grow_policy,
            split: SplitParams::from_config(config),
        }
    }
}

struct ExpandEntry {
    node: NodeId,
    depth: usize,
    hist: NodeHistogram,
    rows: Vec<usize>,
    split: SplitCandidate,
}

impl PartialEq for ExpandEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExpandEntry {}

impl PartialOrd for ExpandEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpandEntry {
    /// Higher gain first; on equal gain the lower node id first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.split
            .gain
            .total_cmp(&other.split.gain)
            .then_with(|| other.node.cmp(&self.node))
    }
}

enum Frontier {
    Fifo(VecDeque<ExpandEntry>),
    Heap(BinaryHeap<ExpandEntry>),
}

impl Frontier {
    fn new(policy: GrowPolicy) -> Self {
        match policy {
            GrowPolicy::DepthWise => Frontier::Fifo(VecDeque::new()),
            GrowPolicy::LossGuide => Frontier::Heap(BinaryHeap::new()),
        }
    }

    fn push(&mut self, entry: ExpandEntry) {
        match self {
            Frontier::Fifo(q) => q.push_back(entry),
            Frontier::Heap(h) => h.push(entry),
        }
    }

    fn pop(&mut self) -> Option<ExpandEntry> {
        match self {
            Frontier::Fifo(q) => q.pop_front(),
            Frontier::Heap(h) => h.pop(),
        }
    }
}

/// Grows one tree from reduced statistics.
pub struct TreeGrower<'a, C: Communicator + ?Sized> {
    cuts: &'a FeatureCuts,
    binned: &'a BinnedMatrix,
    params: &'a GrowerParams,
    comm: &'a C,
}

impl<C: Communicator + ?Sized> fmt::Debug for TreeGrower<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeGrower")
            .field("params", self.params)
            .field("rank", &self.comm.rank())
            .field("num_features", &self.cuts.num_features())
            .field("num_rows", &self.binned.num_rows())
            .finish()
    }
}

impl<'a, C: Communicator + ?Sized> TreeGrower<'a, C> {
    pub fn new(
        cuts: &'a FeatureCuts,
        binned: &'a BinnedMatrix,
        params: &'a GrowerParams,
        comm: &'a C,
    ) -> Self {
        TreeGrower {
            cuts,
            binned,
            params,
            comm,
        }
    }

    /// Grow a tree over the local `rows`, considering only `features`.
    ///
    /// Leaf weights are unscaled; the caller applies the learning rate.
    pub fn grow(
        &self,
        gpairs: &[GradientPair],
        rows: Vec<usize>,
        features: &[FeatureIndex],
    ) -> Result<Tree> {
        let split_params = &self.params.split;

        let mut totals = GradStats::from_rows(gpairs, &rows).to_array();
        self.comm.allreduce_sum(&mut totals)?;
        let root = GradStats::from_slice(&totals);

        let mut tree = Tree::new(split_params.leaf_weight(&root), root.hess);
        let mut frontier = Frontier::new(self.params.grow_policy);
        if self.may_split(0, &root) {
            let hist = self.reduced_histogram(gpairs, &rows, features)?;
            if let Some(entry) = self.evaluate(0, 0, root, hist, rows, features) {
                frontier.push(entry);
            }
        }

        let mut num_leaves = 1;
        while let Some(entry) = frontier.pop() {
            if self.params.max_leaves > 0 && num_leaves >= self.params.max_leaves {
                break;
            }
            let split = entry.split;
            let (left_id, right_id) = tree.split_node(
                entry.node,
                split.feature,
                split.threshold,
                split.split_bin,
                split.default_left,
                split.gain,
                (split_params.leaf_weight(&split.left), split.left.hess),
                (split_params.leaf_weight(&split.right), split.right.hess),
            );
            num_leaves += 1;

            let (left_rows, right_rows) = self.partition(&entry.rows, &split);
            let depth = entry.depth + 1;
            let left_open = self.may_split(depth, &split.left);
            let right_open = self.may_split(depth, &split.right);

            let (left_hist, right_hist) = match (left_open, right_open) {
                (true, true) => {
                    // build the smaller child, derive the sibling
                    if split.left.count <= split.right.count {
                        let left = self.reduced_histogram(gpairs, &left_rows, features)?;
                        let right = entry.hist.subtract(&left);
                        (Some(left), Some(right))
                    } else {
                        let right = self.reduced_histogram(gpairs, &right_rows, features)?;
                        let left = entry.hist.subtract(&right);
                        (Some(left), Some(right))
                    }
                }
                (true, false) => (
                    Some(self.reduced_histogram(gpairs, &left_rows, features)?),
                    None,
                ),
                (false, true) => (
                    None,
                    Some(self.reduced_histogram(gpairs, &right_rows, features)?),
                ),
                (false, false) => (None, None),
            };

            if let Some(hist) = left_hist {
                let entry = self.evaluate(left_id, depth, split.left, hist, left_rows, features);
                if let Some(e) = entry {
                    frontier.push(e);
                }
            }
            if let Some(hist) = right_hist {
                if let Some(e) =
                    self.evaluate(right_id, depth, split.right, hist, right_rows, features)
                {
                    frontier.push(e);
                }
            }
        }

        log::trace!(
            "Grew tree: {} leaves, depth {}",
            tree.num_leaves(),
            tree.max_depth()
        );
        Ok(tree)
    }

    /// Whether a node at `depth` with `stats` is allowed to split at all.
    fn may_split(&self, depth: usize, stats: &GradStats) -> bool {
        let depth_ok = self.params.max_depth == 0 || depth < self.params.max_depth;
        depth_ok && stats.hess > 0.0 && stats.count >= 2.0
    }

    fn evaluate(
        &self,
        node: NodeId,
        depth: usize,
        stats: GradStats,
        hist: NodeHistogram,
        rows: Vec<usize>,
        features: &[FeatureIndex],
    ) -> Option<ExpandEntry> {
        SplitFinder::new(self.cuts, &self.params.split)
            .find_best(&hist, &stats, features)
            .map(|split| ExpandEntry {
                node,
                depth,
                hist,
                rows,
                split,
            })
    }

    fn reduced_histogram(
        &self,
        gpairs: &[GradientPair],
        rows: &[usize],
        features: &[FeatureIndex],
    ) -> Result<NodeHistogram> {
        let local = HistogramBuilder::new(self.cuts, self.binned).build(gpairs, rows, features);
        if self.comm.world_size() == 1 {
            return Ok(local);
        }
        let mut flat = local.to_flat();
        self.comm.allreduce_sum(&mut flat)?;
        NodeHistogram::from_flat(&flat)
    }

    fn partition(&self, rows: &[usize], split: &SplitCandidate) -> (Vec<usize>, Vec<usize>) {
        let column = self.binned.feature(split.feature);
        rows.iter().copied().partition(|&row| {
            let bin = column[row];
            if bin == MISSING_BIN {
                split.default_left
            } else {
                bin <= split.split_bin
            }
        })
    }
}
