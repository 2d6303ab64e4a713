//! Tree node implementation.
//!
//! A node is either a split (feature, threshold, children) or a leaf (weight).
//! Children are arena indices into the owning [`Tree`](crate::tree::Tree).

use crate::core::types::{BinIndex, FeatureIndex, FeatureValue, NodeId};
use crate::dataset::binning::MISSING_BIN;
use serde::{Deserialize, Serialize};

/// Split condition of an internal node.
///
/// A row goes left when its value is below `threshold`; rows missing the
/// feature follow `default_left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCondition {
    pub feature: FeatureIndex,
    pub threshold: FeatureValue,
    /// Last bin routed left during training
    pub split_bin: BinIndex,
    pub default_left: bool,
    pub left: NodeId,
    pub right: NodeId,
    /// Loss reduction of the split
    pub gain: f64,
}

impl SplitCondition {
    /// Child for a raw feature value.
    #[inline]
    pub fn next(&self, value: Option<FeatureValue>) -> NodeId {
        let go_left = match value {
            Some(v) => v < self.threshold,
            None => self.default_left,
        };
        if go_left {
            self.left
        } else {
            self.right
        }
    }

    /// Child for a training bin; agrees with [`next`](Self::next) for every
    /// value seen while the cuts were built.
    #[inline]
    pub fn next_binned(&self, bin: BinIndex) -> NodeId {
        let go_left = if bin == MISSING_BIN {
            self.default_left
        } else {
            bin <= self.split_bin
        };
        if go_left {
            self.left
        } else {
            self.right
        }
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Split(SplitCondition),
    Leaf { weight: f64 },
}

/// A node of the tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    kind: NodeKind,
    /// Hessian sum of the training rows reaching this node
    cover: f64,
    depth: usize,
    parent: Option<NodeId>,
}

impl TreeNode {
    pub fn new_leaf(weight: f64, cover: f64, depth: usize, parent: Option<NodeId>) -> Self {
        TreeNode {
            kind: NodeKind::Leaf { weight },
            cover,
            depth,
            parent,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn leaf_weight(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Leaf { weight } => Some(weight),
            NodeKind::Split(_) => None,
        }
    }

    pub fn split(&self) -> Option<&SplitCondition> {
        match &self.kind {
            NodeKind::Split(cond) => Some(cond),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn cover(&self) -> f64 {
        self.cover
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_split(&mut self, condition: SplitCondition) {
        self.kind = NodeKind::Split(condition);
    }

    pub(crate) fn set_leaf_weight(&mut self, weight: f64) {
        self.kind = NodeKind::Leaf { weight };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(default_left: bool) -> SplitCondition {
        SplitCondition {
            feature: 0,
            threshold: 2.0,
            split_bin: 1,
            default_left,
            left: 1,
            right: 2,
            gain: 0.5,
        }
    }

    #[test]
    fn test_value_routing() {
        let cond = condition(false);
        assert_eq!(cond.next(Some(1.5)), 1);
        assert_eq!(cond.next(Some(2.0)), 2);
        assert_eq!(cond.next(None), 2);
        assert_eq!(condition(true).next(None), 1);
    }

    #[test]
    fn test_binned_routing() {
        let cond = condition(true);
        assert_eq!(cond.next_binned(0), 1);
        assert_eq!(cond.next_binned(1), 1);
        assert_eq!(cond.next_binned(2), 2);
        assert_eq!(cond.next_binned(MISSING_BIN), 1);
    }

    #[test]
    fn test_leaf_accessors() {
        let mut node = TreeNode::new_leaf(0.25, 3.0, 1, Some(0));
        assert!(node.is_leaf());
        assert_eq!(node.leaf_weight(), Some(0.25));
        assert_eq!(node.parent(), Some(0));
        node.set_split(condition(false));
        assert!(!node.is_leaf());
        assert_eq!(node.split().map(|c| c.feature), Some(0));
    }
}
