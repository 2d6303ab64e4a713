//! Decision tree stored as a node arena.
//!
//! Node 0 is the root. Children are always appended, so node ids follow the
//! order in which the grower created them.

use crate::core::error::{GbtError, Result};
use crate::core::types::{BinIndex, FeatureIndex, FeatureValue, NodeId};
use crate::dataset::binning::BinnedMatrix;
use crate::tree::node::{NodeKind, SplitCondition, TreeNode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new(0.0, 0.0)
    }
}

impl Tree {
    /// Tree with a single root leaf.
    pub fn new(root_weight: f64, root_cover: f64) -> Self {
        Tree {
            nodes: vec![TreeNode::new_leaf(root_weight, root_cover, 0, None)],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    /// Depth of the deepest leaf (a lone root has depth 0).
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    /// Turn leaf `node` into a split with two new leaf children.
    ///
    /// Returns the ids of the left and right child.
    #[allow(clippy::too_many_arguments)]
    pub fn split_node(
        &mut self,
        node: NodeId,
        feature: FeatureIndex,
        threshold: FeatureValue,
        split_bin: BinIndex,
        default_left: bool,
        gain: f64,
        left: (f64, f64),
        right: (f64, f64),
    ) -> (NodeId, NodeId) {
        let depth = self.nodes[node].depth() + 1;
        let left_id = self.nodes.len();
        let right_id = left_id + 1;
        self.nodes
            .push(TreeNode::new_leaf(left.0, left.1, depth, Some(node)));
        self.nodes
            .push(TreeNode::new_leaf(right.0, right.1, depth, Some(node)));
        self.nodes[node].set_split(SplitCondition {
            feature,
            threshold,
            split_bin,
            default_left,
            left: left_id,
            right: right_id,
            gain,
        });
        (left_id, right_id)
    }

    /// Check the arena of a decoded tree: a root exists, every split reads a
    /// feature below `num_features`, and children come after their parent and
    /// are claimed by exactly one split. The last rule makes every walk from
    /// the root finite.
    pub fn validate(&self, num_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(GbtError::serialization("tree has no root node"));
        }
        let mut claimed = vec![false; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            let Some(cond) = node.split() else {
                continue;
            };
            if cond.feature >= num_features {
                return Err(GbtError::serialization(format!(
                    "node {} splits on feature {} but the model has {} features",
                    id, cond.feature, num_features
                )));
            }
            for child in [cond.left, cond.right] {
                if child <= id || child >= self.nodes.len() || claimed[child] {
                    return Err(GbtError::serialization(format!(
                        "node {} has invalid child {}",
                        id, child
                    )));
                }
                claimed[child] = true;
            }
        }
        Ok(())
    }

    /// Overwrite the weight of a leaf.
    pub fn set_leaf_weight(&mut self, node: NodeId, weight: f64) {
        self.nodes[node].set_leaf_weight(weight);
    }

    /// Multiply every leaf weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Some(w) = node.leaf_weight() {
                node.set_leaf_weight(w * factor);
            }
        }
    }

    /// Leaf reached by a row whose values are given by `value(feature)`.
    #[inline]
    pub fn leaf_index<F>(&self, value: F) -> NodeId
    where
        F: Fn(FeatureIndex) -> Option<FeatureValue>,
    {
        let mut id = 0;
        while let NodeKind::Split(cond) = self.nodes[id].kind() {
            id = cond.next(value(cond.feature));
        }
        id
    }

    /// Leaf weight for a row given by `value(feature)`.
    #[inline]
    pub fn predict<F>(&self, value: F) -> f64
    where
        F: Fn(FeatureIndex) -> Option<FeatureValue>,
    {
        self.leaf_weight_at(self.leaf_index(value))
    }

    /// Leaf weight for a dense row where `NaN` marks a missing value.
    #[inline]
    pub fn predict_row(&self, row: &[FeatureValue]) -> f64 {
        self.predict(|f| Some(row[f]).filter(|v| !v.is_nan()))
    }

    /// Leaf reached by a training row, following bins instead of values.
    #[inline]
    pub fn leaf_index_binned(&self, binned: &BinnedMatrix, row: usize) -> NodeId {
        let mut id = 0;
        while let NodeKind::Split(cond) = self.nodes[id].kind() {
            id = cond.next_binned(binned.bin(row, cond.feature));
        }
        id
    }

    fn leaf_weight_at(&self, id: NodeId) -> f64 {
        self.nodes[id].leaf_weight().unwrap_or(0.0)
    }

    /// Leaf weight for a training row.
    #[inline]
    pub fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> f64 {
        self.leaf_weight_at(self.leaf_index_binned(binned, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root: f0 < 2 ? (f1 < 5 ? -1 : 1) : 3, missing f0 goes right
    fn sample_tree() -> Tree {
        let mut tree = Tree::new(0.0, 10.0);
        let (l, _r) = tree.split_node(0, 0, 2.0, 0, false, 1.5, (0.0, 6.0), (3.0, 4.0));
        tree.split_node(l, 1, 5.0, 3, true, 0.5, (-1.0, 2.0), (1.0, 4.0));
        tree
    }

    #[test]
    fn test_structure() {
        let tree = sample_tree();
        assert_eq!(tree.num_nodes(), 5);
        assert_eq!(tree.num_leaves(), 3);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(tree.node(3).parent(), Some(1));
    }

    #[test]
    fn test_prediction_and_missing_routing() {
        let tree = sample_tree();
        let row = |values: [Option<f32>; 2]| move |f: usize| values[f];
        assert_eq!(tree.predict(row([Some(1.0), Some(4.0)])), -1.0);
        assert_eq!(tree.predict(row([Some(1.0), Some(6.0)])), 1.0);
        assert_eq!(tree.predict(row([Some(2.0), None])), 3.0);
        // f0 missing -> right; f1 missing under the left node -> left
        assert_eq!(tree.predict(row([None, Some(0.0)])), 3.0);
        assert_eq!(tree.predict(row([Some(0.0), None])), -1.0);
    }

    fn with_split_field(tree: &Tree, node: usize, field: &str, value: usize) -> Tree {
        let mut json = serde_json::to_value(tree).unwrap();
        json["nodes"][node]["kind"]["Split"][field] = value.into();
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_validate_rejects_broken_arenas() {
        let tree = sample_tree();
        assert!(tree.validate(2).is_ok());
        assert!(tree.validate(1).unwrap_err().to_string().contains("feature 1"));

        let cyclic = with_split_field(&tree, 1, "left", 0);
        assert!(cyclic.validate(2).unwrap_err().to_string().contains("child 0"));
        assert!(with_split_field(&tree, 0, "right", 9).validate(2).is_err());
        assert!(with_split_field(&tree, 1, "right", 2).validate(2).is_err());

        assert!(Tree { nodes: Vec::new() }.validate(2).is_err());
    }

    #[test]
    fn test_scale() {
        let mut tree = sample_tree();
        tree.scale(0.5);
        assert_eq!(tree.predict(|_| Some(10.0)), 1.5);
        assert_eq!(tree.node(0).cover(), 10.0);
    }
}
