//! The trained model: an ordered sequence of trees plus objective metadata.

use crate::core::error::{GbtError, Result};
use crate::core::types::{ImportanceType, NodeId};
use crate::dataset::{Dataset, FeatureMatrix};
use crate::objective::Objective;
use crate::tree::{NodeKind, Tree};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Boosted tree ensemble.
///
/// Round `r` owns trees `r * num_outputs .. (r + 1) * num_outputs`, one per
/// output, and `tree_info[t]` is the output tree `t` contributes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    objective: Objective,
    /// In prediction space (a probability for binary:logistic)
    base_score: f64,
    num_features: usize,
    feature_names: Option<Vec<String>>,
    trees: Vec<Tree>,
    tree_info: Vec<usize>,
    attributes: BTreeMap<String, String>,
}

impl Model {
    pub fn new(objective: Objective, base_score: f64, num_features: usize) -> Self {
        Model {
            objective,
            base_score,
            num_features,
            feature_names: None,
            trees: Vec::new(),
            tree_info: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_outputs(&self) -> usize {
        self.objective.num_outputs()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn set_feature_names(&mut self, names: Option<Vec<String>>) {
        self.feature_names = names;
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree_info(&self) -> &[usize] {
        &self.tree_info
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Completed boosting rounds.
    pub fn num_rounds(&self) -> usize {
        self.trees.len() / self.num_outputs()
    }

    /// Append one round: exactly one tree per output, in output order.
    pub fn push_round(&mut self, trees: Vec<Tree>) -> Result<()> {
        if trees.len() != self.num_outputs() {
            return Err(GbtError::internal(format!(
                "a round needs {} trees, got {}",
                self.num_outputs(),
                trees.len()
            )));
        }
        for (output, tree) in trees.into_iter().enumerate() {
            self.trees.push(tree);
            self.tree_info.push(output);
        }
        Ok(())
    }

    /// Keep only the first `rounds` rounds.
    pub fn truncate_rounds(&mut self, rounds: usize) {
        let keep = rounds * self.num_outputs();
        self.trees.truncate(keep);
        self.tree_info.truncate(keep);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attr<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Consistency checks for a model read from bytes or text.
    pub fn validate(&self) -> Result<()> {
        let outputs = self.num_outputs();
        if self.tree_info.len() != self.trees.len() || self.trees.len() % outputs != 0 {
            return Err(GbtError::serialization(format!(
                "{} trees with {} tree_info entries do not form whole rounds of {}",
                self.trees.len(),
                self.tree_info.len(),
                outputs
            )));
        }
        if let Some(t) = (0..self.tree_info.len()).find(|&t| self.tree_info[t] != t % outputs) {
            return Err(GbtError::serialization(format!(
                "tree {} is assigned to output {}, expected {}",
                t,
                self.tree_info[t],
                t % outputs
            )));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.num_features {
                return Err(GbtError::serialization(format!(
                    "{} feature names for {} features",
                    names.len(),
                    self.num_features
                )));
            }
        }
        if !self.base_score.is_finite() {
            return Err(GbtError::serialization("base_score is not finite"));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.num_features).map_err(|e| match e {
                GbtError::Serialization { message } => {
                    GbtError::serialization(format!("tree {}: {}", t, message))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Margin every row starts from when no base margin is supplied.
    pub fn base_margin(&self) -> f64 {
        self.objective.base_margin(self.base_score)
    }

    fn check_features(&self, features: &FeatureMatrix) -> Result<()> {
        if features.num_features() != self.num_features {
            return Err(GbtError::prediction(format!(
                "model expects {} features, data has {}",
                self.num_features,
                features.num_features()
            )));
        }
        Ok(())
    }

    /// Raw margins, shape `(num_outputs, num_rows)`.
    ///
    /// `base_margin`, when given, has one row per data row and one column
    /// per output and replaces the base score.
    pub fn predict_margin(
        &self,
        features: &FeatureMatrix,
        base_margin: Option<ArrayView2<'_, f64>>,
    ) -> Result<Array2<f64>> {
        self.check_features(features)?;
        let num_rows = features.num_rows();
        let num_outputs = self.num_outputs();
        if let Some(margin) = &base_margin {
            if margin.dim() != (num_rows, num_outputs) {
                return Err(GbtError::dataset(
                    "base_margin",
                    format!(
                        "expected shape ({}, {}), got {:?}",
                        num_rows,
                        num_outputs,
                        margin.dim()
                    ),
                ));
            }
        }
        let base = self.base_margin();
        let rows: Vec<Vec<f64>> = (0..num_rows)
            .into_par_iter()
            .map(|row| {
                let mut out = match &base_margin {
                    Some(margin) => margin.row(row).to_vec(),
                    None => vec![base; num_outputs],
                };
                let values = features.dense_row(row);
                for (tree, &output) in self.trees.iter().zip(&self.tree_info) {
                    out[output] += tree.predict_row(&values);
                }
                out
            })
            .collect();
        Ok(Array2::from_shape_fn((num_outputs, num_rows), |(k, i)| rows[i][k]))
    }

    /// Predictions in output space, shape `(num_outputs, num_rows)`.
    pub fn predict(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let margins = self.predict_margin(dataset.features(), dataset.base_margin())?;
        Ok(self.objective.transform(margins.view()))
    }

    /// Leaf reached in every tree, shape `(num_rows, num_trees)`.
    pub fn predict_leaf(&self, features: &FeatureMatrix) -> Result<Array2<NodeId>> {
        self.check_features(features)?;
        let rows: Vec<Vec<NodeId>> = (0..features.num_rows())
            .into_par_iter()
            .map(|row| {
                let values = features.dense_row(row);
                self.trees
                    .iter()
                    .map(|tree| tree.leaf_index(|f| Some(values[f]).filter(|v| !v.is_nan())))
                    .collect()
            })
            .collect();
        Ok(Array2::from_shape_fn(
            (features.num_rows(), self.trees.len()),
            |(i, t)| rows[i][t],
        ))
    }

    /// Importance of every feature used by at least one split, keyed by
    /// feature name (or `f{index}` without names).
    pub fn feature_importance(&self, kind: ImportanceType) -> BTreeMap<String, f64> {
        let mut count = vec![0usize; self.num_features];
        let mut gain = vec![0.0; self.num_features];
        let mut cover = vec![0.0; self.num_features];
        for tree in &self.trees {
            for node in tree.nodes() {
                if let NodeKind::Split(cond) = node.kind() {
                    count[cond.feature] += 1;
                    gain[cond.feature] += cond.gain;
                    cover[cond.feature] += node.cover();
                }
            }
        }
        (0..self.num_features)
            .filter(|&f| count[f] > 0)
            .map(|f| {
                let n = count[f] as f64;
                let value = match kind {
                    ImportanceType::Weight => n,
                    ImportanceType::Gain => gain[f] / n,
                    ImportanceType::Cover => cover[f] / n,
                    ImportanceType::TotalGain => gain[f],
                    ImportanceType::TotalCover => cover[f],
                };
                (self.feature_name(f), value)
            })
            .collect()
    }

    pub fn feature_name(&self, feature: usize) -> String {
        self.feature_names
            .as_ref()
            .and_then(|names| names.get(feature).cloned())
            .unwrap_or_else(|| format!("f{}", feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn stump(threshold: f32, left: f64, right: f64) -> Tree {
        let mut tree = Tree::new(0.0, 4.0);
        tree.split_node(0, 0, threshold, 0, true, 2.0, (left, 2.0), (right, 2.0));
        tree
    }

    #[test]
    fn test_margins_add_up_per_output() {
        let mut model = Model::new(Objective::Softmax { num_class: 2 }, 0.5, 1);
        model.push_round(vec![stump(1.0, -1.0, 1.0), stump(1.0, 2.0, 3.0)]).unwrap();
        model.push_round(vec![stump(2.0, 0.5, 0.0), Tree::new(0.25, 4.0)]).unwrap();
        assert_eq!(model.num_rounds(), 2);
        assert_eq!(model.tree_info(), &[0, 1, 0, 1]);

        let x = FeatureMatrix::from(array![[0.0f32], [1.5], [f32::NAN]]);
        let m = model.predict_margin(&x, None).unwrap();
        assert_relative_eq!(m[[0, 0]], 0.5 - 1.0 + 0.5);
        assert_relative_eq!(m[[0, 1]], 0.5 + 1.0 + 0.5);
        assert_relative_eq!(m[[1, 1]], 0.5 + 3.0 + 0.25);
        // missing follows default_left
        assert_relative_eq!(m[[0, 2]], m[[0, 0]]);

        model.truncate_rounds(1);
        assert_eq!(model.num_trees(), 2);
        assert!(model.push_round(vec![Tree::default()]).is_err());
    }

    #[test]
    fn test_base_margin_replaces_base_score() {
        let mut model = Model::new(Objective::SquaredError, 10.0, 1);
        model.push_round(vec![stump(1.0, -1.0, 1.0)]).unwrap();
        let x = FeatureMatrix::from(array![[0.0f32], [2.0]]);
        let margin = array![[0.5], [0.0]];
        let m = model.predict_margin(&x, Some(margin.view())).unwrap();
        assert_eq!(m, array![[-0.5, 1.0]]);
        let bad = array![[0.5, 1.0], [0.0, 1.0]];
        assert!(model.predict_margin(&x, Some(bad.view())).is_err());
    }

    #[test]
    fn test_feature_count_is_checked() {
        let model = Model::new(Objective::SquaredError, 0.0, 3);
        let x = FeatureMatrix::from(array![[0.0f32, 1.0]]);
        assert!(model.predict_margin(&x, None).is_err());
    }

    #[test]
    fn test_importance_and_leaves() {
        let mut model = Model::new(Objective::SquaredError, 0.0, 2);
        model.set_feature_names(Some(vec!["age".into(), "income".into()]));
        model.push_round(vec![stump(1.0, -1.0, 1.0)]).unwrap();
        model.push_round(vec![stump(3.0, -1.0, 1.0)]).unwrap();
        let weight = model.feature_importance(ImportanceType::Weight);
        assert_eq!(weight.get("age"), Some(&2.0));
        assert!(!weight.contains_key("income"));
        assert_eq!(model.feature_importance(ImportanceType::TotalGain)["age"], 4.0);
        assert_eq!(model.feature_importance(ImportanceType::Cover)["age"], 4.0);

        let leaves = model
            .predict_leaf(&FeatureMatrix::from(array![[2.0f32, 0.0]]))
            .unwrap();
        assert_eq!(leaves, array![[2, 1]]);
    }
}
