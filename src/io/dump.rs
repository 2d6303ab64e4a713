//! Text dump of a model, one string per tree, in the xgboost layout:
//!
//! ```text
//! 0:[f0<2.5] yes=1,no=2,missing=1,gain=4.2,cover=10
//! 	1:leaf=-0.3,cover=6
//! 	2:leaf=0.2,cover=4
//! ```

use crate::boosting::Model;
use crate::core::types::NodeId;
use crate::tree::{NodeKind, Tree};

/// Dump every tree. `with_stats` adds gain and cover.
pub fn dump_model(model: &Model, with_stats: bool) -> Vec<String> {
    model
        .trees()
        .iter()
        .map(|tree| dump_tree(model, tree, with_stats))
        .collect()
}

fn dump_tree(model: &Model, tree: &Tree, with_stats: bool) -> String {
    let mut out = String::new();
    let mut stack: Vec<NodeId> = vec![0];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let mut line = match node.kind() {
            NodeKind::Split(cond) => {
                stack.push(cond.right);
                stack.push(cond.left);
                let missing = if cond.default_left { cond.left } else { cond.right };
                let mut line = format!(
                    "{}:[{}<{}] yes={},no={},missing={}",
                    id,
                    model.feature_name(cond.feature),
                    cond.threshold,
                    cond.left,
                    cond.right,
                    missing
                );
                if with_stats {
                    line += &format!(",gain={}", cond.gain);
                }
                line
            }
            NodeKind::Leaf { weight } => format!("{}:leaf={}", id, weight),
        };
        if with_stats {
            line += &format!(",cover={}", node.cover());
        }
        out.push_str(&"\t".repeat(node.depth()));
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;

    #[test]
    fn test_dump_layout() {
        let mut model = Model::new(Objective::SquaredError, 0.0, 2);
        let mut tree = Tree::new(0.0, 10.0);
        let (l, _) = tree.split_node(0, 1, 2.5, 3, false, 4.0, (0.0, 6.0), (0.2, 4.0));
        tree.split_node(l, 0, 1.0, 0, true, 1.0, (-0.5, 3.0), (0.5, 3.0));
        model.push_round(vec![tree]).unwrap();

        let dump = dump_model(&model, true);
        let lines: Vec<&str> = dump[0].lines().collect();
        assert_eq!(lines[0], "0:[f1<2.5] yes=1,no=2,missing=2,gain=4,cover=10");
        assert_eq!(lines[1], "\t1:[f0<1] yes=3,no=4,missing=3,gain=1,cover=6");
        assert_eq!(lines[2], "\t\t3:leaf=-0.5,cover=3");
        assert_eq!(lines[4], "\t2:leaf=0.2,cover=4");

        let plain = dump_model(&model, false);
        assert!(plain[0].starts_with("0:[f1<2.5] yes=1,no=2,missing=2\n"));
    }
}
