//! Decision trees and the machinery that grows them.
//!
//! - [`tree`]: the node arena and prediction
//! - [`histogram`]: per-bin gradient statistics
//! - [`split`]: gain formulas and best split search
//! - [`learner`]: the distributed tree grower
//! - [`sampling`]: row and column subsampling

pub mod histogram;
pub mod learner;
pub mod node;
pub mod sampling;
pub mod split;
pub mod tree;

pub use histogram::{GradStats, HistogramBuilder, NodeHistogram};
pub use learner::{GrowerParams, TreeGrower};
pub use node::{NodeKind, SplitCondition, TreeNode};
pub use split::{SplitCandidate, SplitFinder, SplitParams};
pub use tree::Tree;
