//! Split finding.
//!
//! [`SplitParams`] carries the regularized gain and leaf weight formulas,
//! [`SplitFinder`] scans a reduced histogram for the best candidate.

pub mod evaluator;
pub mod finder;

pub use evaluator::SplitParams;
pub use finder::{SplitCandidate, SplitFinder};
