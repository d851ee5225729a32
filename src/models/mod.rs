//! Risk classifier: gradient-boosted regression trees.
//!
//! Trees are plain data (flat node arrays) so a trained model serializes into
//! the artifact as-is.

pub mod booster;
pub mod tree;

pub use booster::*;
pub use tree::{RegressionTree, TreeNode};
