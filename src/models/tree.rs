//! Regression trees grown on first/second-order gradient statistics.
//!
//! A tree is stored as a flat node array with the root at index 0. Nodes are
//! pushed in pre-order, so every child index is greater than its parent's,
//! which is also what [`RegressionTree::validate`] checks for trees read back
//! from disk.
//!
//! Split search is exact and greedy: for every candidate feature we walk the
//! node's rows in ascending feature order (the pre-sorted lists are partitioned
//! down the tree, never re-sorted) and score each boundary between distinct
//! values with the usual second-order gain.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `value < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

/// Knobs that shape a single tree.
#[derive(Debug, Clone, Copy)]
pub struct GrowthParams {
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum gain required to split.
    pub gamma: f64,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// Shrinkage applied to every leaf weight.
    pub learning_rate: f64,
}

/// Rows of the current node, one ascending-by-value list per candidate feature.
pub type SortedRows = Vec<(usize, Vec<usize>)>;

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.predict_by(|f| row[f])
    }

    /// Walk the tree reading feature values through `value_of`.
    pub fn predict_by(&self, value_of: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if value_of(feature) < threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Structural check for deserialized trees.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {idx}: non-finite leaf value"));
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!("node {idx}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: non-finite threshold"));
                    }
                    let n = self.nodes.len();
                    if left <= idx || right <= idx || left >= n || right >= n {
                        return Err(format!("node {idx}: invalid child indices ({left}, {right})"));
                    }
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

/// Grow one tree on the rows listed in `sorted`.
///
/// `sorted` holds, for every feature the tree may split on, the node's rows in
/// ascending order of that feature. All lists contain the same rows.
pub fn grow_tree(
    x: &DMatrix<f64>,
    grad: &[f64],
    hess: &[f64],
    sorted: SortedRows,
    params: &GrowthParams,
) -> RegressionTree {
    let mut builder = TreeBuilder {
        x,
        grad,
        hess,
        params,
        nodes: Vec::new(),
    };
    builder.grow(sorted, 0);
    RegressionTree {
        nodes: builder.nodes,
    }
}

struct TreeBuilder<'a> {
    x: &'a DMatrix<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a GrowthParams,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, sorted: SortedRows, depth: usize) -> usize {
        let rows: &[usize] = sorted.first().map(|(_, r)| r.as_slice()).unwrap_or(&[]);
        let (g, h) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]));
        let n_rows = rows.len();

        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || n_rows < 2 {
            return idx;
        }
        let Some(split) = self.best_split(&sorted, g, h) else {
            return idx;
        };

        let (left_rows, right_rows) = self.partition(sorted, &split);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom > 0.0 {
            -g / denom * self.params.learning_rate
        } else {
            0.0
        }
    }

    fn best_split(&self, sorted: &SortedRows, g: f64, h: f64) -> Option<SplitCandidate> {
        // Evaluate each feature independently (parallel).
        let candidates: Vec<SplitCandidate> = sorted
            .par_iter()
            .filter_map(|(feature, rows)| self.best_split_for_feature(*feature, rows, g, h))
            .collect();

        // Deterministic selection: highest gain; break ties by lowest feature index.
        let mut best: Option<SplitCandidate> = None;
        for c in candidates {
            let better = match &best {
                None => true,
                Some(b) => c.gain > b.gain || (c.gain == b.gain && c.feature < b.feature),
            };
            if better {
                best = Some(c);
            }
        }
        best
    }

    fn best_split_for_feature(&self, feature: usize, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let p = self.params;
        let parent_score = g * g / (h + p.lambda);

        let mut gl = 0.0;
        let mut hl = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for pair in rows.windows(2) {
            let (i, next) = (pair[0], pair[1]);
            gl += self.grad[i];
            hl += self.hess[i];

            let xi = self.x[(i, feature)];
            let xn = self.x[(next, feature)];
            // Only cut between distinct values.
            if xi >= xn {
                continue;
            }

            let gr = g - gl;
            let hr = h - hl;
            if hl < p.min_child_weight || hr < p.min_child_weight {
                continue;
            }

            let gain = 0.5 * (gl * gl / (hl + p.lambda) + gr * gr / (hr + p.lambda) - parent_score) - p.gamma;
            if !(gain > 0.0) || best.as_ref().is_some_and(|b| gain <= b.gain) {
                continue;
            }

            // The midpoint can round onto `xi` for adjacent floats.
            let mid = 0.5 * (xi + xn);
            let threshold = if mid > xi { mid } else { xn };
            best = Some(SplitCandidate {
                feature,
                threshold,
                gain,
            });
        }

        best
    }

    fn partition(&self, sorted: SortedRows, split: &SplitCandidate) -> (SortedRows, SortedRows) {
        let mut left = Vec::with_capacity(sorted.len());
        let mut right = Vec::with_capacity(sorted.len());
        for (feature, rows) in sorted {
            // `partition` keeps relative order, so both halves stay sorted.
            let (l, r): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&i| self.x[(i, split.feature)] < split.threshold);
            left.push((feature, l));
            right.push((feature, r));
        }
        (left, right)
    }
}
