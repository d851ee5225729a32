//! Gradient-boosted tree classifier with a log-loss objective.
//!
//! Each round fits one [`RegressionTree`] to the gradient/hessian of the
//! binary cross-entropy at the current margins (second-order boosting). The
//! predicted probability is `sigmoid(base_margin + Σ tree(x))`.
//!
//! Training is deterministic for fixed data, params and seed: row/column
//! subsampling draws from one seeded `StdRng`, and the parallel split search
//! reduces in feature order.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::math::{log_loss, logit, sigmoid};
use crate::models::tree::{GrowthParams, RegressionTree, SortedRows, grow_tree};

/// Lower bound on per-row hessians.
const MIN_HESSIAN: f64 = 1e-16;
/// The base rate is clamped into `[EPS, 1 - EPS]` before `logit`.
const BASE_RATE_EPS: f64 = 1e-6;
/// Rounds between progress log lines.
const LOG_EVERY: usize = 10;

/// Booster hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction for a split.
    pub gamma: f64,
    pub min_child_weight: f64,
    /// Fraction of rows drawn (without replacement) per tree.
    pub subsample: f64,
    /// Fraction of columns drawn per tree.
    pub colsample: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 6,
            learning_rate: 0.3,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            colsample: 1.0,
            seed: 42,
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.n_trees == 0 {
            return Err(AppError::config("`n_trees` must be >= 1."));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AppError::config(format!(
                "`learning_rate` must be > 0, got {}.",
                self.learning_rate
            )));
        }
        for (name, v) in [
            ("lambda", self.lambda),
            ("gamma", self.gamma),
            ("min_child_weight", self.min_child_weight),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AppError::config(format!("`{name}` must be finite and >= 0, got {v}.")));
            }
        }
        for (name, v) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(v.is_finite() && v > 0.0 && v <= 1.0) {
                return Err(AppError::config(format!("`{name}` must be in (0, 1], got {v}.")));
            }
        }
        Ok(())
    }

    fn growth(&self) -> GrowthParams {
        GrowthParams {
            max_depth: self.max_depth,
            lambda: self.lambda,
            gamma: self.gamma,
            min_child_weight: self.min_child_weight,
            learning_rate: self.learning_rate,
        }
    }
}

/// A trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    params: BoosterParams,
    base_margin: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl BoostedClassifier {
    /// Fit on a dense design matrix (`rows × features`) with 0/1 labels.
    pub fn fit(x: &DMatrix<f64>, labels: &[u8], params: &BoosterParams) -> Result<Self, AppError> {
        params.validate()?;

        let n = x.nrows();
        let n_features = x.ncols();
        if n == 0 || n_features == 0 {
            return Err(AppError::training(format!(
                "Cannot fit classifier on a {n}x{n_features} matrix."
            )));
        }
        if labels.len() != n {
            return Err(AppError::schema(format!(
                "Label count {} does not match row count {n}.",
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&y| y > 1) {
            return Err(AppError::value(format!("Labels must be 0 or 1, got {bad}.")));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(AppError::value("Design matrix contains non-finite values."));
        }

        let positives = labels.iter().filter(|&&y| y == 1).count();
        if positives == 0 || positives == n {
            return Err(AppError::training(
                "Training labels contain a single class; need both 0 and 1.",
            ));
        }

        let base_rate = (positives as f64 / n as f64).clamp(BASE_RATE_EPS, 1.0 - BASE_RATE_EPS);
        let base_margin = logit(base_rate);

        // Row order per feature, ties broken by row index.
        let presorted: Vec<Vec<usize>> = (0..n_features)
            .into_par_iter()
            .map(|f| {
                let mut idx: Vec<usize> = (0..n).collect();
                idx.sort_by(|&a, &b| x[(a, f)].total_cmp(&x[(b, f)]).then(a.cmp(&b)));
                idx
            })
            .collect();

        let growth = params.growth();
        let cols_per_tree = ((params.colsample * n_features as f64).round() as usize).clamp(1, n_features);
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut margins = vec![base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_trees);

        debug!(
            rows = n,
            features = n_features,
            positives,
            base_margin,
            n_trees = params.n_trees,
            max_depth = params.max_depth,
            "boosting started"
        );

        for round in 0..params.n_trees {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grad[i] = p - f64::from(labels[i]);
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let in_sample: Option<Vec<bool>> = (params.subsample < 1.0)
                .then(|| (0..n).map(|_| rng.r#gen::<f64>() < params.subsample).collect());

            let features: Vec<usize> = if cols_per_tree < n_features {
                let mut f = rand::seq::index::sample(&mut rng, n_features, cols_per_tree).into_vec();
                f.sort_unstable();
                f
            } else {
                (0..n_features).collect()
            };

            let sorted: SortedRows = features
                .iter()
                .map(|&f| {
                    let rows = match &in_sample {
                        Some(mask) => presorted[f].iter().copied().filter(|&i| mask[i]).collect(),
                        None => presorted[f].clone(),
                    };
                    (f, rows)
                })
                .collect();

            if sorted.first().is_none_or(|(_, rows)| rows.is_empty()) {
                debug!(round, "empty row sample; skipping round");
                continue;
            }

            let tree = grow_tree(x, &grad, &hess, sorted, &growth);
            margins
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, m)| *m += tree.predict_by(|f| x[(i, f)]));
            trees.push(tree);

            if (round + 1) % LOG_EVERY == 0 || round + 1 == params.n_trees {
                let probs: Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
                debug!(
                    round = round + 1,
                    train_log_loss = log_loss(labels, &probs).unwrap_or(f64::NAN),
                    "boosting progress"
                );
            }
        }

        if trees.is_empty() {
            return Err(AppError::training("No trees were grown; check `subsample`."));
        }

        Ok(Self {
            params: params.clone(),
            base_margin,
            n_features,
            trees,
        })
    }

    /// Raw log-odds for one row.
    pub fn predict_margin(&self, row: &[f64]) -> Result<f64, AppError> {
        if row.len() != self.n_features {
            return Err(AppError::schema(format!(
                "Classifier expects {} features, got {}.",
                self.n_features,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AppError::value("Classifier input contains non-finite values."));
        }
        Ok(self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }

    /// Probability of the positive (risk) class, in `[0, 1]`.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, AppError> {
        self.predict_margin(row).map(sigmoid)
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Structural checks for a classifier read from disk.
    pub fn validate_structure(&self) -> Result<(), AppError> {
        if self.n_features == 0 {
            return Err(AppError::artifact("Classifier has zero features."));
        }
        if !self.base_margin.is_finite() {
            return Err(AppError::artifact("Classifier base margin is not finite."));
        }
        if self.trees.is_empty() {
            return Err(AppError::artifact("Classifier has no trees."));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| AppError::artifact(format!("Tree {i} is malformed: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Two noisy features; the label depends on the first only.
    fn toy_data() -> (DMatrix<f64>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 200;
        let mut values = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let a: f64 = rng.r#gen();
            let b: f64 = rng.r#gen();
            values.push(a);
            values.push(b);
            labels.push(u8::from(a > 0.6));
        }
        (DMatrix::from_row_slice(n, 2, &values), labels)
    }

    fn small_params() -> BoosterParams {
        BoosterParams {
            n_trees: 20,
            max_depth: 3,
            ..BoosterParams::default()
        }
    }

    #[test]
    fn learns_a_threshold_rule() {
        let (x, y) = toy_data();
        let model = BoostedClassifier::fit(&x, &y, &small_params()).unwrap();
        assert_eq!(model.n_trees(), 20);
        assert!(model.predict_proba(&[0.9, 0.5]).unwrap() > 0.9);
        assert!(model.predict_proba(&[0.1, 0.5]).unwrap() < 0.1);
    }

    #[test]
    fn training_is_deterministic_with_subsampling() {
        let (x, y) = toy_data();
        let params = BoosterParams {
            subsample: 0.8,
            colsample: 0.5,
            ..small_params()
        };
        let a = BoostedClassifier::fit(&x, &y, &params).unwrap();
        let b = BoostedClassifier::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn base_margin_is_log_odds_of_base_rate() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = [0, 0, 0, 1];
        let model = BoostedClassifier::fit(&x, &y, &small_params()).unwrap();
        assert!((model.base_margin() - (0.25f64 / 0.75).ln()).abs() < 1e-12);
    }

    #[test]
    fn single_class_is_training_error() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let err = BoostedClassifier::fit(&x, &[1, 1, 1], &small_params()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Training);
    }

    #[test]
    fn wrong_feature_count_is_schema_error() {
        let (x, y) = toy_data();
        let model = BoostedClassifier::fit(&x, &y, &small_params()).unwrap();
        let err = model.predict_proba(&[0.5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn invalid_params_are_config_errors() {
        let params = BoosterParams {
            subsample: 0.0,
            ..BoosterParams::default()
        };
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::Config);
        let params = BoosterParams {
            n_trees: 0,
            ..BoosterParams::default()
        };
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn serialized_classifier_round_trips() {
        let (x, y) = toy_data();
        let model = BoostedClassifier::fit(&x, &y, &small_params()).unwrap();
        let text = serde_json::to_string(&model).unwrap();
        let back: BoostedClassifier = serde_json::from_str(&text).unwrap();
        assert!(back.validate_structure().is_ok());
        let row = [0.42, 0.17];
        assert_eq!(model.predict_proba(&row).unwrap(), back.predict_proba(&row).unwrap());
    }
}
