//! The scoring pipeline: feature engineer, scaler and classifier as one unit.
//!
//! Training and serving share the same [`FeatureEngineer`], and a fitted
//! pipeline carries the descriptor of the definition it was trained with. The
//! pipeline is immutable after `fit` and is shared across threads by `Arc`.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{ApplicantRecord, BalanceMethod};
use crate::error::AppError;
use crate::features::{FeatureEngineer, FeatureSetDescriptor};
use crate::fit::ClassBalancer;
use crate::math::{ColumnScaling, FittedScaler, StandardScaler};
use crate::models::{BoostedClassifier, BoosterParams};

/// Anything that turns an applicant into a risk probability.
///
/// The serving layer depends on this trait, not on [`ScoringPipeline`], so
/// tests can inject fixture models.
pub trait RiskModel: Send + Sync {
    fn predict_proba(&self, record: &ApplicantRecord) -> Result<f64, AppError>;
}

/// What happened to the training rows on the way into the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub balance_method: BalanceMethod,
    pub rows_before_balancing: usize,
    pub rows_after_balancing: usize,
    /// `(negatives, positives)` before balancing.
    pub class_counts_before: (usize, usize),
    /// `(negatives, positives)` after balancing.
    pub class_counts_after: (usize, usize),
    pub n_trees: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPipeline {
    #[serde(rename = "feature_set")]
    features: FeatureSetDescriptor,
    scaler: FittedScaler,
    classifier: BoostedClassifier,
}

impl ScoringPipeline {
    /// Engineer, balance, scale and fit.
    ///
    /// Records are validated before anything else; the first invalid record
    /// aborts the fit with an error naming its row.
    pub fn fit(
        records: &[ApplicantRecord],
        labels: &[u8],
        balancer: &dyn ClassBalancer,
        params: &BoosterParams,
    ) -> Result<(Self, FitSummary), AppError> {
        if records.is_empty() {
            return Err(AppError::training("Cannot fit on zero training rows."));
        }
        if records.len() != labels.len() {
            return Err(AppError::schema(format!(
                "Record/label count mismatch: {} records, {} labels.",
                records.len(),
                labels.len()
            )));
        }

        let engineer = FeatureEngineer::new();
        let rows: Vec<Vec<f64>> = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                engineer
                    .engineer(r)
                    .map(|row| row.values)
                    .map_err(|e| AppError::new(e.kind(), format!("Training row {i}: {}", e.message())))
            })
            .collect::<Result<_, _>>()?;

        let positives = labels.iter().filter(|&&y| y == 1).count();
        let class_counts_before = (labels.len() - positives, positives);

        let mut balanced = balancer.balance(rows, labels.to_vec())?;
        for row in balanced.synthetic_rows_mut() {
            engineer.rederive_indicators(row)?;
        }

        let columns = engineer.columns();
        let scaler = StandardScaler::fit(columns, engineer.numeric_columns(), &balanced.rows)?;
        let scaled = scaler.transform_batch(columns, &balanced.rows)?;
        let x = DMatrix::from_fn(scaled.len(), columns.len(), |r, c| scaled[r][c]);

        let classifier = BoostedClassifier::fit(&x, &balanced.labels, params)?;

        let summary = FitSummary {
            balance_method: balancer.method(),
            rows_before_balancing: records.len(),
            rows_after_balancing: balanced.len(),
            class_counts_before,
            class_counts_after: balanced.class_counts(),
            n_trees: classifier.n_trees(),
        };
        info!(
            rows = summary.rows_before_balancing,
            balanced_rows = summary.rows_after_balancing,
            method = balancer.method().display_name(),
            trees = summary.n_trees,
            "scoring pipeline fitted"
        );

        Ok((
            Self {
                features: engineer.descriptor(),
                scaler,
                classifier,
            },
            summary,
        ))
    }

    /// Confirm a deserialized pipeline is usable with this build's feature definition.
    pub fn check_compatible(&self) -> Result<(), AppError> {
        let engineer = FeatureEngineer::new();
        let expected = engineer.descriptor();
        if self.features != expected {
            return Err(AppError::artifact(format!(
                "Artifact was built with feature set v{} ({} columns); this build uses v{} ({} columns). Retrain the model.",
                self.features.version,
                self.features.columns.len(),
                expected.version,
                expected.columns.len()
            )));
        }
        if !self.scaler.matches(engineer.columns()) {
            return Err(AppError::artifact(
                "Artifact scaler columns do not match the engineered feature columns.",
            ));
        }
        for column in self.scaler.columns() {
            if let ColumnScaling::Standardize { mean, scale } = column.scaling {
                if !(mean.is_finite() && scale.is_finite() && scale > 0.0) {
                    return Err(AppError::artifact(format!(
                        "Artifact scaler has invalid statistics for `{}`.",
                        column.name
                    )));
                }
            }
        }
        if self.classifier.n_features() != engineer.columns().len() {
            return Err(AppError::artifact(format!(
                "Artifact classifier expects {} features; the feature set has {}.",
                self.classifier.n_features(),
                engineer.columns().len()
            )));
        }
        self.classifier.validate_structure()
    }

    pub fn predict_proba(&self, record: &ApplicantRecord) -> Result<f64, AppError> {
        let row = FeatureEngineer::new().engineer(record)?;
        let scaled = self.scaler.transform(row.columns, &row.values)?;
        self.classifier.predict_proba(&scaled)
    }

    /// Score many records in parallel. One result per record, in input order.
    pub fn predict_proba_batch(&self, records: &[ApplicantRecord]) -> Vec<Result<f64, AppError>> {
        records.par_iter().map(|r| self.predict_proba(r)).collect()
    }

    pub fn features(&self) -> &FeatureSetDescriptor {
        &self.features
    }

    pub fn scaler(&self) -> &FittedScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &BoostedClassifier {
        &self.classifier
    }

    #[cfg(test)]
    pub(crate) fn features_mut(&mut self) -> &mut FeatureSetDescriptor {
        &mut self.features
    }
}

impl RiskModel for ScoringPipeline {
    fn predict_proba(&self, record: &ApplicantRecord) -> Result<f64, AppError> {
        ScoringPipeline::predict_proba(self, record)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{GenerateConfig, generate_dataset};
    use crate::domain::types::tests::scenario_record;
    use crate::error::ErrorKind;
    use crate::fit::{RandomOversampler, Smote};

    pub(crate) fn small_params() -> BoosterParams {
        BoosterParams {
            n_trees: 30,
            max_depth: 4,
            ..BoosterParams::default()
        }
    }

    pub(crate) fn fitted_pipeline() -> ScoringPipeline {
        let data = generate_dataset(&GenerateConfig { rows: 800, seed: 3 }).unwrap();
        let smote = Smote::new(5, 42).unwrap();
        ScoringPipeline::fit(&data.records, &data.labels, &smote, &small_params())
            .unwrap()
            .0
    }

    #[test]
    fn fit_balances_before_training() {
        let data = generate_dataset(&GenerateConfig { rows: 400, seed: 11 }).unwrap();
        let (_, summary) =
            ScoringPipeline::fit(&data.records, &data.labels, &RandomOversampler::new(1), &small_params()).unwrap();
        assert_eq!(summary.rows_before_balancing, 400);
        assert_eq!(summary.class_counts_before, data.class_counts());
        let (neg, pos) = summary.class_counts_after;
        assert_eq!(neg, pos);
        assert_eq!(summary.rows_after_balancing, neg + pos);
        assert_eq!(summary.balance_method, BalanceMethod::Oversample);
    }

    #[test]
    fn prediction_is_deterministic_and_bounded() {
        let pipeline = fitted_pipeline();
        let r = scenario_record();
        let a = pipeline.predict_proba(&r).unwrap();
        let b = pipeline.predict_proba(&r).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
        assert!(pipeline.check_compatible().is_ok());
    }

    #[test]
    fn batch_matches_single_and_reports_bad_rows() {
        let pipeline = fitted_pipeline();
        let mut bad = scenario_record();
        bad.income = -1.0;
        let records = vec![scenario_record(), bad];
        let out = pipeline.predict_proba_batch(&records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), &pipeline.predict_proba(&records[0]).unwrap());
        assert_eq!(out[1].as_ref().unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn invalid_training_record_names_its_row() {
        let data = generate_dataset(&GenerateConfig { rows: 50, seed: 2 }).unwrap();
        let mut records = data.records.clone();
        records[7].utilization_ratio = f64::NAN;
        let err = ScoringPipeline::fit(&records, &data.labels, &RandomOversampler::new(1), &small_params())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.message().contains("row 7"));
    }

    #[test]
    fn foreign_feature_set_is_incompatible() {
        let mut pipeline = fitted_pipeline();
        pipeline.features_mut().thresholds.high_utilization_above = 0.7;
        assert_eq!(pipeline.check_compatible().unwrap_err().kind(), ErrorKind::ArtifactLoad);
    }
}
