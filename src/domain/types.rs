//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - parsed from CSV/JSON at the boundary
//! - validated once, then passed by reference through the pipeline
//! - written back out by the generator and batch scorer

use std::ops::RangeInclusive;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::BoosterParams;

/// Applicant columns in canonical order.
///
/// Every CSV/JSON boundary and the feature engineer use this order.
pub const APPLICANT_COLUMNS: [&str; 9] = [
    "age",
    "income",
    "employment_years",
    "credit_score",
    "existing_loans",
    "loan_amount",
    "utilization_ratio",
    "late_payments",
    "debt_to_income",
];

/// Binary target column in labeled datasets (1 = default risk).
pub const LABEL_COLUMN: &str = "risk";

pub const AGE_RANGE: RangeInclusive<u32> = 18..=100;
pub const CREDIT_SCORE_RANGE: RangeInclusive<u32> = 300..=850;

/// One applicant, in original (pre-engineering) units.
///
/// `debt_to_income` is supplied by the caller as `loan_amount / income`; the
/// pipeline never derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicantRecord {
    pub age: u32,
    pub income: f64,
    pub employment_years: u32,
    pub credit_score: u32,
    pub existing_loans: u32,
    pub loan_amount: f64,
    pub utilization_ratio: f64,
    pub late_payments: u32,
    pub debt_to_income: f64,
}

impl ApplicantRecord {
    /// Check every field against its documented domain.
    ///
    /// Errors name the offending field so the message can go straight back to
    /// whoever supplied the record.
    pub fn validate(&self) -> Result<(), AppError> {
        if !AGE_RANGE.contains(&self.age) {
            return Err(AppError::value(format!(
                "`age` must be in [{}, {}], got {}.",
                AGE_RANGE.start(),
                AGE_RANGE.end(),
                self.age
            )));
        }
        if !(self.income.is_finite() && self.income > 0.0) {
            return Err(AppError::value(format!(
                "`income` must be finite and > 0, got {}.",
                self.income
            )));
        }
        if !CREDIT_SCORE_RANGE.contains(&self.credit_score) {
            return Err(AppError::value(format!(
                "`credit_score` must be in [{}, {}], got {}.",
                CREDIT_SCORE_RANGE.start(),
                CREDIT_SCORE_RANGE.end(),
                self.credit_score
            )));
        }
        if !(self.loan_amount.is_finite() && self.loan_amount > 0.0) {
            return Err(AppError::value(format!(
                "`loan_amount` must be finite and > 0, got {}.",
                self.loan_amount
            )));
        }
        if !(self.utilization_ratio.is_finite() && (0.0..=1.0).contains(&self.utilization_ratio)) {
            return Err(AppError::value(format!(
                "`utilization_ratio` must be in [0, 1], got {}.",
                self.utilization_ratio
            )));
        }
        if !(self.debt_to_income.is_finite() && self.debt_to_income >= 0.0) {
            return Err(AppError::value(format!(
                "`debt_to_income` must be finite and >= 0, got {}.",
                self.debt_to_income
            )));
        }
        Ok(())
    }

    /// Raw values in `APPLICANT_COLUMNS` order.
    pub fn raw_values(&self) -> [f64; 9] {
        [
            f64::from(self.age),
            self.income,
            f64::from(self.employment_years),
            f64::from(self.credit_score),
            f64::from(self.existing_loans),
            self.loan_amount,
            self.utilization_ratio,
            f64::from(self.late_payments),
            self.debt_to_income,
        ]
    }

    /// Values in `APPLICANT_COLUMNS` order, formatted for CSV.
    ///
    /// Reals use the shortest representation that parses back to the same `f64`.
    pub fn raw_values_display(&self) -> Vec<String> {
        vec![
            self.age.to_string(),
            self.income.to_string(),
            self.employment_years.to_string(),
            self.credit_score.to_string(),
            self.existing_loans.to_string(),
            self.loan_amount.to_string(),
            self.utilization_ratio.to_string(),
            self.late_payments.to_string(),
            self.debt_to_income.to_string(),
        ]
    }

    /// Parse a single JSON object. Unknown, missing or mistyped fields are schema errors.
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        serde_json::from_str(text)
            .map_err(|e| AppError::schema(format!("Invalid applicant record: {e}")))
    }
}

/// Applicant records with aligned binary labels.
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    pub records: Vec<ApplicantRecord>,
    pub labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn new(records: Vec<ApplicantRecord>, labels: Vec<u8>) -> Result<Self, AppError> {
        if records.len() != labels.len() {
            return Err(AppError::schema(format!(
                "Record/label count mismatch: {} records, {} labels.",
                records.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&y| y > 1) {
            return Err(AppError::value(format!("Labels must be 0 or 1, got {bad}.")));
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(negatives, positives)`.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&y| y == 1).count();
        (self.labels.len() - positives, positives)
    }

    pub fn positive_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.class_counts().1 as f64 / self.len() as f64
    }

    /// Rows at the given indices, in index order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// How the training set is brought to class parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BalanceMethod {
    /// Synthetic minority rows interpolated between nearest neighbours.
    Smote,
    /// Duplicate random minority rows.
    Oversample,
}

impl BalanceMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            BalanceMethod::Smote => "SMOTE",
            BalanceMethod::Oversample => "random oversampling",
        }
    }
}

/// A training run's configuration as understood by the pipeline.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub artifact_path: PathBuf,
    /// Fraction of rows held out for evaluation (stratified).
    pub test_fraction: f64,
    /// Seed for the split and the balancer.
    pub seed: u64,
    pub balance: BalanceMethod,
    /// Neighbour count for SMOTE.
    pub smote_k: usize,
    pub booster: BoosterParams,
}
