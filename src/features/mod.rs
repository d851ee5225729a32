//! Feature engineering for applicant records.
//!
//! This is the single definition of the engineered feature set. Training and
//! serving both call [`FeatureEngineer`], and the artifact records a
//! [`FeatureSetDescriptor`] of the definition it was trained with so a loader
//! can refuse an artifact built by different thresholds.
//!
//! Engineered columns, in order:
//!
//! - the nine applicant columns (`APPLICANT_COLUMNS`)
//! - `high_utilization`: `utilization_ratio > 0.75`
//! - `low_credit_score`: `credit_score < 600`
//! - `stable_job`: `employment_years > 5`

use serde::{Deserialize, Serialize};

use crate::domain::{APPLICANT_COLUMNS, ApplicantRecord};
use crate::error::AppError;

/// Bump whenever a column, its order, or a threshold changes.
pub const FEATURE_SET_VERSION: u32 = 1;

/// Engineered column names in the order the scaler and classifier see them.
pub const ENGINEERED_COLUMNS: [&str; 12] = [
    "age",
    "income",
    "employment_years",
    "credit_score",
    "existing_loans",
    "loan_amount",
    "utilization_ratio",
    "late_payments",
    "debt_to_income",
    "high_utilization",
    "low_credit_score",
    "stable_job",
];

pub const INDICATOR_THRESHOLDS: IndicatorThresholds = IndicatorThresholds {
    high_utilization_above: 0.75,
    low_credit_score_below: 600.0,
    stable_job_years_above: 5.0,
};

const UTILIZATION_IDX: usize = 6;
const CREDIT_SCORE_IDX: usize = 3;
const EMPLOYMENT_YEARS_IDX: usize = 2;
const N_RAW: usize = APPLICANT_COLUMNS.len();

/// Cutoffs for the derived indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorThresholds {
    pub high_utilization_above: f64,
    pub low_credit_score_below: f64,
    pub stable_job_years_above: f64,
}

/// What an artifact records about the feature definition that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetDescriptor {
    pub version: u32,
    pub columns: Vec<String>,
    pub thresholds: IndicatorThresholds,
}

/// One engineered row, tagged with the column list it was produced for.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRow {
    pub columns: &'static [&'static str],
    pub values: Vec<f64>,
}

/// Stateless transform from [`ApplicantRecord`] to [`EngineeredRow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &ENGINEERED_COLUMNS
    }

    /// Columns the scaler standardizes; the indicators pass through.
    pub fn numeric_columns(&self) -> &'static [&'static str] {
        &APPLICANT_COLUMNS
    }

    pub fn descriptor(&self) -> FeatureSetDescriptor {
        FeatureSetDescriptor {
            version: FEATURE_SET_VERSION,
            columns: ENGINEERED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            thresholds: INDICATOR_THRESHOLDS,
        }
    }

    /// Validate the record and append the indicator columns.
    pub fn engineer(&self, record: &ApplicantRecord) -> Result<EngineeredRow, AppError> {
        record.validate()?;

        let mut values = Vec::with_capacity(ENGINEERED_COLUMNS.len());
        values.extend_from_slice(&record.raw_values());
        values.extend_from_slice(&[0.0; 3]);
        self.rederive_indicators(&mut values)?;

        Ok(EngineeredRow {
            columns: &ENGINEERED_COLUMNS,
            values,
        })
    }

    /// Recompute the indicator columns of an engineered row from its raw columns.
    ///
    /// Used for rows that were synthesized after engineering (class balancing)
    /// so their indicators agree with their raw values.
    pub fn rederive_indicators(&self, values: &mut [f64]) -> Result<(), AppError> {
        if values.len() != ENGINEERED_COLUMNS.len() {
            return Err(AppError::schema(format!(
                "Engineered row has {} values, expected {}.",
                values.len(),
                ENGINEERED_COLUMNS.len()
            )));
        }
        if let Some(pos) = values[..N_RAW].iter().position(|v| !v.is_finite()) {
            return Err(AppError::value(format!(
                "Non-finite value in column `{}`.",
                ENGINEERED_COLUMNS[pos]
            )));
        }

        let t = INDICATOR_THRESHOLDS;
        values[N_RAW] = indicator(values[UTILIZATION_IDX] > t.high_utilization_above);
        values[N_RAW + 1] = indicator(values[CREDIT_SCORE_IDX] < t.low_credit_score_below);
        values[N_RAW + 2] = indicator(values[EMPLOYMENT_YEARS_IDX] > t.stable_job_years_above);
        Ok(())
    }
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::tests::scenario_record;
    use crate::error::ErrorKind;

    #[test]
    fn engineered_columns_extend_applicant_columns() {
        assert_eq!(&ENGINEERED_COLUMNS[..N_RAW], &APPLICANT_COLUMNS[..]);
        assert_eq!(ENGINEERED_COLUMNS[UTILIZATION_IDX], "utilization_ratio");
        assert_eq!(ENGINEERED_COLUMNS[CREDIT_SCORE_IDX], "credit_score");
        assert_eq!(ENGINEERED_COLUMNS[EMPLOYMENT_YEARS_IDX], "employment_years");
    }

    #[test]
    fn indicators_follow_thresholds() {
        let fe = FeatureEngineer::new();
        let mut r = scenario_record();
        r.utilization_ratio = 0.76;
        r.credit_score = 599;
        r.employment_years = 6;
        let row = fe.engineer(&r).unwrap();
        assert_eq!(&row.values[N_RAW..], &[1.0, 1.0, 1.0]);

        // Boundaries are strict.
        r.utilization_ratio = 0.75;
        r.credit_score = 600;
        r.employment_years = 5;
        let row = fe.engineer(&r).unwrap();
        assert_eq!(&row.values[N_RAW..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn engineering_is_deterministic() {
        let fe = FeatureEngineer::new();
        let r = scenario_record();
        let a = fe.engineer(&r).unwrap();
        let b = fe.engineer(&r).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.values.len(), ENGINEERED_COLUMNS.len());
        assert_eq!(a.values[1], 50_000.0);
    }

    #[test]
    fn invalid_record_fails_fast() {
        let mut r = scenario_record();
        r.income = f64::NAN;
        let err = FeatureEngineer::new().engineer(&r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn rederive_fixes_interpolated_rows() {
        let fe = FeatureEngineer::new();
        let mut values = fe.engineer(&scenario_record()).unwrap().values;
        values[UTILIZATION_IDX] = 0.9;
        fe.rederive_indicators(&mut values).unwrap();
        assert_eq!(values[N_RAW], 1.0);

        let mut short = vec![0.0; 5];
        assert_eq!(
            fe.rederive_indicators(&mut short).unwrap_err().kind(),
            ErrorKind::Schema
        );
    }

    #[test]
    fn descriptor_matches_current_definition() {
        let d = FeatureEngineer::new().descriptor();
        assert_eq!(d.version, FEATURE_SET_VERSION);
        assert_eq!(d.columns.len(), 12);
        assert_eq!(d.thresholds.high_utilization_above, 0.75);
    }
}
