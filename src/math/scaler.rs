//! Per-column standardization.
//!
//! `StandardScaler::fit` learns mean and population standard deviation for the
//! declared numeric columns of a training matrix and returns a [`FittedScaler`].
//! A fitted scaler has no refit operation: the statistics learned on training
//! data are the statistics applied to every later row.
//!
//! Columns outside the numeric set pass through unchanged.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Spread used in place of a zero (constant column) standard deviation.
const UNIT_SCALE: f64 = 1.0;

/// How a single column is treated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnScaling {
    Standardize { mean: f64, scale: f64 },
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub name: String,
    pub scaling: ColumnScaling,
}

/// Learned statistics, immutable once fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    columns: Vec<ScaledColumn>,
}

pub struct StandardScaler;

impl StandardScaler {
    /// Learn statistics from `rows` laid out as `columns`.
    pub fn fit(columns: &[&str], numeric: &[&str], rows: &[Vec<f64>]) -> Result<FittedScaler, AppError> {
        if rows.is_empty() {
            return Err(AppError::training("Cannot fit scaler on zero rows."));
        }
        if let Some(unknown) = numeric.iter().find(|n| !columns.contains(*n)) {
            return Err(AppError::schema(format!(
                "Numeric column `{unknown}` is not among the scaler columns."
            )));
        }

        let n_cols = columns.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(AppError::schema(format!(
                "Row {i} has {} values, expected {n_cols}.",
                row.len()
            )));
        }

        let matrix = DMatrix::from_fn(rows.len(), n_cols, |r, c| rows[r][c]);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(AppError::value("Scaler input contains non-finite values."));
        }

        let fitted = columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let scaling = if numeric.contains(name) {
                    let col = matrix.column(j);
                    let std = col.variance().sqrt();
                    ColumnScaling::Standardize {
                        mean: col.mean(),
                        scale: if std > 0.0 { std } else { UNIT_SCALE },
                    }
                } else {
                    ColumnScaling::PassThrough
                };
                ScaledColumn {
                    name: name.to_string(),
                    scaling,
                }
            })
            .collect();

        Ok(FittedScaler { columns: fitted })
    }
}

impl FittedScaler {
    pub fn columns(&self) -> &[ScaledColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// True if `columns` is exactly the fitted column list (names and order).
    pub fn matches(&self, columns: &[&str]) -> bool {
        self.columns.len() == columns.len()
            && self.columns.iter().zip(columns).all(|(c, n)| c.name == *n)
    }

    /// Apply the fitted statistics to one row.
    pub fn transform(&self, columns: &[&str], row: &[f64]) -> Result<Vec<f64>, AppError> {
        if !self.matches(columns) {
            return Err(AppError::schema(format!(
                "Row columns [{}] do not match the fitted scaler columns [{}].",
                columns.join(", "),
                self.column_names().join(", ")
            )));
        }
        if row.len() != self.columns.len() {
            return Err(AppError::schema(format!(
                "Row has {} values, expected {}.",
                row.len(),
                self.columns.len()
            )));
        }

        Ok(self
            .columns
            .iter()
            .zip(row)
            .map(|(c, &v)| match c.scaling {
                ColumnScaling::Standardize { mean, scale } => (v - mean) / scale,
                ColumnScaling::PassThrough => v,
            })
            .collect())
    }

    pub fn transform_batch(&self, columns: &[&str], rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, AppError> {
        rows.iter().map(|r| self.transform(columns, r)).collect()
    }
}
