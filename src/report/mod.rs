//! Reporting utilities: dataset summaries and formatted terminal output.

use serde::Serialize;

use crate::domain::{APPLICANT_COLUMNS, LABEL_COLUMN, LabeledDataset};

pub mod format;

pub use format::*;

/// Descriptive statistics for one column.
///
/// `std` is the sample standard deviation; quantiles interpolate linearly
/// between order statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: &'static str,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Shape, target distribution and per-column statistics of a labeled dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub negatives: usize,
    pub positives: usize,
    pub stats: Vec<ColumnSummary>,
}

impl DatasetSummary {
    pub fn positive_rate(&self) -> f64 {
        if self.rows == 0 { 0.0 } else { self.positives as f64 / self.rows as f64 }
    }
}

pub fn summarize_dataset(data: &LabeledDataset) -> DatasetSummary {
    let (negatives, positives) = data.class_counts();

    let mut stats: Vec<ColumnSummary> = APPLICANT_COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = data.records.iter().map(|r| r.raw_values()[j]).collect();
            column_summary(name, values)
        })
        .collect();
    stats.push(column_summary(
        LABEL_COLUMN,
        data.labels.iter().map(|&y| f64::from(y)).collect(),
    ));

    DatasetSummary {
        rows: data.len(),
        columns: APPLICANT_COLUMNS.len() + 1,
        negatives,
        positives,
        stats,
    }
}

fn column_summary(name: &'static str, mut values: Vec<f64>) -> ColumnSummary {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let mean = if n == 0 { f64::NAN } else { values.iter().sum::<f64>() / n as f64 };
    let std = if n < 2 {
        f64::NAN
    } else {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    };

    ColumnSummary {
        name,
        count: n,
        mean,
        std,
        min: values.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values.last().copied().unwrap_or(f64::NAN),
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}
