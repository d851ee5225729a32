//! CSV exports: generated datasets and batch decisions.
//!
//! Both are meant to be easy to consume in spreadsheets or downstream scripts.
//! A generated dataset reloads through [`crate::io::load_labeled_csv`].

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::decision::Decision;
use crate::domain::{APPLICANT_COLUMNS, LABEL_COLUMN, LabeledDataset};
use crate::error::AppError;

pub const DECISION_COLUMNS: [&str; 5] = ["index", "probability", "outcome", "reasons", "error"];

/// Separator between reasons inside the single `reasons` cell.
pub const REASON_SEPARATOR: &str = "; ";

/// Write a labeled dataset as CSV (applicant columns, then `risk`).
pub fn write_dataset_csv(path: &Path, data: &LabeledDataset) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create dataset CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header: Vec<&str> = APPLICANT_COLUMNS.to_vec();
    header.push(LABEL_COLUMN);
    writer
        .write_record(&header)
        .map_err(|e| AppError::io(format!("Failed to write dataset CSV header: {e}")))?;

    for (r, y) in data.records.iter().zip(&data.labels) {
        let mut row: Vec<String> = r.raw_values_display();
        row.push(y.to_string());
        writer
            .write_record(&row)
            .map_err(|e| AppError::io(format!("Failed to write dataset CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}

/// Write one CSV row per input record. Failed rows carry only `index` and `error`.
pub fn write_decisions_csv<W: Write>(out: W, results: &[Result<Decision, AppError>]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(DECISION_COLUMNS)
        .map_err(|e| AppError::io(format!("Failed to write decisions header: {e}")))?;

    for (index, result) in results.iter().enumerate() {
        let row: [String; 5] = match result {
            Ok(d) => [
                index.to_string(),
                format!("{:.6}", d.probability()),
                d.outcome().to_string(),
                d.reasons()
                    .iter()
                    .map(|r| r.message())
                    .collect::<Vec<_>>()
                    .join(REASON_SEPARATOR),
                String::new(),
            ],
            Err(e) => [index.to_string(), String::new(), String::new(), String::new(), e.to_string()],
        };
        writer
            .write_record(&row)
            .map_err(|e| AppError::io(format!("Failed to write decisions row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush decisions: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ReasonCode;
    use crate::domain::types::tests::scenario_record;
    use crate::io::load_labeled_csv;

    #[test]
    fn dataset_round_trips_through_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut odd = scenario_record();
        odd.income = 61_234.567_891_234;
        odd.debt_to_income = odd.loan_amount / odd.income;
        let data = LabeledDataset::new(vec![scenario_record(), odd], vec![0, 1]).unwrap();

        write_dataset_csv(&path, &data).unwrap();
        let back = load_labeled_csv(&path).unwrap();
        assert_eq!(back.records, data.records);
        assert_eq!(back.labels, data.labels);
    }

    #[test]
    fn decisions_csv_layout() {
        let results = vec![
            Ok(Decision::Approve { probability: 0.1 }),
            Ok(Decision::Reject {
                probability: 0.9,
                reasons: vec![ReasonCode::LowCreditScore, ReasonCode::HighUtilization],
            }),
            Err(AppError::value("`income` must be finite and > 0, got 0.")),
        ];
        let mut buf = Vec::new();
        write_decisions_csv(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,probability,outcome,reasons,error");
        assert_eq!(lines[1], "0,0.100000,approve,,");
        assert_eq!(lines[2], "1,0.900000,reject,Low credit bureau score; High credit utilization,");
        assert!(lines[3].starts_with("2,,,,"));
        assert!(lines[3].contains("value error"));
    }
}
