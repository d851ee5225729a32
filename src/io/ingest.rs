//! CSV ingest for labeled training data and applicant batches.
//!
//! Design goals:
//! - **Exact schema**: the header set must be exactly the expected columns
//!   (any order). Missing or extra columns are schema errors (exit code 2).
//! - **Strict training rows**: one bad row aborts a training/evaluation load.
//! - **Isolated batch rows**: a bad applicant row becomes an error entry for
//!   that row only.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::info;

use crate::domain::{APPLICANT_COLUMNS, ApplicantRecord, LABEL_COLUMN, LabeledDataset};
use crate::error::AppError;

/// Load a labeled CSV (applicant columns plus `risk`).
pub fn load_labeled_csv(path: &Path) -> Result<LabeledDataset, AppError> {
    let (mut reader, header_map) = open_csv(path, true)?;

    let mut records = Vec::new();
    let mut labels = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::schema(format!("Line {line}: CSV parse error: {e}")))?;

        let applicant = parse_applicant(&record, &header_map).map_err(|e| at_line(line, e))?;
        applicant.validate().map_err(|e| at_line(line, e))?;
        let label = parse_label(&record, &header_map).map_err(|e| at_line(line, e))?;

        records.push(applicant);
        labels.push(label);
    }

    if records.is_empty() {
        return Err(AppError::schema(format!("'{}' contains no data rows.", path.display())));
    }

    let dataset = LabeledDataset::new(records, labels)?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        positive_rate = dataset.positive_rate(),
        "loaded labeled dataset"
    );
    Ok(dataset)
}

/// Load an applicant CSV (exactly the nine applicant columns).
///
/// File-level problems (unreadable file, bad header) fail the whole call.
/// Row-level problems are returned in place of that row's record.
pub fn load_applicant_csv(path: &Path) -> Result<Vec<Result<ApplicantRecord, AppError>>, AppError> {
    let (mut reader, header_map) = open_csv(path, false)?;

    let rows: Vec<Result<ApplicantRecord, AppError>> = reader
        .records()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            result
                .map_err(|e| AppError::schema(format!("CSV parse error: {e}")))
                .and_then(|record| parse_applicant(&record, &header_map))
                .map_err(|e| at_line(line, e))
        })
        .collect();

    info!(path = %path.display(), rows = rows.len(), "loaded applicant batch");
    Ok(rows)
}

fn open_csv(path: &Path, labeled: bool) -> Result<(csv::Reader<File>, HashMap<String, usize>), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::schema(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers)?;
    ensure_exact_columns(&header_map, labeled)?;
    Ok((reader, header_map))
}

fn build_header_map(headers: &StringRecord) -> Result<HashMap<String, usize>, AppError> {
    let mut map = HashMap::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        let name = normalize_header_name(name);
        if map.insert(name.clone(), idx).is_some() {
            return Err(AppError::schema(format!("Duplicate column: `{name}`")));
        }
    }
    Ok(map)
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_exact_columns(header_map: &HashMap<String, usize>, labeled: bool) -> Result<(), AppError> {
    let mut expected: Vec<&str> = APPLICANT_COLUMNS.to_vec();
    if labeled {
        expected.push(LABEL_COLUMN);
    }

    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::schema(format!(
            "Missing required column(s): {}",
            format_columns(&missing)
        )));
    }

    let mut extra: Vec<&str> = header_map
        .keys()
        .map(String::as_str)
        .filter(|c| !expected.contains(c))
        .collect();
    if !extra.is_empty() {
        extra.sort_unstable();
        return Err(AppError::schema(format!(
            "Unexpected column(s): {}",
            format_columns(&extra)
        )));
    }
    Ok(())
}

fn format_columns(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_applicant(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<ApplicantRecord, AppError> {
    Ok(ApplicantRecord {
        age: parse_u32(record, header_map, "age")?,
        income: parse_f64(record, header_map, "income")?,
        employment_years: parse_u32(record, header_map, "employment_years")?,
        credit_score: parse_u32(record, header_map, "credit_score")?,
        existing_loans: parse_u32(record, header_map, "existing_loans")?,
        loan_amount: parse_f64(record, header_map, "loan_amount")?,
        utilization_ratio: parse_f64(record, header_map, "utilization_ratio")?,
        late_payments: parse_u32(record, header_map, "late_payments")?,
        debt_to_income: parse_f64(record, header_map, "debt_to_income")?,
    })
}

fn parse_label(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<u8, AppError> {
    match get_required(record, header_map, LABEL_COLUMN)? {
        "0" => Ok(0),
        "1" => Ok(1),
        other => Err(AppError::value(format!(
            "`{LABEL_COLUMN}` must be 0 or 1, got `{other}`."
        ))),
    }
}

fn parse_u32(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<u32, AppError> {
    let raw = get_required(record, header_map, name)?;
    raw.parse::<u32>()
        .map_err(|_| AppError::schema(format!("`{name}` must be a non-negative integer, got `{raw}`.")))
}

fn parse_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, AppError> {
    let raw = get_required(record, header_map, name)?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| AppError::schema(format!("`{name}` must be a number, got `{raw}`.")))?;
    if !v.is_finite() {
        return Err(AppError::value(format!("`{name}` must be finite, got `{raw}`.")));
    }
    Ok(v)
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, AppError> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| AppError::schema(format!("Missing required column: `{name}`")))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::schema(format!("Missing required value: `{name}`")))
}

fn at_line(line: usize, err: AppError) -> AppError {
    AppError::new(err.kind(), format!("Line {line}: {}", err.message()))
}
