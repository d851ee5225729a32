//! Read/write the trained pipeline artifact.
//!
//! The artifact is a single JSON document:
//! - `format_version`, `tool`, `created_at`
//! - `training`: how the pipeline was fit (split, balancing, row counts)
//! - `pipeline`: feature-set descriptor, fitted scaler, classifier trees
//!
//! Writes go to a temp file in the destination directory and are renamed into
//! place, so readers never see a half-written artifact. Loading checks the
//! format version and the feature-set descriptor before anything is scored.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::domain::BalanceMethod;
use crate::error::AppError;
use crate::scoring::{FitSummary, ScoringPipeline};

/// Bump when the JSON layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
pub const TOOL_NAME: &str = "credit-risk";

/// How the artifact's pipeline was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Rows in the input dataset.
    pub rows_total: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_fraction: f64,
    pub seed: u64,
    /// SMOTE neighbour count, when SMOTE was used.
    pub smote_k: Option<usize>,
    pub fit: FitSummary,
}

impl TrainingMetadata {
    pub fn balance_method(&self) -> BalanceMethod {
        self.fit.balance_method
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub training: TrainingMetadata,
    pub pipeline: ScoringPipeline,
}

impl PipelineArtifact {
    pub fn new(pipeline: ScoringPipeline, training: TrainingMetadata) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            tool: TOOL_NAME.to_string(),
            created_at: Utc::now(),
            training,
            pipeline,
        }
    }
}

/// Write the artifact atomically.
pub fn write_artifact(path: &Path, artifact: &PipelineArtifact) -> Result<(), AppError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| AppError::io(format!("Failed to create directory '{}': {e}", dir.display())))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| AppError::io(format!("Failed to create temp file in '{}': {e}", dir.display())))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        serde_json::to_writer_pretty(&mut writer, artifact)
            .map_err(|e| AppError::io(format!("Failed to serialize artifact: {e}")))?;
        writer
            .flush()
            .map_err(|e| AppError::io(format!("Failed to write artifact: {e}")))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| AppError::io(format!("Failed to sync artifact: {e}")))?;
    tmp.persist(path)
        .map_err(|e| AppError::io(format!("Failed to move artifact into '{}': {}", path.display(), e.error)))?;

    info!(path = %path.display(), trees = artifact.pipeline.classifier().n_trees(), "artifact written");
    Ok(())
}

/// Read and verify an artifact.
///
/// Every failure (missing file, bad JSON, wrong version, foreign feature set)
/// is an artifact-load error.
pub fn read_artifact(path: &Path) -> Result<PipelineArtifact, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::artifact(format!("Failed to read artifact '{}': {e}", path.display())))?;

    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| AppError::artifact(format!("Artifact '{}' is not valid JSON: {e}", path.display())))?;

    match value.get("format_version").and_then(serde_json::Value::as_u64) {
        Some(v) if v == u64::from(ARTIFACT_FORMAT_VERSION) => {}
        Some(v) => {
            return Err(AppError::artifact(format!(
                "Artifact format version {v} is not supported (expected {ARTIFACT_FORMAT_VERSION})."
            )));
        }
        None => return Err(AppError::artifact("Artifact has no `format_version`.")),
    }

    let artifact: PipelineArtifact = serde_json::from_value(value)
        .map_err(|e| AppError::artifact(format!("Artifact '{}' is malformed: {e}", path.display())))?;

    if artifact.tool != TOOL_NAME {
        return Err(AppError::artifact(format!(
            "Artifact was produced by `{}`, not `{TOOL_NAME}`.",
            artifact.tool
        )));
    }
    artifact.pipeline.check_compatible()?;

    info!(
        path = %path.display(),
        created_at = %artifact.created_at,
        trees = artifact.pipeline.classifier().n_trees(),
        "artifact loaded"
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::tests::scenario_record;
    use crate::error::ErrorKind;
    use crate::scoring::tests::fitted_pipeline;

    fn artifact() -> PipelineArtifact {
        let pipeline = fitted_pipeline();
        let fit = FitSummary {
            balance_method: BalanceMethod::Smote,
            rows_before_balancing: 800,
            rows_after_balancing: 1000,
            class_counts_before: (300, 500),
            class_counts_after: (500, 500),
            n_trees: pipeline.classifier().n_trees(),
        };
        PipelineArtifact::new(
            pipeline,
            TrainingMetadata {
                rows_total: 1000,
                train_rows: 800,
                test_rows: 200,
                test_fraction: 0.2,
                seed: 42,
                smote_k: Some(5),
                fit,
            },
        )
    }

    #[test]
    fn round_trip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let a = artifact();
        write_artifact(&path, &a).unwrap();
        let b = read_artifact(&path).unwrap();

        assert_eq!(a.pipeline, b.pipeline);
        assert_eq!(a.training, b.training);
        let r = scenario_record();
        let pa = a.pipeline.predict_proba(&r).unwrap();
        let pb = b.pipeline.predict_proba(&r).unwrap();
        assert!((pa - pb).abs() < 1e-6);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/model.json");
        write_artifact(&path, &artifact()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn load_failures_are_artifact_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert_eq!(read_artifact(&missing).unwrap_err().kind(), ErrorKind::ArtifactLoad);

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(read_artifact(&corrupt).unwrap_err().kind(), ErrorKind::ArtifactLoad);

        let truncated = dir.path().join("truncated.json");
        fs::write(&truncated, r#"{"format_version": 1, "tool": "credit-risk"}"#).unwrap();
        assert_eq!(read_artifact(&truncated).unwrap_err().kind(), ErrorKind::ArtifactLoad);
    }

    #[test]
    fn version_and_feature_set_mismatches_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write_artifact(&path, &artifact()).unwrap();
        let original: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        let mut v = original.clone();
        v["format_version"] = serde_json::json!(2);
        fs::write(&path, v.to_string()).unwrap();
        let err = read_artifact(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoad);
        assert!(err.message().contains("version 2"));

        let mut v = original.clone();
        v["pipeline"]["feature_set"]["thresholds"]["high_utilization_above"] = serde_json::json!(0.7);
        fs::write(&path, v.to_string()).unwrap();
        let err = read_artifact(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoad);
        assert!(err.message().contains("feature set"));

        let mut v = original;
        v["pipeline"]["feature_set"]["version"] = serde_json::json!(99);
        fs::write(&path, v.to_string()).unwrap();
        assert_eq!(read_artifact(&path).unwrap_err().kind(), ErrorKind::ArtifactLoad);
    }
}
