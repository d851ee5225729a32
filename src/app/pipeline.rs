//! Shared "train pipeline" logic used by the CLI handlers and the integration tests.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV load -> stratified split -> balance/scale/fit on train -> holdout evaluation -> artifact
//!
//! The handlers can then focus on presentation (printing vs writing files).

use tracing::info;

use crate::domain::{BalanceMethod, LabeledDataset, TrainConfig};
use crate::error::AppError;
use crate::fit::{EvaluationReport, balancer_for, evaluate, stratified_split};
use crate::io::{PipelineArtifact, TrainingMetadata, load_labeled_csv};
use crate::scoring::ScoringPipeline;

/// All computed outputs of a single `credit-risk train` run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub artifact: PipelineArtifact,
    /// Holdout metrics, computed on rows the balancer never saw.
    pub evaluation: EvaluationReport,
}

/// Load the labeled CSV named in the config and train on it.
///
/// The artifact is returned, not written; the caller decides where it goes.
pub fn run_training(config: &TrainConfig, threshold: f64) -> Result<TrainOutput, AppError> {
    let data = load_labeled_csv(&config.data_path)?;
    run_training_with_data(config, &data, threshold)
}

/// Train on an in-memory dataset.
pub fn run_training_with_data(
    config: &TrainConfig,
    data: &LabeledDataset,
    threshold: f64,
) -> Result<TrainOutput, AppError> {
    config.booster.validate()?;

    // 1) Split before balancing so synthetic rows never reach the holdout.
    let split = stratified_split(&data.labels, config.test_fraction, config.seed)?;
    let train = data.subset(&split.train);
    let holdout = data.subset(&split.test);
    info!(
        rows = data.len(),
        train = train.len(),
        holdout = holdout.len(),
        positive_rate = data.positive_rate(),
        "dataset split"
    );

    // 2) Balance, scale and fit on the training part only.
    let balancer = balancer_for(config.balance, config.seed, config.smote_k)?;
    let (pipeline, fit) =
        ScoringPipeline::fit(&train.records, &train.labels, balancer.as_ref(), &config.booster)?;

    // 3) Evaluate on the untouched holdout.
    let evaluation = evaluate_pipeline(&pipeline, &holdout, threshold)?;
    info!(
        roc_auc = evaluation.roc_auc,
        log_loss = evaluation.log_loss,
        accuracy = evaluation.accuracy,
        "holdout evaluated"
    );

    let training = TrainingMetadata {
        rows_total: data.len(),
        train_rows: train.len(),
        test_rows: holdout.len(),
        test_fraction: config.test_fraction,
        seed: config.seed,
        smote_k: (config.balance == BalanceMethod::Smote).then_some(config.smote_k),
        fit,
    };

    Ok(TrainOutput {
        artifact: PipelineArtifact::new(pipeline, training),
        evaluation,
    })
}

/// Score every row of `data` and compute metrics at `threshold`.
///
/// Any row the pipeline rejects fails the whole evaluation, naming the row.
pub fn evaluate_pipeline(
    pipeline: &ScoringPipeline,
    data: &LabeledDataset,
    threshold: f64,
) -> Result<EvaluationReport, AppError> {
    let probabilities = pipeline
        .predict_proba_batch(&data.records)
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.map_err(|e| AppError::new(e.kind(), format!("Row {i}: {}", e.message()))))
        .collect::<Result<Vec<_>, _>>()?;
    evaluate(&data.labels, &probabilities, threshold)
}
