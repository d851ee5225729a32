//! Holdout evaluation metrics for a binary risk model.
//!
//! Everything here runs on the unbalanced holdout: supports equal the real
//! class counts of the rows scored.

use serde::Serialize;

use crate::error::AppError;
use crate::math::log_loss;

/// Counts at a given probability threshold (`p >= threshold` is positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

/// Precision/recall/F1 for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub threshold: f64,
    /// `None` when only one class is present.
    pub roc_auc: Option<f64>,
    pub log_loss: f64,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub classes: Vec<ClassMetrics>,
}

pub fn evaluate(labels: &[u8], probabilities: &[f64], threshold: f64) -> Result<EvaluationReport, AppError> {
    if labels.is_empty() {
        return Err(AppError::training("Cannot evaluate on zero rows."));
    }
    if labels.len() != probabilities.len() {
        return Err(AppError::schema(format!(
            "Label count {} does not match prediction count {}.",
            labels.len(),
            probabilities.len()
        )));
    }
    if probabilities.iter().any(|p| !(p.is_finite() && (0.0..=1.0).contains(p))) {
        return Err(AppError::value("Predicted probabilities must lie in [0, 1]."));
    }

    let confusion = confusion_matrix(labels, probabilities, threshold);
    let rows = labels.len();
    let accuracy = (confusion.true_negative + confusion.true_positive) as f64 / rows as f64;

    let classes = vec![
        class_metrics(
            0,
            confusion.true_negative,
            confusion.false_negative,
            confusion.false_positive,
        ),
        class_metrics(
            1,
            confusion.true_positive,
            confusion.false_positive,
            confusion.false_negative,
        ),
    ];

    Ok(EvaluationReport {
        rows,
        threshold,
        roc_auc: roc_auc(labels, probabilities),
        log_loss: log_loss(labels, probabilities).unwrap_or(f64::NAN),
        accuracy,
        confusion,
        classes,
    })
}

pub fn confusion_matrix(labels: &[u8], probabilities: &[f64], threshold: f64) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix {
        true_negative: 0,
        false_positive: 0,
        false_negative: 0,
        true_positive: 0,
    };
    for (&y, &p) in labels.iter().zip(probabilities) {
        match (y == 1, p >= threshold) {
            (false, false) => cm.true_negative += 1,
            (false, true) => cm.false_positive += 1,
            (true, false) => cm.false_negative += 1,
            (true, true) => cm.true_positive += 1,
        }
    }
    cm
}

/// `hits` = predicted and actual, `false_hits` = predicted but not actual,
/// `misses` = actual but not predicted. Empty denominators give 0.
fn class_metrics(label: u8, hits: usize, false_hits: usize, misses: usize) -> ClassMetrics {
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(hits, hits + false_hits);
    let recall = ratio(hits, hits + misses);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics {
        label,
        precision,
        recall,
        f1,
        support: hits + misses,
    }
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney U) statistic.
///
/// Tied scores share their average rank.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the group spans ranks start+1 ..= end.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pos_in_group = order[start..end].iter().filter(|&&i| labels[i] == 1).count();
        rank_sum_pos += avg_rank * pos_in_group as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}
