//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the scoring/training code stays clean and testable
//! - output changes are localized

use crate::decision::Decision;
use crate::fit::EvaluationReport;
use crate::io::TrainingMetadata;
use crate::models::BoosterParams;
use crate::report::DatasetSummary;

/// Shape, target distribution and `describe`-style column table.
pub fn format_dataset_summary(summary: &DatasetSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("Dataset shape: ({}, {})\n", summary.rows, summary.columns));
    out.push_str("\nTarget distribution (risk):\n");
    let rate = summary.positive_rate();
    out.push_str(&format!("  0: {:>6}  ({:.4})\n", summary.negatives, 1.0 - rate));
    out.push_str(&format!("  1: {:>6}  ({:.4})\n", summary.positives, rate));

    out.push_str("\nSummary statistics:\n");
    out.push_str(&format!(
        "{:<18} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    ));
    for s in &summary.stats {
        out.push_str(&format!(
            "{:<18} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
            s.name,
            s.count,
            fmt_stat(s.mean),
            fmt_stat(s.std),
            fmt_stat(s.min),
            fmt_stat(s.q25),
            fmt_stat(s.median),
            fmt_stat(s.q75),
            fmt_stat(s.max),
        ));
    }

    out
}

/// Training run summary followed by the holdout evaluation.
pub fn format_training_report(meta: &TrainingMetadata, params: &BoosterParams, eval: &EvaluationReport) -> String {
    let mut out = String::new();

    out.push_str("=== credit-risk - training ===\n");
    out.push_str(&format!(
        "Rows: {} | train={} | holdout={} (test_fraction={:.2}, seed={})\n",
        meta.rows_total, meta.train_rows, meta.test_rows, meta.test_fraction, meta.seed
    ));
    let fit = &meta.fit;
    let method = match meta.smote_k {
        Some(k) => format!("{} (k={k})", fit.balance_method.display_name()),
        None => fit.balance_method.display_name().to_string(),
    };
    out.push_str(&format!(
        "Balancing: {method} | before={} (0: {}, 1: {}) | after={} (0: {}, 1: {})\n",
        fit.rows_before_balancing,
        fit.class_counts_before.0,
        fit.class_counts_before.1,
        fit.rows_after_balancing,
        fit.class_counts_after.0,
        fit.class_counts_after.1,
    ));
    out.push_str(&format!(
        "Classifier: gradient-boosted trees | trees={} depth={} eta={} lambda={} gamma={} min_child_weight={} subsample={} colsample={}\n",
        fit.n_trees,
        params.max_depth,
        params.learning_rate,
        params.lambda,
        params.gamma,
        params.min_child_weight,
        params.subsample,
        params.colsample,
    ));
    out.push('\n');
    out.push_str("Holdout evaluation (unbalanced):\n");
    out.push_str(&format_evaluation(eval));

    out
}

/// Metrics table in the familiar precision/recall/F1 layout.
pub fn format_evaluation(eval: &EvaluationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Rows: {} | ROC-AUC: {} | log loss: {:.4} | accuracy: {:.4} (threshold {:.2})\n",
        eval.rows,
        eval.roc_auc.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".to_string()),
        eval.log_loss,
        eval.accuracy,
        eval.threshold,
    ));
    out.push('\n');
    out.push_str(&format!(
        "{:<8} {:>10} {:>10} {:>10} {:>10}\n",
        "class", "precision", "recall", "f1", "support"
    ));
    for c in &eval.classes {
        out.push_str(&format!(
            "{:<8} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            c.label, c.precision, c.recall, c.f1, c.support
        ));
    }

    let cm = &eval.confusion;
    out.push('\n');
    out.push_str("Confusion matrix (rows = actual, cols = predicted):\n");
    out.push_str(&format!("{:<10} {:>8} {:>8}\n", "", "pred 0", "pred 1"));
    out.push_str(&format!("{:<10} {:>8} {:>8}\n", "actual 0", cm.true_negative, cm.false_positive));
    out.push_str(&format!("{:<10} {:>8} {:>8}\n", "actual 1", cm.false_negative, cm.true_positive));

    out
}

/// One decision for a human reader.
pub fn format_decision(decision: &Decision) -> String {
    let pct = decision.probability() * 100.0;
    match decision {
        Decision::Approve { .. } => format!("APPROVED | risk probability: {pct:.2}%\n"),
        Decision::Reject { reasons, .. } => {
            let mut out = format!("REJECTED | risk probability: {pct:.2}%\n");
            if reasons.is_empty() {
                out.push_str("Reasons: none of the rule-based risk factors fired\n");
            } else {
                out.push_str("Reasons:\n");
                for r in reasons {
                    out.push_str(&format!("- {r}\n"));
                }
            }
            out
        }
    }
}

fn fmt_stat(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.abs() >= 1e6 {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ReasonCode;
    use crate::fit::evaluate;

    #[test]
    fn decision_text() {
        let d = Decision::Approve { probability: 0.1234 };
        assert_eq!(format_decision(&d), "APPROVED | risk probability: 12.34%\n");

        let d = Decision::Reject {
            probability: 0.5,
            reasons: vec![ReasonCode::LowCreditScore, ReasonCode::HighDebtToIncome],
        };
        let text = format_decision(&d);
        assert!(text.starts_with("REJECTED | risk probability: 50.00%"));
        assert!(text.contains("- Low credit bureau score\n- High debt-to-income ratio\n"));

        let d = Decision::Reject {
            probability: 0.5,
            reasons: vec![],
        };
        assert!(format_decision(&d).contains("none of the rule-based risk factors fired"));
    }

    #[test]
    fn evaluation_table_lists_both_classes() {
        let eval = evaluate(&[0, 0, 1, 1], &[0.1, 0.7, 0.6, 0.2], 0.5).unwrap();
        let text = format_evaluation(&eval);
        assert!(text.contains("ROC-AUC: 0.5000"));
        assert!(text.contains("actual 0"));
        assert_eq!(text.lines().filter(|l| l.starts_with('0') || l.starts_with('1')).count(), 2);
    }

    #[test]
    fn stat_formatting() {
        assert_eq!(fmt_stat(f64::NAN), "NaN");
        assert_eq!(fmt_stat(0.5), "0.5000");
    }
}
