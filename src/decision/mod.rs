//! Approve/reject decisions with reason codes.
//!
//! A probability enters as a [`PendingDecision`]; [`PendingDecision::render`]
//! consumes it and yields a terminal [`Decision`]. Reasons are evaluated only
//! on rejection, against the raw applicant record (not the scaled features),
//! and every predicate is checked so all fired reasons are reported in order.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::ApplicantRecord;
use crate::error::AppError;

pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Cutoffs for the reason predicates. All comparisons are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonCutoffs {
    pub low_credit_score_below: u32,
    pub max_late_payments: u32,
    pub high_utilization_above: f64,
    pub high_debt_to_income_above: f64,
}

impl Default for ReasonCutoffs {
    fn default() -> Self {
        Self {
            low_credit_score_below: 600,
            max_late_payments: 3,
            high_utilization_above: 0.8,
            high_debt_to_income_above: 0.6,
        }
    }
}

/// Threshold plus reason cutoffs.
///
/// Loaded once through [`crate::config`]; tests build it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    /// Probabilities at or above this are rejected.
    pub threshold: f64,
    pub reasons: ReasonCutoffs,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            reasons: ReasonCutoffs::default(),
        }
    }
}

impl DecisionPolicy {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(AppError::config(format!(
                "`decision.threshold` must be in (0, 1], got {}.",
                self.threshold
            )));
        }
        let r = &self.reasons;
        for (name, v) in [
            ("decision.reasons.high_utilization_above", r.high_utilization_above),
            ("decision.reasons.high_debt_to_income_above", r.high_debt_to_income_above),
        ] {
            if !v.is_finite() {
                return Err(AppError::config(format!("`{name}` must be finite, got {v}.")));
            }
        }
        Ok(())
    }
}

/// Why an application was rejected. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    #[serde(rename = "Low credit bureau score")]
    LowCreditScore,
    #[serde(rename = "Excessive late payments")]
    ExcessiveLatePayments,
    #[serde(rename = "High credit utilization")]
    HighUtilization,
    #[serde(rename = "High debt-to-income ratio")]
    HighDebtToIncome,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 4] = [
        ReasonCode::LowCreditScore,
        ReasonCode::ExcessiveLatePayments,
        ReasonCode::HighUtilization,
        ReasonCode::HighDebtToIncome,
    ];

    pub fn message(self) -> &'static str {
        match self {
            ReasonCode::LowCreditScore => "Low credit bureau score",
            ReasonCode::ExcessiveLatePayments => "Excessive late payments",
            ReasonCode::HighUtilization => "High credit utilization",
            ReasonCode::HighDebtToIncome => "High debt-to-income ratio",
        }
    }

    fn fires(self, record: &ApplicantRecord, cutoffs: &ReasonCutoffs) -> bool {
        match self {
            ReasonCode::LowCreditScore => record.credit_score < cutoffs.low_credit_score_below,
            ReasonCode::ExcessiveLatePayments => record.late_payments > cutoffs.max_late_payments,
            ReasonCode::HighUtilization => record.utilization_ratio > cutoffs.high_utilization_above,
            ReasonCode::HighDebtToIncome => record.debt_to_income > cutoffs.high_debt_to_income_above,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Every reason that fires for `record`, in [`ReasonCode::ALL`] order.
pub fn evaluate_reasons(record: &ApplicantRecord, cutoffs: &ReasonCutoffs) -> Vec<ReasonCode> {
    ReasonCode::ALL
        .into_iter()
        .filter(|code| code.fires(record, cutoffs))
        .collect()
}

/// Terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Decision {
    Approve { probability: f64 },
    Reject { probability: f64, reasons: Vec<ReasonCode> },
}

impl Decision {
    pub fn probability(&self) -> f64 {
        match self {
            Decision::Approve { probability } | Decision::Reject { probability, .. } => *probability,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approve { .. })
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Approve { .. } => "approve",
            Decision::Reject { .. } => "reject",
        }
    }

    /// Empty for approvals.
    pub fn reasons(&self) -> &[ReasonCode] {
        match self {
            Decision::Approve { .. } => &[],
            Decision::Reject { reasons, .. } => reasons,
        }
    }
}

/// A scored application that has not been decided yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingDecision {
    probability: f64,
}

impl PendingDecision {
    pub fn new(probability: f64) -> Result<Self, AppError> {
        if !(probability.is_finite() && (0.0..=1.0).contains(&probability)) {
            return Err(AppError::value(format!(
                "Risk probability must be in [0, 1], got {probability}."
            )));
        }
        Ok(Self { probability })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn render(self, record: &ApplicantRecord, policy: &DecisionPolicy) -> Decision {
        let probability = self.probability;
        if probability < policy.threshold {
            return Decision::Approve { probability };
        }

        let reasons = evaluate_reasons(record, &policy.reasons);
        if reasons.is_empty() {
            warn!(
                probability,
                threshold = policy.threshold,
                "rejected with no reason predicate firing; model and rules disagree"
            );
        }
        Decision::Reject { probability, reasons }
    }
}

/// Applies one [`DecisionPolicy`] to scored records.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: DecisionPolicy,
}

impl DecisionEngine {
    pub fn new(policy: DecisionPolicy) -> Result<Self, AppError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn decide(&self, probability: f64, record: &ApplicantRecord) -> Result<Decision, AppError> {
        Ok(PendingDecision::new(probability)?.render(record, &self.policy))
    }
}
