//! Serving handle: a risk model plus the decision policy.
//!
//! A [`RiskAssessor`] is built once (after the artifact loads) and passed to
//! whatever needs decisions. It holds no mutable state, so clones and `Arc`
//! shares are free to use it from any thread.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::decision::{Decision, DecisionEngine};
use crate::domain::ApplicantRecord;
use crate::error::AppError;
use crate::scoring::RiskModel;

#[derive(Clone)]
pub struct RiskAssessor {
    model: Arc<dyn RiskModel>,
    engine: DecisionEngine,
}

impl RiskAssessor {
    pub fn new(model: Arc<dyn RiskModel>, engine: DecisionEngine) -> Self {
        Self { model, engine }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Score and decide one applicant.
    pub fn assess(&self, record: &ApplicantRecord) -> Result<Decision, AppError> {
        let probability = self.model.predict_proba(record)?;
        let decision = self.engine.decide(probability, record)?;
        debug!(
            probability,
            outcome = decision.outcome(),
            reasons = decision.reasons().len(),
            "applicant assessed"
        );
        Ok(decision)
    }

    /// One result per record, in input order. A failing record does not stop the rest.
    pub fn assess_batch(&self, records: &[ApplicantRecord]) -> Vec<Result<Decision, AppError>> {
        records.par_iter().map(|r| self.assess(r)).collect()
    }
}

impl std::fmt::Debug for RiskAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskAssessor")
            .field("policy", self.engine.policy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionPolicy, ReasonCode};
    use crate::domain::types::tests::scenario_record;
    use crate::error::ErrorKind;

    /// Returns the same probability for everyone.
    struct ConstantModel(f64);

    impl RiskModel for ConstantModel {
        fn predict_proba(&self, record: &ApplicantRecord) -> Result<f64, AppError> {
            record.validate()?;
            Ok(self.0)
        }
    }

    fn assessor(p: f64) -> RiskAssessor {
        RiskAssessor::new(
            Arc::new(ConstantModel(p)),
            DecisionEngine::new(DecisionPolicy::default()).unwrap(),
        )
    }

    #[test]
    fn low_probability_is_approved() {
        let d = assessor(0.05).assess(&scenario_record()).unwrap();
        assert_eq!(d, Decision::Approve { probability: 0.05 });
    }

    #[test]
    fn rejection_lists_fired_reasons() {
        let mut r = scenario_record();
        r.late_payments = 4;
        let d = assessor(0.8).assess(&r).unwrap();
        assert_eq!(d.reasons(), &[ReasonCode::ExcessiveLatePayments]);
    }

    #[test]
    fn model_disagreeing_with_rules_gives_empty_reasons() {
        let d = assessor(0.9).assess(&scenario_record()).unwrap();
        assert!(!d.is_approved());
        assert!(d.reasons().is_empty());
    }

    #[test]
    fn out_of_range_model_output_is_value_error() {
        let err = assessor(1.5).assess(&scenario_record()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn batch_isolates_bad_rows() {
        let mut bad = scenario_record();
        bad.credit_score = 100;
        let out = assessor(0.1).assess_batch(&[scenario_record(), bad, scenario_record()]);
        assert!(out[0].is_ok());
        assert_eq!(out[1].as_ref().unwrap_err().kind(), ErrorKind::Value);
        assert!(out[2].is_ok());
    }

    #[test]
    fn assessor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RiskAssessor>();
    }
}
