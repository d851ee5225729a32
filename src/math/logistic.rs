//! Logistic link and log-loss helpers shared by the booster and the metrics.

/// Probabilities are clamped to `[EPS, 1 - EPS]` before taking logs.
pub const PROB_EPS: f64 = 1e-15;

pub fn sigmoid(margin: f64) -> f64 {
    // Split on sign so neither branch overflows `exp`.
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Mean binary cross-entropy.
///
/// Returns `None` for empty or misaligned inputs.
pub fn log_loss(labels: &[u8], probabilities: &[f64]) -> Option<f64> {
    if labels.is_empty() || labels.len() != probabilities.len() {
        return None;
    }
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| {
            let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    Some(total / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(logit(0.2)) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn log_loss_reference() {
        let loss = log_loss(&[1, 0], &[0.5, 0.5]).unwrap();
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-12);
        assert!(log_loss(&[], &[]).is_none());
    }
}
