//! Class balancing for training data.
//!
//! A balancer takes two classes in any proportion and returns a set where the
//! rare class has been brought up to the size of the common one. Original rows
//! come first, synthetic rows are appended after them.
//!
//! Balancers only ever see training rows: [`crate::scoring::ScoringPipeline::fit`]
//! is the single caller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::BalanceMethod;
use crate::error::AppError;

pub const DEFAULT_SMOTE_K: usize = 5;

/// Rows and labels after balancing.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedSet {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    /// Rows before this index are the caller's originals.
    pub n_original: usize,
}

impl BalancedSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_synthetic(&self) -> usize {
        self.rows.len() - self.n_original
    }

    pub fn synthetic_rows_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.rows[self.n_original..]
    }

    /// `(negatives, positives)`.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&y| y == 1).count();
        (self.labels.len() - positives, positives)
    }
}

pub trait ClassBalancer: Send + Sync {
    fn method(&self) -> BalanceMethod;

    fn balance(&self, rows: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<BalancedSet, AppError>;
}

/// Build the balancer selected on the command line.
pub fn balancer_for(method: BalanceMethod, seed: u64, k: usize) -> Result<Box<dyn ClassBalancer>, AppError> {
    Ok(match method {
        BalanceMethod::Smote => Box::new(Smote::new(k, seed)?),
        BalanceMethod::Oversample => Box::new(RandomOversampler::new(seed)),
    })
}

/// What a balancer needs to know about its input before generating rows.
struct Imbalance {
    minority_label: u8,
    minority: Vec<usize>,
    deficit: usize,
}

fn inspect(rows: &[Vec<f64>], labels: &[u8]) -> Result<Option<Imbalance>, AppError> {
    if rows.len() != labels.len() {
        return Err(AppError::schema(format!(
            "Row/label count mismatch: {} rows, {} labels.",
            rows.len(),
            labels.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|&&y| y > 1) {
        return Err(AppError::value(format!("Labels must be 0 or 1, got {bad}.")));
    }

    let positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 1).collect();
    let negatives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 0).collect();
    if positives.is_empty() || negatives.is_empty() {
        return Err(AppError::training(format!(
            "Balancing needs both classes; got {} negatives and {} positives.",
            negatives.len(),
            positives.len()
        )));
    }

    let (minority_label, minority, majority_len) = if positives.len() < negatives.len() {
        (1, positives, negatives.len())
    } else {
        (0, negatives, positives.len())
    };
    let deficit = majority_len - minority.len();
    if deficit == 0 {
        return Ok(None);
    }
    Ok(Some(Imbalance {
        minority_label,
        minority,
        deficit,
    }))
}

/// Synthetic Minority Over-sampling: interpolate between a minority row and
/// one of its k nearest minority neighbours.
#[derive(Debug, Clone)]
pub struct Smote {
    k: usize,
    seed: u64,
}

impl Smote {
    pub fn new(k: usize, seed: u64) -> Result<Self, AppError> {
        if k == 0 {
            return Err(AppError::config("SMOTE neighbour count must be >= 1."));
        }
        Ok(Self { k, seed })
    }
}

impl ClassBalancer for Smote {
    fn method(&self) -> BalanceMethod {
        BalanceMethod::Smote
    }

    fn balance(&self, mut rows: Vec<Vec<f64>>, mut labels: Vec<u8>) -> Result<BalancedSet, AppError> {
        let n_original = rows.len();
        let Some(imb) = inspect(&rows, &labels)? else {
            return Ok(BalancedSet {
                rows,
                labels,
                n_original,
            });
        };

        let m = imb.minority.len();
        if m < 2 {
            return Err(AppError::training(format!(
                "SMOTE needs at least 2 minority rows (class {}), got {m}.",
                imb.minority_label
            )));
        }
        let k = self.k.min(m - 1);

        // Nearest minority neighbours, by position in `imb.minority`.
        let neighbours: Vec<Vec<usize>> = (0..m)
            .into_par_iter()
            .map(|a| {
                let base = &rows[imb.minority[a]];
                let mut dists: Vec<(f64, usize)> = (0..m)
                    .filter(|&b| b != a)
                    .map(|b| (squared_distance(base, &rows[imb.minority[b]]), b))
                    .collect();
                dists.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
                dists.into_iter().take(k).map(|(_, b)| b).collect()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        rows.reserve(imb.deficit);
        labels.reserve(imb.deficit);
        for _ in 0..imb.deficit {
            let a = rng.gen_range(0..m);
            let b = neighbours[a][rng.gen_range(0..k)];
            let gap: f64 = rng.r#gen();

            let origin = &rows[imb.minority[a]];
            let target = &rows[imb.minority[b]];
            let synthetic: Vec<f64> = origin
                .iter()
                .zip(target)
                .map(|(&o, &t)| o + gap * (t - o))
                .collect();
            rows.push(synthetic);
            labels.push(imb.minority_label);
        }

        debug!(
            minority_label = imb.minority_label,
            minority_rows = m,
            synthetic = imb.deficit,
            k,
            "SMOTE balancing"
        );

        Ok(BalancedSet {
            rows,
            labels,
            n_original,
        })
    }
}

/// Duplicate random minority rows until the classes match.
#[derive(Debug, Clone)]
pub struct RandomOversampler {
    seed: u64,
}

impl RandomOversampler {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl ClassBalancer for RandomOversampler {
    fn method(&self) -> BalanceMethod {
        BalanceMethod::Oversample
    }

    fn balance(&self, mut rows: Vec<Vec<f64>>, mut labels: Vec<u8>) -> Result<BalancedSet, AppError> {
        let n_original = rows.len();
        let Some(imb) = inspect(&rows, &labels)? else {
            return Ok(BalancedSet {
                rows,
                labels,
                n_original,
            });
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..imb.deficit {
            let pick = imb.minority[rng.gen_range(0..imb.minority.len())];
            let duplicate = rows[pick].clone();
            rows.push(duplicate);
            labels.push(imb.minority_label);
        }

        debug!(
            minority_label = imb.minority_label,
            duplicated = imb.deficit,
            "random oversampling"
        );

        Ok(BalancedSet {
            rows,
            labels,
            n_original,
        })
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
