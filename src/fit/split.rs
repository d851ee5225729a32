//! Stratified train/test split.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Row indices on each side of a split, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `test_fraction` of each class.
///
/// Every class keeps at least one row on each side, so a class with fewer than
/// two rows cannot be split.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<SplitIndices, AppError> {
    if !(test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::config(format!(
            "`test_fraction` must be in (0, 1), got {test_fraction}."
        )));
    }

    if labels.iter().any(|&y| y > 1) {
        return Err(AppError::value("Labels must be 0 or 1."));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        let n = idx.len();
        if n < 2 {
            return Err(AppError::training(format!(
                "Class {class} has {n} row(s); stratified split needs at least 2."
            )));
        }
        idx.shuffle(&mut rng);
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn labels(neg: usize, pos: usize) -> Vec<u8> {
        let mut y = vec![0; neg];
        y.extend(std::iter::repeat_n(1, pos));
        y
    }

    #[test]
    fn split_is_stratified_and_complete() {
        let y = labels(80, 20);
        let s = stratified_split(&y, 0.2, 42).unwrap();
        assert_eq!(s.test.len(), 20);
        assert_eq!(s.train.len(), 80);
        assert_eq!(s.test.iter().filter(|&&i| y[i] == 1).count(), 4);

        let mut all: Vec<usize> = s.train.iter().chain(&s.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn small_classes_keep_one_row_per_side() {
        let y = labels(50, 2);
        let s = stratified_split(&y, 0.1, 1).unwrap();
        assert_eq!(s.test.iter().filter(|&&i| y[i] == 1).count(), 1);
        assert_eq!(s.train.iter().filter(|&&i| y[i] == 1).count(), 1);
    }

    #[test]
    fn split_is_seeded() {
        let y = labels(30, 30);
        assert_eq!(stratified_split(&y, 0.3, 5).unwrap(), stratified_split(&y, 0.3, 5).unwrap());
    }

    #[test]
    fn rare_class_and_bad_fraction_fail() {
        assert_eq!(
            stratified_split(&labels(10, 1), 0.2, 0).unwrap_err().kind(),
            ErrorKind::Training
        );
        assert_eq!(
            stratified_split(&labels(10, 10), 1.0, 0).unwrap_err().kind(),
            ErrorKind::Config
        );
    }
}
