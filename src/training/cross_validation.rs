//! Cross-validation splitters

use crate::error::{KolosalError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: false }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits; stratified splitting needs `labels`
    pub fn split(&self, n_samples: usize, labels: Option<&[usize]>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(n_samples, *n_splits, *shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let labels = labels.ok_or_else(|| {
                    KolosalError::ValidationError("StratifiedKFold requires class labels".to_string())
                })?;
                if labels.len() != n_samples {
                    return Err(KolosalError::shape(
                        format!("{} labels", n_samples),
                        format!("{} labels", labels.len()),
                    ));
                }
                self.stratified_k_fold_split(labels, *n_splits, *shuffle)
            }
        }
    }

    fn check_sizes(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(KolosalError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(KolosalError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(&self, labels: &[usize], n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_sizes(labels.len(), n_splits)?;

        // Ordered map keeps fold assignment stable across runs
        let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            class_indices.entry(label).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal samples round-robin, continuing the rotation across classes
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[(offset + i) % n_splits].push(idx);
            }
            offset += indices.len();
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: true }).with_random_state(1);
        let splits = cv.split(10, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_stratified_k_fold() {
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&labels)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let ones = split.test_indices.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_stratified_covers_every_index_once() {
        let labels: Vec<usize> = (0..31).map(|i| i % 3).collect();
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: true }).with_random_state(7);
        let splits = cv.split(31, Some(&labels)).unwrap();
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..31).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 31);
        }
    }

    #[test]
    fn test_stratified_requires_labels() {
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        assert!(cv.split(3, None).is_err());
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 1, shuffle: false });
        assert!(cv.split(3, None).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 1.0]);
        assert_eq!(results.n_folds, 2);
        assert!((results.mean_score - 0.75).abs() < 1e-12);
        assert!((results.std_score - 0.25).abs() < 1e-12);
    }
}
