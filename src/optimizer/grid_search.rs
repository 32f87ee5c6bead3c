//! Exhaustive grid search with cross-validation

use crate::error::{KolosalError, Result};
use crate::training::cross_validation::{CVResults, CVStrategy, CrossValidator};
use crate::training::{Estimator, TargetData, TaskType};
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::search_space::{ParamGrid, TrialParams};

/// Cross-validated score of one grid candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in the expanded grid
    pub trial_id: usize,
    /// Parameters applied on top of the base estimator
    pub params: TrialParams,
    /// Per-fold scores
    pub cv: CVResults,
    /// Wall time spent fitting and scoring all folds
    pub duration_secs: f64,
    /// 1 for the best candidate
    pub rank: usize,
}

/// Grid search over estimator hyperparameters
#[derive(Debug, Clone)]
pub struct GridSearchCV<E: Estimator> {
    estimator: E,
    param_grid: ParamGrid,
    cv: usize,
    shuffle: bool,
    random_state: Option<u64>,
    refit: bool,
    best_params: Option<TrialParams>,
    best_score: Option<f64>,
    best_estimator: Option<E>,
    cv_results: Vec<CandidateResult>,
}

impl<E: Estimator> GridSearchCV<E> {
    /// Search `param_grid` with `cv` folds
    pub fn new(estimator: E, param_grid: ParamGrid, cv: usize) -> Self {
        Self {
            estimator,
            param_grid,
            cv,
            shuffle: false,
            random_state: None,
            refit: true,
            best_params: None,
            best_score: None,
            best_estimator: None,
            cv_results: Vec::new(),
        }
    }

    /// Shuffle samples before splitting into folds
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_state = Some(seed);
        self
    }

    /// Skip refitting the winner on the full data
    pub fn with_refit(mut self, refit: bool) -> Self {
        self.refit = refit;
        self
    }

    fn validator(&self, task: TaskType, stratified: bool) -> CrossValidator {
        let strategy = match task {
            TaskType::Classification if stratified => CVStrategy::StratifiedKFold {
                n_splits: self.cv,
                shuffle: self.shuffle,
            },
            _ => CVStrategy::KFold {
                n_splits: self.cv,
                shuffle: self.shuffle,
            },
        };
        let validator = CrossValidator::new(strategy);
        match self.random_state {
            Some(seed) => validator.with_random_state(seed),
            None => validator,
        }
    }

    fn configured(&self, params: &TrialParams) -> Result<E> {
        let mut estimator = self.estimator.clone();
        for (name, value) in params {
            estimator.set_param(name, value)?;
        }
        Ok(estimator)
    }

    /// Run the search; candidates are evaluated in parallel
    pub fn fit(&mut self, x: &Array2<f64>, y: &E::Target) -> Result<&mut Self> {
        if x.nrows() != y.n_samples() {
            return Err(KolosalError::shape(
                format!("{} target rows", x.nrows()),
                format!("{} target rows", y.n_samples()),
            ));
        }

        if let Some(name) = self.param_grid.empty_parameter() {
            return Err(KolosalError::invalid_param(name, "[]", "grid lists no candidate values"));
        }

        let strata = y.strata();
        let validator = self.validator(self.estimator.task(), strata.is_some());
        let splits = validator.split(x.nrows(), strata.as_deref())?;
        let candidates = self.param_grid.candidates();

        info!(
            n_candidates = candidates.len(),
            n_splits = splits.len(),
            strategy = ?validator.strategy(),
            "starting grid search"
        );

        let mut results: Vec<CandidateResult> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(trial_id, params)| -> Result<CandidateResult> {
                let start = Instant::now();
                let scores = splits
                    .iter()
                    .map(|split| {
                        let mut estimator = self.configured(&params)?;
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(&split.train_indices);
                        estimator.fit(&x_train, &y_train)?;

                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(&split.test_indices);
                        estimator.score(&x_test, &y_test)
                    })
                    .collect::<Result<Vec<f64>>>()?;

                let cv = CVResults::from_scores(scores);
                debug!(trial_id, ?params, mean_score = cv.mean_score, "candidate scored");
                Ok(CandidateResult {
                    trial_id,
                    params,
                    cv,
                    duration_secs: start.elapsed().as_secs_f64(),
                    rank: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // NaN scores rank last; the earlier candidate wins ties
        let key = |r: &CandidateResult| {
            if r.cv.mean_score.is_nan() {
                f64::NEG_INFINITY
            } else {
                r.cv.mean_score
            }
        };
        let mut order: Vec<usize> = (0..results.len()).collect();
        order.sort_by(|&a, &b| key(&results[b]).total_cmp(&key(&results[a])).then(a.cmp(&b)));
        for (rank, &idx) in order.iter().enumerate() {
            results[idx].rank = rank + 1;
        }

        let best = order
            .first()
            .map(|&idx| &results[idx])
            .ok_or_else(|| KolosalError::ValidationError("grid search produced no candidates".to_string()))?;
        let best_params = best.params.clone();
        let best_score = best.cv.mean_score;
        info!(?best_params, best_score, "grid search finished");

        self.best_estimator = if self.refit {
            let mut estimator = self.configured(&best_params)?;
            estimator.fit(x, y)?;
            Some(estimator)
        } else {
            None
        };
        self.best_params = Some(best_params);
        self.best_score = Some(best_score);
        self.cv_results = results;
        Ok(self)
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_params.as_ref()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Winner refitted on the full data
    pub fn best_estimator(&self) -> Option<&E> {
        self.best_estimator.as_ref()
    }

    /// One entry per candidate, in grid order
    pub fn cv_results(&self) -> &[CandidateResult] {
        &self.cv_results
    }

    /// Predict with the refitted best estimator
    pub fn predict(&self, x: &Array2<f64>) -> Result<E::Output> {
        self.best_estimator
            .as_ref()
            .ok_or(KolosalError::ModelNotFitted)?
            .predict(x)
    }

    pub fn score(&self, x: &Array2<f64>, y: &E::Target) -> Result<f64> {
        self.best_estimator
            .as_ref()
            .ok_or(KolosalError::ModelNotFitted)?
            .score(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParamValue;
    use crate::training::{DecisionTree, LinearRegression};
    use ndarray::{Array1, Array2};

    // Class 1 is a band in the middle of the feature range, one split cannot isolate it
    fn band_data() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_fn((36, 1), |(i, _)| (i % 6) as f64);
        let y = Array1::from_shape_fn(36, |i| usize::from(matches!(i % 6, 2 | 3)));
        (x, y)
    }

    #[test]
    fn test_selects_deeper_tree() {
        let (x, y) = band_data();
        let grid = ParamGrid::new().add("max_depth", vec![1i64, 8]);
        let mut search = GridSearchCV::new(DecisionTree::new(), grid, 3);
        search.fit(&x, &y).unwrap();

        assert_eq!(search.best_params().unwrap()["max_depth"], ParamValue::Int(8));
        assert_eq!(search.cv_results().len(), 2);
        assert_eq!(search.cv_results()[1].rank, 1);
        assert!(search.best_estimator().is_some());
        assert_eq!(search.predict(&x).unwrap().len(), 36);
    }

    #[test]
    fn test_first_candidate_wins_ties() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = Array2::from_shape_fn((12, 1), |(i, _)| 2.0 * i as f64 + 1.0);
        let grid = ParamGrid::new().add("fit_intercept", vec![true, true]);
        let mut search = GridSearchCV::new(LinearRegression::new(), grid, 3);
        search.fit(&x, &y).unwrap();

        assert_eq!(search.cv_results()[0].rank, 1);
        assert!(search.best_score().unwrap() > 0.99);
    }

    #[test]
    fn test_empty_grid_scores_base_estimator() {
        let (x, y) = band_data();
        let mut search = GridSearchCV::new(DecisionTree::new(), ParamGrid::new(), 3).with_refit(false);
        search.fit(&x, &y).unwrap();
        assert_eq!(search.cv_results().len(), 1);
        assert!(search.best_params().unwrap().is_empty());
        assert!(search.best_estimator().is_none());
    }

    #[test]
    fn test_empty_value_list_rejected() {
        let (x, y) = band_data();
        let grid = ParamGrid::new()
            .add("max_depth", vec![2i64, 4])
            .add("min_samples_leaf", Vec::<ParamValue>::new());
        let mut search = GridSearchCV::new(DecisionTree::new(), grid, 3);
        match search.fit(&x, &y) {
            Err(KolosalError::InvalidParameter { name, .. }) => assert_eq!(name, "min_samples_leaf"),
            other => panic!("expected an invalid parameter error, got {:?}", other.map(|s| s.cv_results().len())),
        }
        assert!(search.best_params().is_none());
        assert!(search.cv_results().is_empty());
    }

    #[test]
    fn test_unknown_param_fails() {
        let (x, y) = band_data();
        let grid = ParamGrid::new().add("depth", vec![1i64]);
        let mut search = GridSearchCV::new(DecisionTree::new(), grid, 3);
        assert!(search.fit(&x, &y).is_err());
    }
}
