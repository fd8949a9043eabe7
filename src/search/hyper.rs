//! Hyperparameter searchers
//!
//! Each searcher proposes candidate assignments from a [`ParamSpace`], scores
//! every candidate by mean cross-validation score and keeps the best one for
//! the scoring direction. A candidate whose evaluation fails is logged and
//! treated as worst-possible, never fatal — the search continues.

use crate::error::Result;
use crate::model::Estimator;
use crate::search::space::{ParamSet, ParamSpace};
use crate::validation::{cross_val_score, CvSplit, Scoring};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of a hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSearchOutcome {
    /// Best assignment found
    pub best_params: ParamSet,
    /// Mean CV score of the best assignment
    pub best_score: f64,
    /// Number of candidates evaluated
    pub n_candidates: usize,
    /// Every evaluated (assignment, mean score) pair, in evaluation order
    pub trials: Vec<(ParamSet, f64)>,
    /// Seconds spent searching
    pub duration_secs: f64,
}

/// Searches a parameter space for the best estimator configuration
pub trait ParamSearcher: Send + Sync {
    /// Searcher name for logs and records
    fn name(&self) -> &'static str;

    /// Run the search over pre-computed CV splits
    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        estimator: &dyn Estimator,
        space: &ParamSpace,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CvSplit],
        scoring: Scoring,
        n_jobs: usize,
    ) -> Result<ParamSearchOutcome>;
}

#[allow(clippy::too_many_arguments)]
fn evaluate_candidates(
    searcher_name: &'static str,
    candidates: Vec<ParamSet>,
    estimator: &dyn Estimator,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CvSplit],
    scoring: Scoring,
    n_jobs: usize,
) -> Result<ParamSearchOutcome> {
    let start = Instant::now();
    let direction = scoring.direction();

    let mut trials: Vec<(ParamSet, f64)> = Vec::with_capacity(candidates.len());
    let mut best: Option<(ParamSet, f64)> = None;

    for (i, params) in candidates.into_iter().enumerate() {
        let score = match cross_val_score(estimator, &params, x, y, splits, scoring, n_jobs) {
            Ok(fold_scores) => fold_scores.iter().sum::<f64>() / fold_scores.len() as f64,
            Err(err) => {
                warn!(searcher = searcher_name, candidate = i, %err, "candidate failed");
                direction.worst()
            }
        };

        let improves = best
            .as_ref()
            .map_or(score.is_finite(), |(_, b)| direction.improves(score, *b));
        if improves {
            best = Some((params.clone(), score));
        }
        trials.push((params, score));
    }

    let n_candidates = trials.len();
    let (best_params, best_score) = best.unwrap_or_else(|| (ParamSet::new(), direction.worst()));
    debug!(
        searcher = searcher_name,
        n_candidates, best_score, "hyperparameter search done"
    );

    Ok(ParamSearchOutcome {
        best_params,
        best_score,
        n_candidates,
        trials,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Random search: `n_iter` independent samples from the space
#[derive(Debug)]
pub struct RandomSearcher {
    n_iter: usize,
    rng: Xoshiro256PlusPlus,
}

impl RandomSearcher {
    /// Create a searcher evaluating `n_iter` candidates
    pub fn new(n_iter: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self {
            n_iter: n_iter.max(1),
            rng,
        }
    }
}

impl ParamSearcher for RandomSearcher {
    fn name(&self) -> &'static str {
        "random_search"
    }

    fn search(
        &mut self,
        estimator: &dyn Estimator,
        space: &ParamSpace,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CvSplit],
        scoring: Scoring,
        n_jobs: usize,
    ) -> Result<ParamSearchOutcome> {
        let candidates: Vec<ParamSet> = if space.is_empty() {
            vec![ParamSet::new()]
        } else {
            (0..self.n_iter).map(|_| space.sample(&mut self.rng)).collect()
        };

        evaluate_candidates(self.name(), candidates, estimator, x, y, splits, scoring, n_jobs)
    }
}

/// Grid search: exhaustive cartesian product of the space
#[derive(Debug, Default)]
pub struct GridSearcher;

impl GridSearcher {
    pub fn new() -> Self {
        Self
    }
}

impl ParamSearcher for GridSearcher {
    fn name(&self) -> &'static str {
        "grid_search"
    }

    fn search(
        &mut self,
        estimator: &dyn Estimator,
        space: &ParamSpace,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CvSplit],
        scoring: Scoring,
        n_jobs: usize,
    ) -> Result<ParamSearchOutcome> {
        let candidates = space.grid()?;
        evaluate_candidates(self.name(), candidates, estimator, x, y, splits, scoring, n_jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionTree, KnnClassifier};
    use crate::validation::{CrossValidator, CvStrategy};
    use ndarray::array;

    fn dataset() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0],
            [0.5],
            [1.0],
            [1.5],
            [2.0],
            [10.0],
            [10.5],
            [11.0],
            [11.5],
            [12.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    fn splits(y: &Array1<f64>) -> Vec<CvSplit> {
        CrossValidator::new(CvStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: true,
        })
        .with_random_state(17)
        .split(y.len(), Some(y))
        .unwrap()
    }

    #[test]
    fn test_random_search_finds_good_config() {
        let (x, y) = dataset();
        let space = ParamSpace::new().int("max_depth", 1, 6);

        let mut searcher = RandomSearcher::new(8, Some(42));
        let outcome = searcher
            .search(
                &DecisionTree::classifier(),
                &space,
                &x,
                &y,
                &splits(&y),
                Scoring::Accuracy,
                1,
            )
            .unwrap();

        assert_eq!(outcome.n_candidates, 8);
        assert!((outcome.best_score - 1.0).abs() < 1e-12);
        assert!(outcome.best_params.contains_key("max_depth"));
    }

    #[test]
    fn test_random_search_empty_space_uses_defaults() {
        let (x, y) = dataset();
        let mut searcher = RandomSearcher::new(5, Some(1));
        let outcome = searcher
            .search(
                &DecisionTree::classifier(),
                &ParamSpace::new(),
                &x,
                &y,
                &splits(&y),
                Scoring::Accuracy,
                1,
            )
            .unwrap();

        assert_eq!(outcome.n_candidates, 1);
        assert!(outcome.best_params.is_empty());
    }

    #[test]
    fn test_grid_search_enumerates_everything() {
        let (x, y) = dataset();
        let space = ParamSpace::new()
            .int("n_neighbors", 1, 3)
            .categorical("weights", vec!["uniform", "distance"]);

        let mut searcher = GridSearcher::new();
        let outcome = searcher
            .search(
                &KnnClassifier::new(3),
                &space,
                &x,
                &y,
                &splits(&y),
                Scoring::Accuracy,
                1,
            )
            .unwrap();

        assert_eq!(outcome.n_candidates, 6);
        assert_eq!(outcome.trials.len(), 6);
        assert!((outcome.best_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_search_rejects_float_space() {
        let (x, y) = dataset();
        let space = ParamSpace::new().float("lr", 0.0, 1.0);

        let mut searcher = GridSearcher::new();
        assert!(searcher
            .search(
                &DecisionTree::classifier(),
                &space,
                &x,
                &y,
                &splits(&y),
                Scoring::Accuracy,
                1,
            )
            .is_err());
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let (x, y) = dataset();
        // weights is valid for knn, not for the tree: every candidate fails to apply
        let bad_space = ParamSpace::new().categorical("weights", vec!["uniform"]);

        let mut searcher = GridSearcher::new();
        let outcome = searcher
            .search(
                &DecisionTree::classifier(),
                &bad_space,
                &x,
                &y,
                &splits(&y),
                Scoring::Accuracy,
                1,
            )
            .unwrap();

        assert_eq!(outcome.n_candidates, 1);
        assert_eq!(outcome.best_score, f64::NEG_INFINITY);
    }
}
