//! Cross-validation splitting, scoring and the validator contract

pub mod result;
pub mod scoring;
pub mod validator;

pub use result::ValidationResult;
pub use scoring::{ScoreDirection, Scoring};
pub use validator::{CrossValidationValidator, Validator};

use crate::error::{PipetuneError, Result};
use crate::model::Estimator;
use crate::search::space::ParamSet;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CvStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CvStrategy {
    fn default() -> Self {
        CvStrategy::KFold {
            n_splits: 5,
            shuffle: true,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CvStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CvStrategy) -> Self {
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

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CvSplit>> {
        match &self.strategy {
            CvStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CvStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    PipetuneError::Validation("StratifiedKFold requires targets".to_string())
                })?;
                self.stratified_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CvSplit>> {
        if n_splits < 2 {
            return Err(PipetuneError::Validation(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(PipetuneError::Validation(format!(
                "n_samples ({n_samples}) must be >= n_splits ({n_splits})"
            )));
        }

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
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<CvSplit>> {
        if n_splits < 2 {
            return Err(PipetuneError::Validation(
                "n_splits must be at least 2".to_string(),
            ));
        }

        let mut class_indices: std::collections::HashMap<i64, Vec<usize>> =
            std::collections::HashMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = self.rng();
        if shuffle {
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin each class across folds to keep class balance
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut classes: Vec<i64> = class_indices.keys().copied().collect();
        classes.sort_unstable();
        for class in classes {
            for (i, &idx) in class_indices[&class].iter().enumerate() {
                folds[i % n_splits].push(idx);
            }
        }

        let mut splits = Vec::with_capacity(n_splits);
        for fold_idx in 0..n_splits {
            let test_indices = folds[fold_idx].clone();
            let train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();

            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }
}

/// Evaluate an estimator configuration over pre-computed CV splits.
///
/// Each fold trains a fresh estimator carrying `params` on the train rows and
/// scores it on the test rows. With `n_jobs > 1` the folds run on a dedicated
/// rayon pool; the splitting itself stays on the caller's thread.
pub fn cross_val_score(
    estimator: &dyn Estimator,
    params: &ParamSet,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CvSplit],
    scoring: Scoring,
    n_jobs: usize,
) -> Result<Vec<f64>> {
    let eval_fold = |split: &CvSplit| -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = estimator.fresh();
        model.apply_params(params)?;
        model.fit(&x_train, &y_train)?;
        let y_pred = model.predict(&x_test)?;
        scoring.score(&y_test, &y_pred)
    };

    if n_jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .build()
            .map_err(|e| PipetuneError::Validation(format!("worker pool: {e}")))?;
        pool.install(|| splits.par_iter().map(eval_fold).collect())
    } else {
        splits.iter().map(eval_fold).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DecisionTree;
    use ndarray::array;

    #[test]
    fn test_k_fold_covers_all_indices_once() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
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
    fn test_k_fold_uneven_sizes() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 3,
            shuffle: false,
        });
        let splits = cv.split(10, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_k_fold_shuffle_is_seeded() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 4,
            shuffle: true,
        })
        .with_random_state(42);
        let a = cv.split(40, None).unwrap();
        let b = cv.split(40, None).unwrap();
        assert_eq!(a[0].test_indices, b[0].test_indices);
    }

    #[test]
    fn test_stratified_keeps_class_balance() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let cv = CrossValidator::new(CvStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: false,
        });
        let splits = cv.split(10, Some(&y)).unwrap();

        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let classes: Vec<i64> = split.test_indices.iter().map(|&i| y[i] as i64).collect();
            assert!(classes.contains(&0));
            assert!(classes.contains(&1));
        }
    }

    #[test]
    fn test_stratified_requires_targets() {
        let cv = CrossValidator::new(CvStrategy::StratifiedKFold {
            n_splits: 2,
            shuffle: false,
        });
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_too_few_samples_fails() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
        assert!(cv.split(3, None).is_err());
    }

    #[test]
    fn test_cross_val_score_separable_data() {
        let x = array![
            [0.0],
            [0.5],
            [1.0],
            [1.5],
            [10.0],
            [10.5],
            [11.0],
            [11.5]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let cv = CrossValidator::new(CvStrategy::StratifiedKFold {
            n_splits: 4,
            shuffle: true,
        })
        .with_random_state(7);
        let splits = cv.split(8, Some(&y)).unwrap();

        let tree = DecisionTree::classifier();
        let scores = cross_val_score(
            &tree,
            &ParamSet::new(),
            &x,
            &y,
            &splits,
            Scoring::Accuracy,
            1,
        )
        .unwrap();

        assert_eq!(scores.len(), 4);
        for s in scores {
            assert!((s - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cross_val_score_parallel_matches_serial() {
        let x = array![
            [0.0],
            [0.5],
            [1.0],
            [1.5],
            [10.0],
            [10.5],
            [11.0],
            [11.5]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 4,
            shuffle: true,
        })
        .with_random_state(3);
        let splits = cv.split(8, Some(&y)).unwrap();

        let tree = DecisionTree::classifier();
        let serial =
            cross_val_score(&tree, &ParamSet::new(), &x, &y, &splits, Scoring::Accuracy, 1).unwrap();
        let parallel =
            cross_val_score(&tree, &ParamSet::new(), &x, &y, &splits, Scoring::Accuracy, 2).unwrap();
        assert_eq!(serial, parallel);
    }
}
