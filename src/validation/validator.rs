//! Validator contract and the cross-validation implementation

use crate::error::Result;
use crate::model::Estimator;
use crate::search::space::ParamSet;
use crate::validation::result::ValidationResult;
use crate::validation::scoring::Scoring;
use crate::validation::{cross_val_score, CrossValidator};
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::debug;

/// Validates a searched configuration against data.
///
/// Returns `Ok(None)` when validation is inapplicable (no data), a record
/// otherwise. Errors from the underlying fit/score routines propagate unchanged.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        estimator: &dyn Estimator,
        params: &ParamSet,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cv: &CrossValidator,
        scoring: Scoring,
    ) -> Result<Option<ValidationResult>>;
}

/// Cross-validation backed validator.
///
/// `n_jobs` is handed down to the fold-evaluation worker pool; the validator
/// itself stays on the calling thread.
#[derive(Debug, Clone)]
pub struct CrossValidationValidator {
    n_jobs: usize,
}

impl Default for CrossValidationValidator {
    fn default() -> Self {
        Self { n_jobs: 1 }
    }
}

impl CrossValidationValidator {
    /// Create a serial validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of parallel fold workers
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }
}

impl Validator for CrossValidationValidator {
    fn validate(
        &self,
        estimator: &dyn Estimator,
        params: &ParamSet,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cv: &CrossValidator,
        scoring: Scoring,
    ) -> Result<Option<ValidationResult>> {
        if x.nrows() == 0 || y.is_empty() {
            debug!(estimator = estimator.name(), "no data, skipping validation");
            return Ok(None);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        let splits = cv.split(x.nrows(), Some(y))?;
        let fold_scores = cross_val_score(estimator, params, x, y, &splits, scoring, self.n_jobs)?;
        let (mean_score, std_score) = ValidationResult::summarize(&fold_scores);

        // Refit on the full dataset: the persisted artifact is the deployable model
        let mut model = estimator.fresh();
        model.apply_params(params)?;
        model.fit(x, y)?;
        let artifact = model.to_artifact()?;

        let validation_secs = start.elapsed().as_secs_f64();
        debug!(
            estimator = estimator.name(),
            mean_score, std_score, "validation complete"
        );

        Ok(Some(ValidationResult {
            pipeline: String::new(),
            estimator: estimator.name().to_string(),
            params: params.clone(),
            selected_features: None,
            fold_scores,
            mean_score,
            std_score,
            scoring,
            started_at,
            finished_at: Utc::now(),
            feature_search_secs: 0.0,
            param_search_secs: 0.0,
            validation_secs,
            model: artifact,
        }))
    }
}
