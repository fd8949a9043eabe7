//! Validated pipeline outcome records

use crate::search::space::ParamSet;
use crate::validation::scoring::Scoring;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one validated pipeline execution.
///
/// This is the unit the history manager persists: the chosen parameters, the
/// cross-validation scores, stage timings and the fitted model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Pipeline identity (set by the process manager)
    pub pipeline: String,
    /// Estimator name
    pub estimator: String,
    /// Parameters chosen by the hyperparameter searcher
    pub params: ParamSet,
    /// Feature indices kept by the feature searcher, if one ran
    pub selected_features: Option<Vec<usize>>,
    /// Per-fold scores
    pub fold_scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of fold scores
    pub std_score: f64,
    /// Scoring strategy the scores were computed with
    pub scoring: Scoring,
    /// Execution start
    pub started_at: DateTime<Utc>,
    /// Execution end
    pub finished_at: DateTime<Utc>,
    /// Seconds spent in feature search
    pub feature_search_secs: f64,
    /// Seconds spent in hyperparameter search
    pub param_search_secs: f64,
    /// Seconds spent in cross-validation and the final refit
    pub validation_secs: f64,
    /// Fitted model state, opaque to the history layer
    pub model: serde_json::Value,
}

impl ValidationResult {
    /// Mean and standard deviation of a score vector
    pub fn summarize(scores: &[f64]) -> (f64, f64) {
        if scores.is_empty() {
            return (0.0, 0.0);
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}
