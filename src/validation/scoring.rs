//! Scoring strategies
//!
//! A [`Scoring`] names the metric a run optimizes; its [`ScoreDirection`] tells
//! comparators which way is better.

use crate::error::{PipetuneError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Which direction of a score is an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreDirection {
    HigherIsBetter,
    LowerIsBetter,
}

impl ScoreDirection {
    /// True when `new` improves on `current` for this direction
    pub fn improves(&self, new: f64, current: f64) -> bool {
        match self {
            ScoreDirection::HigherIsBetter => new > current,
            ScoreDirection::LowerIsBetter => new < current,
        }
    }

    /// The score no real result can be worse than
    pub fn worst(&self) -> f64 {
        match self {
            ScoreDirection::HigherIsBetter => f64::NEG_INFINITY,
            ScoreDirection::LowerIsBetter => f64::INFINITY,
        }
    }
}

/// Scoring strategy for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    /// Fraction of correct predictions (classification)
    Accuracy,
    /// F1 score of the positive class (binary classification)
    F1,
    /// Coefficient of determination (regression)
    R2,
    /// Mean squared error (regression, lower is better)
    Mse,
    /// Mean absolute error (regression, lower is better)
    Mae,
}

impl Scoring {
    /// Direction in which this metric improves
    pub fn direction(&self) -> ScoreDirection {
        match self {
            Scoring::Accuracy | Scoring::F1 | Scoring::R2 => ScoreDirection::HigherIsBetter,
            Scoring::Mse | Scoring::Mae => ScoreDirection::LowerIsBetter,
        }
    }

    /// Score predictions against ground truth
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(PipetuneError::Shape {
                expected: format!("y_pred length = {}", y_true.len()),
                actual: format!("y_pred length = {}", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipetuneError::Validation(
                "cannot score empty predictions".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let value = match self {
            Scoring::Accuracy => {
                let correct = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .filter(|(t, p)| (**t - **p).abs() < 0.5)
                    .count();
                correct as f64 / n
            }
            Scoring::F1 => {
                let (tp, fp, fn_) = confusion_counts(y_true, y_pred);
                let precision = if tp + fp > 0 {
                    tp as f64 / (tp + fp) as f64
                } else {
                    0.0
                };
                let recall = if tp + fn_ > 0 {
                    tp as f64 / (tp + fn_) as f64
                } else {
                    0.0
                };
                if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                }
            }
            Scoring::R2 => {
                let y_mean = y_true.sum() / n;
                let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
                let ss_res: f64 = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).powi(2))
                    .sum();
                if ss_tot > 0.0 {
                    1.0 - ss_res / ss_tot
                } else {
                    0.0
                }
            }
            Scoring::Mse => {
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).powi(2))
                    .sum::<f64>()
                    / n
            }
            Scoring::Mae => {
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).abs())
                    .sum::<f64>()
                    / n
            }
        };
        Ok(value)
    }
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    (tp, fp, fn_)
}
