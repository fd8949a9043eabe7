//! Feature searchers
//!
//! Wrappers around univariate scoring and recursive elimination that reduce the
//! feature space before hyperparameter search. Scores are correlation or binned
//! mutual information against the target.

use crate::error::{PipetuneError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::debug;

/// Outcome of a feature search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelection {
    /// Kept feature indices, ascending
    pub indices: Vec<usize>,
    /// Per-feature scores (full width), when the method produces them
    pub scores: Option<Vec<f64>>,
    /// Seconds spent searching
    pub duration_secs: f64,
}

/// Searches for a feature subset worth keeping
pub trait FeatureSearcher: Send + Sync {
    /// Searcher name for logs and records
    fn name(&self) -> &'static str;

    /// Score features against the target and pick a subset
    fn search(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FeatureSelection>;
}

/// Univariate scoring function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreFunction {
    /// Absolute Pearson correlation with the target
    Correlation,
    /// Binned mutual information with the target
    MutualInfo,
}

impl ScoreFunction {
    fn score_all(&self, x: &Array2<f64>, y: &Array1<f64>) -> Vec<f64> {
        (0..x.ncols())
            .map(|col| {
                let column = x.column(col);
                match self {
                    ScoreFunction::Correlation => correlation(column, y.view()).abs(),
                    ScoreFunction::MutualInfo => mutual_information(column, y.view()),
                }
            })
            .collect()
    }
}

/// Keep the `k` best-scoring features
#[derive(Debug, Clone)]
pub struct KBestSearcher {
    k: usize,
    score_fn: ScoreFunction,
}

impl KBestSearcher {
    pub fn new(k: usize, score_fn: ScoreFunction) -> Self {
        Self { k: k.max(1), score_fn }
    }
}

impl FeatureSearcher for KBestSearcher {
    fn name(&self) -> &'static str {
        "k_best"
    }

    fn search(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FeatureSelection> {
        let start = Instant::now();
        check_input(x, y)?;

        let scores = self.score_fn.score_all(x, y);
        let k = self.k.min(x.ncols());

        let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut indices: Vec<usize> = indexed.into_iter().take(k).map(|(i, _)| i).collect();
        indices.sort_unstable();

        debug!(searcher = self.name(), kept = indices.len(), "feature search done");
        Ok(FeatureSelection {
            indices,
            scores: Some(scores),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Keep the top `percent` percent of features by score
#[derive(Debug, Clone)]
pub struct PercentileSearcher {
    percent: f64,
    score_fn: ScoreFunction,
}

impl PercentileSearcher {
    pub fn new(percent: f64, score_fn: ScoreFunction) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            score_fn,
        }
    }
}

impl FeatureSearcher for PercentileSearcher {
    fn name(&self) -> &'static str {
        "percentile"
    }

    fn search(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FeatureSelection> {
        let start = Instant::now();
        check_input(x, y)?;

        let scores = self.score_fn.score_all(x, y);
        let n_features = x.ncols();

        // percent is the fraction kept: 10.0 keeps the best-scoring tenth
        let n_keep = ((self.percent / 100.0) * n_features as f64).ceil() as usize;
        if n_keep == 0 {
            return Err(PipetuneError::Search("no features selected".to_string()));
        }

        let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut indices: Vec<usize> = indexed.into_iter().take(n_keep).map(|(i, _)| i).collect();
        indices.sort_unstable();

        debug!(searcher = self.name(), kept = indices.len(), "feature search done");
        Ok(FeatureSelection {
            indices,
            scores: Some(scores),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Recursive feature elimination down to `n_features`, dropping the weakest
/// `step` features per round
#[derive(Debug, Clone)]
pub struct RecursiveEliminator {
    n_features: usize,
    step: usize,
}

impl RecursiveEliminator {
    pub fn new(n_features: usize, step: usize) -> Self {
        Self {
            n_features: n_features.max(1),
            step: step.max(1),
        }
    }
}

impl FeatureSearcher for RecursiveEliminator {
    fn name(&self) -> &'static str {
        "recursive_elimination"
    }

    fn search(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FeatureSelection> {
        let start = Instant::now();
        check_input(x, y)?;

        let n_features = x.ncols();
        let target = self.n_features.min(n_features);
        let mut remaining: HashSet<usize> = (0..n_features).collect();

        while remaining.len() > target {
            let mut ranked: Vec<(usize, f64)> = remaining
                .iter()
                .map(|&idx| (idx, correlation(x.column(idx), y.view()).abs()))
                .collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let n_to_remove = self.step.min(remaining.len() - target);
            for (idx, _) in ranked.into_iter().take(n_to_remove) {
                remaining.remove(&idx);
            }
        }

        let mut indices: Vec<usize> = remaining.into_iter().collect();
        indices.sort_unstable();

        debug!(searcher = self.name(), kept = indices.len(), "feature search done");
        Ok(FeatureSelection {
            indices,
            scores: None,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Project a matrix onto the selected columns
pub fn select_columns(x: &Array2<f64>, indices: &[usize]) -> Result<Array2<f64>> {
    if indices.is_empty() {
        return Err(PipetuneError::Search("no features selected".to_string()));
    }
    if let Some(&max) = indices.iter().max() {
        if max >= x.ncols() {
            return Err(PipetuneError::Shape {
                expected: format!("column index < {}", x.ncols()),
                actual: max.to_string(),
            });
        }
    }
    Ok(x.select(Axis(1), indices))
}

fn check_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipetuneError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.ncols() == 0 {
        return Err(PipetuneError::Data("no features to search".to_string()));
    }
    Ok(())
}

fn correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        sum_xy / denom
    }
}

fn mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let n_bins = (n.sqrt() as usize).clamp(2, 20);
    let x_bins = discretize(x, n_bins);
    let y_bins = discretize(y, n_bins);

    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    let mut x_counts: HashMap<usize, usize> = HashMap::new();
    let mut y_counts: HashMap<usize, usize> = HashMap::new();
    for (&xb, &yb) in x_bins.iter().zip(y_bins.iter()) {
        *joint.entry((xb, yb)).or_insert(0) += 1;
        *x_counts.entry(xb).or_insert(0) += 1;
        *y_counts.entry(yb).or_insert(0) += 1;
    }

    let mut mi = 0.0;
    for (&(xb, yb), &count) in &joint {
        let p_xy = count as f64 / n;
        let p_x = x_counts[&xb] as f64 / n;
        let p_y = y_counts[&yb] as f64 / n;
        if p_xy > 0.0 && p_x > 0.0 && p_y > 0.0 {
            mi += p_xy * (p_xy / (p_x * p_y)).ln();
        }
    }

    mi.max(0.0)
}

fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
    let min_val = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let range = max_val - min_val;
    if range <= 0.0 {
        return vec![0; x.len()];
    }

    let bin_width = range / n_bins as f64;
    x.iter()
        .map(|&v| (((v - min_val) / bin_width) as usize).min(n_bins - 1))
        .collect()
}
