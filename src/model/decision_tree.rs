//! Decision tree estimator
//!
//! Binary-split CART supporting gini/entropy for classification and MSE for
//! regression. Tunable through `max_depth`, `min_samples_split`,
//! `min_samples_leaf` and `criterion`.

use super::{check_shapes, Estimator};
use crate::error::{PipetuneError, Result};
use crate::search::space::{ParamSet, ParamValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    Mse,
}

impl Criterion {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "mse" => Ok(Criterion::Mse),
            other => Err(PipetuneError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected one of gini, entropy, mse".to_string(),
            }),
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
    is_classification: bool,
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Mse,
            is_classification: false,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Tree depth after fitting
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || is_pure(&y_subset);

        if should_stop {
            return TreeNode::Leaf {
                value: self.leaf_value(&y_subset),
                n_samples,
            };
        }

        if let Some((feature_idx, threshold)) = self.best_split(x, y, indices) {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, feature_idx]] <= threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    value: self.leaf_value(&y_subset),
                    n_samples,
                };
            }

            let left = Box::new(self.build(x, y, &left_indices, depth + 1));
            let right = Box::new(self.build(x, y, &right_indices, depth + 1));
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            }
        } else {
            TreeNode::Leaf {
                value: self.leaf_value(&y_subset),
                n_samples,
            }
        }
    }

    fn best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64)> {
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = self.impurity(&y_subset);
        let n = indices.len() as f64;

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in 0..x.ncols() {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left = Vec::new();
                let mut right = Vec::new();
                for &idx in indices {
                    if x[[idx, feature_idx]] <= threshold {
                        left.push(y[idx]);
                    } else {
                        right.push(y[idx]);
                    }
                }

                if left.len() < self.min_samples_leaf || right.len() < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.len() as f64 * self.impurity(&left)
                    + right.len() as f64 * self.impurity(&right))
                    / n;
                let gain = parent_impurity - weighted;

                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }

    fn impurity(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        match self.criterion {
            Criterion::Gini => {
                let n = y.len() as f64;
                let counts = class_counts(y);
                1.0 - counts
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => {
                let n = y.len() as f64;
                let counts = class_counts(y);
                -counts
                    .values()
                    .map(|&c| {
                        let p = c as f64 / n;
                        if p > 0.0 {
                            p * p.ln()
                        } else {
                            0.0
                        }
                    })
                    .sum::<f64>()
            }
            Criterion::Mse => {
                let mean = y.iter().sum::<f64>() / y.len() as f64;
                y.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / y.len() as f64
            }
        }
    }

    fn leaf_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        if self.is_classification {
            class_counts(y)
                .into_iter()
                .max_by_key(|(_, count)| *count)
                .map(|(class, _)| class as f64)
                .unwrap_or(0.0)
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        }
    }

    fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }
}

fn class_counts(y: &[f64]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &val in y {
        *counts.entry(val.round() as i64).or_insert(0) += 1;
    }
    counts
}

fn is_pure(y: &[f64]) -> bool {
    y.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-10)
}

impl Estimator for DecisionTree {
    fn name(&self) -> &'static str {
        if self.is_classification {
            "decision_tree_classifier"
        } else {
            "decision_tree_regressor"
        }
    }

    fn apply_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match (name.as_str(), value) {
                ("max_depth", v) => {
                    let d = require_positive_int(name, v)?;
                    self.max_depth = Some(d as usize);
                }
                ("min_samples_split", v) => {
                    self.min_samples_split = require_positive_int(name, v)? as usize;
                }
                ("min_samples_leaf", v) => {
                    self.min_samples_leaf = require_positive_int(name, v)? as usize;
                }
                ("criterion", ParamValue::Str(s)) => {
                    self.criterion = Criterion::parse(s)?;
                }
                (other, v) => {
                    return Err(PipetuneError::InvalidParameter {
                        name: other.to_string(),
                        value: format!("{v:?}"),
                        reason: format!("unknown parameter for {}", self.name()),
                    });
                }
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if x.nrows() == 0 {
            return Err(PipetuneError::Data("cannot fit on empty data".to_string()));
        }
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, y, &indices, 0));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipetuneError::ModelNotFitted)?;
        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| Self::predict_sample(root, &x.row(i).to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn fresh(&self) -> Box<dyn Estimator> {
        let mut clone = self.clone();
        clone.root = None;
        Box::new(clone)
    }

    fn to_artifact(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn require_positive_int(name: &str, value: &ParamValue) -> Result<i64> {
    match value.as_int() {
        Some(v) if v >= 1 => Ok(v),
        _ => Err(PipetuneError::InvalidParameter {
            name: name.to_string(),
            value: format!("{value:?}"),
            reason: "expected integer >= 1".to_string(),
        }),
    }
}
