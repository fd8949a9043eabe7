//! K-nearest-neighbors classifier

use super::{check_shapes, Estimator};
use crate::error::{PipetuneError, Result};
use crate::search::space::{ParamSet, ParamValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Neighbor weighting scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Weights {
    /// Every neighbor votes equally
    Uniform,
    /// Votes weighted by inverse distance
    Distance,
}

impl Weights {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Weights::Uniform),
            "distance" => Ok(Weights::Distance),
            other => Err(PipetuneError::InvalidParameter {
                name: "weights".to_string(),
                value: other.to_string(),
                reason: "expected uniform or distance".to_string(),
            }),
        }
    }
}

/// K-nearest-neighbors classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub n_neighbors: usize,
    pub weights: Weights,
    train_x: Option<Array2<f64>>,
    train_y: Option<Array1<f64>>,
}

impl KnnClassifier {
    /// Create a classifier with `n_neighbors` neighbors and uniform weights
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights: Weights::Uniform,
            train_x: None,
            train_y: None,
        }
    }

    /// Set the weighting scheme
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    fn predict_sample(&self, x: &Array2<f64>, y: &Array1<f64>, sample: &[f64]) -> f64 {
        let mut distances: Vec<(f64, f64)> = (0..x.nrows())
            .map(|i| {
                let d: f64 = x
                    .row(i)
                    .iter()
                    .zip(sample.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                (d, y[i])
            })
            .collect();

        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let k = self.n_neighbors.min(distances.len());
        let mut votes: HashMap<i64, f64> = HashMap::new();
        for &(dist, label) in distances.iter().take(k) {
            let weight = match self.weights {
                Weights::Uniform => 1.0,
                Weights::Distance => 1.0 / (dist + 1e-10),
            };
            *votes.entry(label.round() as i64).or_insert(0.0) += weight;
        }

        votes
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(class, _)| class as f64)
            .unwrap_or(0.0)
    }
}

impl Estimator for KnnClassifier {
    fn name(&self) -> &'static str {
        "knn_classifier"
    }

    fn apply_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match (name.as_str(), value) {
                ("n_neighbors", v) => match v.as_int() {
                    Some(k) if k >= 1 => self.n_neighbors = k as usize,
                    _ => {
                        return Err(PipetuneError::InvalidParameter {
                            name: name.clone(),
                            value: format!("{v:?}"),
                            reason: "expected integer >= 1".to_string(),
                        })
                    }
                },
                ("weights", ParamValue::Str(s)) => {
                    self.weights = Weights::parse(s)?;
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
        self.train_x = Some(x.clone());
        self.train_y = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (train_x, train_y) = match (&self.train_x, &self.train_y) {
            (Some(tx), Some(ty)) => (tx, ty),
            _ => return Err(PipetuneError::ModelNotFitted),
        };

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| self.predict_sample(train_x, train_y, &x.row(i).to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn fresh(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            n_neighbors: self.n_neighbors,
            weights: self.weights,
            train_x: None,
            train_y: None,
        })
    }

    fn to_artifact(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
