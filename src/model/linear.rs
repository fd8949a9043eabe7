//! Ridge regression via gradient descent

use super::{check_shapes, Estimator};
use crate::error::{PipetuneError, Result};
use crate::search::space::ParamSet;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized linear regression, fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub alpha: f64,
    pub learning_rate: f64,
    pub n_iters: usize,
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    /// Create with regularization strength `alpha`
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            learning_rate: 0.01,
            n_iters: 1000,
            weights: None,
            bias: 0.0,
        }
    }

    /// Set the gradient-descent learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the number of gradient-descent iterations
    pub fn with_n_iters(mut self, n: usize) -> Self {
        self.n_iters = n;
        self
    }

    /// Fitted coefficients, if any
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }
}

impl Estimator for RidgeRegression {
    fn name(&self) -> &'static str {
        "ridge_regression"
    }

    fn apply_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "alpha" => match value.as_float() {
                    Some(a) if a >= 0.0 => self.alpha = a,
                    _ => {
                        return Err(PipetuneError::InvalidParameter {
                            name: name.clone(),
                            value: format!("{value:?}"),
                            reason: "expected float >= 0".to_string(),
                        })
                    }
                },
                "learning_rate" => match value.as_float() {
                    Some(lr) if lr > 0.0 => self.learning_rate = lr,
                    _ => {
                        return Err(PipetuneError::InvalidParameter {
                            name: name.clone(),
                            value: format!("{value:?}"),
                            reason: "expected float > 0".to_string(),
                        })
                    }
                },
                "n_iters" => match value.as_int() {
                    Some(n) if n >= 1 => self.n_iters = n as usize,
                    _ => {
                        return Err(PipetuneError::InvalidParameter {
                            name: name.clone(),
                            value: format!("{value:?}"),
                            reason: "expected integer >= 1".to_string(),
                        })
                    }
                },
                other => {
                    return Err(PipetuneError::InvalidParameter {
                        name: other.to_string(),
                        value: format!("{value:?}"),
                        reason: format!("unknown parameter for {}", self.name()),
                    });
                }
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(PipetuneError::Data("cannot fit on empty data".to_string()));
        }

        let n = n_samples as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.n_iters {
            let pred = x.dot(&weights) + bias;
            let errors = &pred - y;

            let grad_w = x.t().dot(&errors) / n + self.alpha * &weights / n;
            let grad_b = errors.sum() / n;

            weights -= &(self.learning_rate * &grad_w);
            bias -= self.learning_rate * grad_b;
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(PipetuneError::ModelNotFitted)?;
        Ok(x.dot(weights) + self.bias)
    }

    fn fresh(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            alpha: self.alpha,
            learning_rate: self.learning_rate,
            n_iters: self.n_iters,
            weights: None,
            bias: 0.0,
        })
    }

    fn to_artifact(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_line() {
        // y = 2x + 1
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 3.0, 5.0, 7.0, 9.0];

        let mut model = RidgeRegression::new(0.0)
            .with_learning_rate(0.05)
            .with_n_iters(5000);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[5.0]]).unwrap();
        assert!((pred[0] - 11.0).abs() < 0.5, "got {}", pred[0]);
    }

    #[test]
    fn test_regularization_shrinks_weights() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 2.0, 4.0, 6.0];

        let mut free = RidgeRegression::new(0.0).with_n_iters(3000);
        let mut shrunk = RidgeRegression::new(50.0).with_n_iters(3000);
        free.fit(&x, &y).unwrap();
        shrunk.fit(&x, &y).unwrap();

        let w_free = free.coefficients().unwrap()[0].abs();
        let w_shrunk = shrunk.coefficients().unwrap()[0].abs();
        assert!(w_shrunk < w_free);
    }

    #[test]
    fn test_apply_params() {
        let mut model = RidgeRegression::default();
        let mut params = ParamSet::new();
        params.insert(
            "alpha".to_string(),
            crate::search::space::ParamValue::Float(0.5),
        );
        params.insert(
            "n_iters".to_string(),
            crate::search::space::ParamValue::Int(200),
        );

        model.apply_params(&params).unwrap();
        assert_eq!(model.alpha, 0.5);
        assert_eq!(model.n_iters, 200);
    }
}
