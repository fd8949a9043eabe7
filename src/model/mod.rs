//! Estimator seam and reference estimators
//!
//! [`Estimator`] is the contract the orchestration layer tunes and validates.
//! The heavy lifting lives behind this trait; the searchers, validators and
//! process manager only ever see it. A few small reference estimators are
//! provided so pipelines are runnable out of the box.

pub mod decision_tree;
pub mod knn;
pub mod linear;

pub use decision_tree::{Criterion, DecisionTree};
pub use knn::KnnClassifier;
pub use linear::RidgeRegression;

use crate::error::Result;
use crate::search::space::ParamSet;
use ndarray::{Array1, Array2};

/// A tunable, fittable model.
///
/// `apply_params` takes an assignment produced by a hyperparameter searcher;
/// unknown names are an error so typos in a search space fail loudly instead of
/// silently tuning nothing.
pub trait Estimator: Send + Sync {
    /// Stable estimator name, used in records and artifact files
    fn name(&self) -> &'static str;

    /// Apply a hyperparameter assignment to the (unfitted) configuration
    fn apply_params(&mut self, params: &ParamSet) -> Result<()>;

    /// Fit to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict targets for new data
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// An unfitted clone carrying the current configuration
    fn fresh(&self) -> Box<dyn Estimator>;

    /// Serialized fitted state, stored opaquely by the history manager
    fn to_artifact(&self) -> Result<serde_json::Value>;
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(crate::error::PipetuneError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    Ok(())
}
