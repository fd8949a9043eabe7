//! Pipetune - Model tuning pipelines with persistent history
//!
//! This crate bundles estimators with the searchers that tune them and runs
//! those bundles as pipelines over a shared dataset:
//! - Feature search narrows the input columns
//! - Hyperparameter search picks the estimator configuration
//! - Cross-validation scores the chosen configuration
//! - History managers persist every trial and keep at most one best record
//!
//! # Modules
//!
//! - [`model`] - The estimator contract and reference estimators
//! - [`search`] - Parameter spaces, hyperparameter and feature searchers
//! - [`validation`] - Cross-validation splitting, scoring, validators
//! - [`history`] - Trial and best-record persistence
//! - [`pipeline`] - One named bundle of tuning components
//! - [`process`] - Runs pipelines and maintains the shared best record

pub mod error;

pub mod history;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod search;
pub mod validation;

pub use error::{PipetuneError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipetuneError, Result};

    // Estimators
    pub use crate::model::{DecisionTree, Estimator, KnnClassifier, RidgeRegression};

    // Search
    pub use crate::search::{
        FeatureSearcher, FeatureSelection, GridSearcher, KBestSearcher, ParamSearcher, ParamSet,
        ParamSpace, ParamValue, PercentileSearcher, RandomSearcher, RecursiveEliminator,
        ScoreFunction,
    };

    // Validation
    pub use crate::validation::{
        cross_val_score, CrossValidationValidator, CrossValidator, CvSplit, CvStrategy,
        ScoreDirection, Scoring, ValidationResult, Validator,
    };

    // History
    pub use crate::history::HistoryManager;

    // Pipelines
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::process::{PipelineRun, ProcessConfig, ProcessManager, RunSummary};
}
