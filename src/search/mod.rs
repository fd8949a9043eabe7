//! Feature and hyperparameter search

pub mod features;
pub mod hyper;
pub mod space;

pub use features::{
    select_columns, FeatureSearcher, FeatureSelection, KBestSearcher, PercentileSearcher,
    RecursiveEliminator, ScoreFunction,
};
pub use hyper::{GridSearcher, ParamSearchOutcome, ParamSearcher, RandomSearcher};
pub use space::{ParamKind, ParamSet, ParamSpace, ParamSpec, ParamValue};
