//! Pipeline: one named bundle of tuning components
//!
//! A pipeline pairs an estimator with the searchers and validator that tune it
//! and the history its trial records go to. Construction goes through
//! [`PipelineBuilder`]; once built, the component set is fixed and the process
//! manager drives the stages.

use crate::error::{PipetuneError, Result};
use crate::history::HistoryManager;
use crate::model::Estimator;
use crate::search::features::FeatureSearcher;
use crate::search::hyper::{ParamSearcher, RandomSearcher};
use crate::search::space::ParamSpace;
use crate::validation::validator::{CrossValidationValidator, Validator};

/// An estimator plus the components that tune and validate it
pub struct Pipeline {
    name: String,
    estimator: Box<dyn Estimator>,
    param_space: ParamSpace,
    feature_searcher: Option<Box<dyn FeatureSearcher>>,
    param_searcher: Box<dyn ParamSearcher>,
    validator: Box<dyn Validator>,
    history: HistoryManager,
}

impl Pipeline {
    /// Start building a pipeline around `estimator`
    pub fn builder(name: impl Into<String>, estimator: Box<dyn Estimator>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            estimator,
            param_space: ParamSpace::new(),
            feature_searcher: None,
            param_searcher: None,
            validator: None,
            history: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }

    pub fn param_space(&self) -> &ParamSpace {
        &self.param_space
    }

    /// Feature searcher, if the pipeline selects features at all
    pub fn feature_searcher(&mut self) -> Option<&mut (dyn FeatureSearcher + 'static)> {
        self.feature_searcher.as_deref_mut()
    }

    pub fn param_searcher(&mut self) -> &mut dyn ParamSearcher {
        self.param_searcher.as_mut()
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("estimator", &self.estimator.name())
            .field("has_feature_searcher", &self.feature_searcher.is_some())
            .finish()
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    name: String,
    estimator: Box<dyn Estimator>,
    param_space: ParamSpace,
    feature_searcher: Option<Box<dyn FeatureSearcher>>,
    param_searcher: Option<Box<dyn ParamSearcher>>,
    validator: Option<Box<dyn Validator>>,
    history: Option<HistoryManager>,
}

impl PipelineBuilder {
    /// Space the hyperparameter search draws from; empty means defaults only
    pub fn param_space(mut self, space: ParamSpace) -> Self {
        self.param_space = space;
        self
    }

    /// Select features before tuning
    pub fn feature_searcher(mut self, searcher: Box<dyn FeatureSearcher>) -> Self {
        self.feature_searcher = Some(searcher);
        self
    }

    pub fn param_searcher(mut self, searcher: Box<dyn ParamSearcher>) -> Self {
        self.param_searcher = Some(searcher);
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// History the pipeline's trial records are persisted to
    pub fn history(mut self, history: HistoryManager) -> Self {
        self.history = Some(history);
        self
    }

    /// Finish the pipeline.
    ///
    /// The history is required; searcher and validator fall back to a seeded
    /// random search over ten candidates and a serial cross-validation.
    pub fn build(self) -> Result<Pipeline> {
        let history = self.history.ok_or_else(|| {
            PipetuneError::InvalidParameter {
                name: "history".to_string(),
                value: "none".to_string(),
                reason: "pipelines need a history manager to record trials".to_string(),
            }
        })?;

        Ok(Pipeline {
            name: self.name,
            estimator: self.estimator,
            param_space: self.param_space,
            feature_searcher: self.feature_searcher,
            param_searcher: self
                .param_searcher
                .unwrap_or_else(|| Box::new(RandomSearcher::new(10, Some(0)))),
            validator: self
                .validator
                .unwrap_or_else(|| Box::new(CrossValidationValidator::new())),
            history,
        })
    }
}
