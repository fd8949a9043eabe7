//! Process manager: runs a set of pipelines over one dataset
//!
//! Each pipeline runs its stages in order (feature search, hyperparameter
//! search, validation), records the trial in its own history, and the manager
//! keeps at most one best record across all pipelines. A failing pipeline is
//! logged and skipped; it never aborts the run.

use crate::error::Result;
use crate::history::HistoryManager;
use crate::pipeline::Pipeline;
use crate::search::features::select_columns;
use crate::validation::{CrossValidator, CvStrategy, Scoring, ValidationResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Run-wide settings shared by every pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Number of cross-validation folds
    pub fold_splits: usize,
    /// Preserve label proportions across folds
    pub stratified: bool,
    /// Seed for fold shuffling and searcher sampling
    pub seed: u64,
    /// Metric every pipeline is scored and ranked by
    pub scoring: Scoring,
    /// Parallel fold workers for the hyperparameter search stage; the
    /// validation stage uses the pipeline validator's own setting
    pub n_jobs: usize,
    /// Offer the run's best result to the shared best record
    pub save_history: bool,
    /// Drop all non-best trial records once the run finishes
    pub delete_trials_after_execution: bool,
    /// Resume from an already-persisted record instead of re-running stages
    pub history_index: Option<usize>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            fold_splits: 5,
            stratified: false,
            seed: 0,
            scoring: Scoring::Accuracy,
            n_jobs: 1,
            save_history: true,
            delete_trials_after_execution: false,
            history_index: None,
        }
    }
}

/// One executed (or resumed) pipeline within a run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Pipeline name
    pub pipeline: String,
    /// Position of the pipeline in the run; names need not be unique
    pub pipeline_index: usize,
    /// Slot the record occupies in the pipeline's history
    pub history_index: usize,
    /// The validation record
    pub result: ValidationResult,
    /// Whether the record came from history instead of a fresh execution
    pub resumed: bool,
}

/// Outcome of a full run, ranked best-first
#[derive(Debug)]
pub struct RunSummary {
    /// Completed pipeline runs, best first
    pub runs: Vec<PipelineRun>,
    /// Pipelines that failed or produced no result
    pub skipped: Vec<String>,
    /// Whether the shared best record was replaced by this run
    pub replaced_best: bool,
}

impl RunSummary {
    /// The run's best result, if any pipeline completed
    pub fn best(&self) -> Option<&PipelineRun> {
        self.runs.first()
    }
}

/// Executes pipelines sequentially and maintains the shared best record
pub struct ProcessManager {
    config: ProcessConfig,
    x: Array2<f64>,
    y: Array1<f64>,
    pipelines: Vec<Pipeline>,
    best_history: HistoryManager,
}

impl ProcessManager {
    pub fn new(
        config: ProcessConfig,
        x: Array2<f64>,
        y: Array1<f64>,
        pipelines: Vec<Pipeline>,
        best_history: HistoryManager,
    ) -> Self {
        Self {
            config,
            x,
            y,
            pipelines,
            best_history,
        }
    }

    fn cv(&self) -> CrossValidator {
        let strategy = if self.config.stratified {
            CvStrategy::StratifiedKFold {
                n_splits: self.config.fold_splits,
                shuffle: true,
            }
        } else {
            CvStrategy::KFold {
                n_splits: self.config.fold_splits,
                shuffle: true,
            }
        };
        CrossValidator::new(strategy).with_random_state(self.config.seed)
    }

    /// Run every pipeline and rank the results.
    ///
    /// Stage failures within a pipeline are logged and the pipeline skipped.
    /// Only history I/O at the manager level itself is fatal.
    pub fn run(&mut self) -> Result<RunSummary> {
        info!(
            pipelines = self.pipelines.len(),
            folds = self.config.fold_splits,
            scoring = ?self.config.scoring,
            "starting run"
        );

        let mut runs: Vec<PipelineRun> = Vec::with_capacity(self.pipelines.len());
        let mut skipped: Vec<String> = Vec::new();

        let cv = self.cv();
        for (pipeline_index, pipeline) in self.pipelines.iter_mut().enumerate() {
            let name = pipeline.name().to_string();
            match execute_pipeline(pipeline_index, pipeline, &self.config, &cv, &self.x, &self.y) {
                Ok(Some(run)) => runs.push(run),
                Ok(None) => {
                    warn!(pipeline = %name, "produced no result, skipping");
                    skipped.push(name);
                }
                Err(err) => {
                    warn!(pipeline = %name, %err, "pipeline failed, skipping");
                    skipped.push(name);
                }
            }
        }

        let direction = self.config.scoring.direction();
        runs.sort_by(|a, b| {
            if direction.improves(a.result.mean_score, b.result.mean_score) {
                std::cmp::Ordering::Less
            } else if direction.improves(b.result.mean_score, a.result.mean_score) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });

        let mut replaced_best = false;
        if let Some(best) = runs.first() {
            if self.config.save_history {
                replaced_best = self.best_history.save_best(&best.result)?;
            }
            info!(
                pipeline = %best.pipeline,
                score = best.result.mean_score,
                replaced_best,
                "run complete"
            );
        } else {
            warn!("no pipeline completed");
        }

        if self.config.delete_trials_after_execution {
            self.delete_trials(&runs)?;
        }

        Ok(RunSummary {
            runs,
            skipped,
            replaced_best,
        })
    }

    // Keeps the winning trial record, drops the rest
    fn delete_trials(&self, runs: &[PipelineRun]) -> Result<()> {
        for run in runs.iter().skip(1) {
            self.pipelines[run.pipeline_index]
                .history()
                .delete(run.history_index)?;
        }
        Ok(())
    }
}

fn execute_pipeline(
    pipeline_index: usize,
    pipeline: &mut Pipeline,
    config: &ProcessConfig,
    cv: &CrossValidator,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<Option<PipelineRun>> {
    let name = pipeline.name().to_string();

    // Resumption short-circuits every stage
    if let Some(index) = config.history_index {
        match pipeline.history().load(index) {
            Ok(result) => {
                info!(pipeline = %name, index, "resumed from history");
                return Ok(Some(PipelineRun {
                    pipeline: name,
                    pipeline_index,
                    history_index: index,
                    result,
                    resumed: true,
                }));
            }
            Err(err) => {
                warn!(pipeline = %name, index, %err, "resumption failed, executing fresh");
            }
        }
    }

    // Stage 1: feature search
    let mut selected: Option<Vec<usize>> = None;
    let mut feature_search_secs = 0.0;
    let x_used = match pipeline.feature_searcher() {
        Some(searcher) => {
            let selection = searcher.search(x, y)?;
            info!(
                pipeline = %name,
                n_selected = selection.indices.len(),
                "feature search done"
            );
            feature_search_secs = selection.duration_secs;
            let reduced = select_columns(x, &selection.indices)?;
            selected = Some(selection.indices);
            reduced
        }
        None => x.clone(),
    };

    let splits = cv.split(x_used.nrows(), Some(y))?;

    // Stage 2: hyperparameter search
    let scoring = config.scoring;
    let n_jobs = config.n_jobs;
    let estimator = pipeline.estimator().fresh();
    let space = pipeline.param_space().clone();
    let outcome = pipeline.param_searcher().search(
        estimator.as_ref(),
        &space,
        &x_used,
        y,
        &splits,
        scoring,
        n_jobs,
    )?;
    info!(
        pipeline = %name,
        candidates = outcome.n_candidates,
        best_score = outcome.best_score,
        "hyperparameter search done"
    );

    // Stage 3: validation and refit
    let result = pipeline.validator().validate(
        estimator.as_ref(),
        &outcome.best_params,
        &x_used,
        y,
        cv,
        scoring,
    )?;
    let Some(mut result) = result else {
        return Ok(None);
    };

    result.pipeline = name.clone();
    result.selected_features = selected;
    result.feature_search_secs = feature_search_secs;
    result.param_search_secs = outcome.duration_secs;

    let history_index = pipeline.history().save(&result)?;

    Ok(Some(PipelineRun {
        pipeline: name,
        pipeline_index,
        history_index,
        result,
        resumed: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionTree, KnnClassifier};
    use crate::search::hyper::GridSearcher;
    use crate::search::space::ParamSpace;
    use crate::validation::ScoreDirection;
    use ndarray::array;
    use tempfile::TempDir;

    fn dataset() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0],
            [0.5],
            [1.0],
            [1.5],
            [2.0],
            [10.0],
            [10.5],
            [11.0],
            [11.5],
            [12.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    fn history(dir: &TempDir, name: &str) -> HistoryManager {
        HistoryManager::new(
            dir.path().join(name),
            "models",
            "params",
            ScoreDirection::HigherIsBetter,
        )
    }

    fn tree_pipeline(dir: &TempDir, name: &str) -> Pipeline {
        Pipeline::builder(name, Box::new(DecisionTree::classifier()))
            .param_space(ParamSpace::new().int("max_depth", 1, 4))
            .param_searcher(Box::new(GridSearcher::new()))
            .history(history(dir, name))
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_ranks_pipelines_and_saves_best() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        let pipelines = vec![
            tree_pipeline(&dir, "tree"),
            Pipeline::builder("knn", Box::new(KnnClassifier::new(3)))
                .param_space(ParamSpace::new().int("n_neighbors", 1, 3))
                .param_searcher(Box::new(GridSearcher::new()))
                .history(history(&dir, "knn"))
                .build()
                .unwrap(),
        ];

        let best_history = history(&dir, "best");
        let config = ProcessConfig {
            stratified: true,
            seed: 7,
            ..ProcessConfig::default()
        };
        let mut manager = ProcessManager::new(config, x, y, pipelines, best_history);

        let summary = manager.run().unwrap();
        assert_eq!(summary.runs.len(), 2);
        assert!(summary.skipped.is_empty());
        assert!(summary.replaced_best);

        let best = summary.best().unwrap();
        assert!((best.result.mean_score - 1.0).abs() < 1e-12);

        // The shared history holds exactly the winning record
        let persisted = history(&dir, "best").load_best().unwrap().unwrap();
        assert_eq!(persisted.pipeline, best.pipeline);
    }

    #[test]
    fn test_save_history_disabled_keeps_best_empty() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        let config = ProcessConfig {
            stratified: true,
            seed: 7,
            save_history: false,
            ..ProcessConfig::default()
        };
        let mut manager = ProcessManager::new(
            config,
            x,
            y,
            vec![tree_pipeline(&dir, "tree")],
            history(&dir, "best"),
        );

        let summary = manager.run().unwrap();
        assert!(!summary.replaced_best);
        assert!(history(&dir, "best").load_best().unwrap().is_none());
    }

    #[test]
    fn test_delete_trials_keeps_only_winner() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        let pipelines = vec![tree_pipeline(&dir, "a"), tree_pipeline(&dir, "b")];
        let config = ProcessConfig {
            stratified: true,
            seed: 7,
            delete_trials_after_execution: true,
            ..ProcessConfig::default()
        };
        let mut manager = ProcessManager::new(config, x, y, pipelines, history(&dir, "best"));

        let summary = manager.run().unwrap();
        let winner = summary.best().unwrap();
        let loser = &summary.runs[1];

        assert!(history(&dir, &winner.pipeline)
            .load(winner.history_index)
            .is_ok());
        assert!(history(&dir, &loser.pipeline)
            .load(loser.history_index)
            .is_err());
    }

    #[test]
    fn test_duplicate_names_delete_from_their_own_history() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        // Two pipelines sharing a name, each with its own history directory
        let make = |h: HistoryManager| {
            Pipeline::builder("dup", Box::new(DecisionTree::classifier()))
                .param_space(ParamSpace::new().int("max_depth", 1, 4))
                .param_searcher(Box::new(GridSearcher::new()))
                .history(h)
                .build()
                .unwrap()
        };
        let pipelines = vec![make(history(&dir, "h1")), make(history(&dir, "h2"))];

        let config = ProcessConfig {
            stratified: true,
            seed: 7,
            delete_trials_after_execution: true,
            ..ProcessConfig::default()
        };
        let mut manager = ProcessManager::new(config, x, y, pipelines, history(&dir, "best"));

        let summary = manager.run().unwrap();
        let winner = summary.best().unwrap();
        let loser = &summary.runs[1];
        assert_eq!(winner.pipeline, loser.pipeline);
        assert_ne!(winner.pipeline_index, loser.pipeline_index);

        // Deletion must hit the loser's history, not the first match by name
        let dirs = ["h1", "h2"];
        assert!(history(&dir, dirs[winner.pipeline_index])
            .load(winner.history_index)
            .is_ok());
        assert!(history(&dir, dirs[loser.pipeline_index])
            .load(loser.history_index)
            .is_err());
    }

    #[test]
    fn test_resumption_skips_execution() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        // First run persists a record at index 0
        let config = ProcessConfig {
            stratified: true,
            seed: 7,
            ..ProcessConfig::default()
        };
        let mut first = ProcessManager::new(
            config.clone(),
            x.clone(),
            y.clone(),
            vec![tree_pipeline(&dir, "tree")],
            history(&dir, "best"),
        );
        let saved = first.run().unwrap();
        let index = saved.best().unwrap().history_index;

        // Second run resumes from that record
        let resume = ProcessConfig {
            history_index: Some(index),
            ..config
        };
        let mut second = ProcessManager::new(
            resume,
            x,
            y,
            vec![tree_pipeline(&dir, "tree")],
            history(&dir, "best"),
        );
        let summary = second.run().unwrap();

        let run = summary.best().unwrap();
        assert!(run.resumed);
        assert_eq!(run.history_index, index);
        // Resumption saved nothing new
        assert_eq!(history(&dir, "tree").record_count().unwrap(), 1);
    }

    #[test]
    fn test_failing_pipeline_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (x, y) = dataset();

        // More folds than samples makes the split itself fail
        let pipelines = vec![tree_pipeline(&dir, "ok")];
        let config = ProcessConfig {
            seed: 7,
            fold_splits: 50,
            ..ProcessConfig::default()
        };
        let mut manager = ProcessManager::new(config, x, y, pipelines, history(&dir, "best"));

        let summary = manager.run().unwrap();
        assert!(summary.runs.is_empty());
        assert_eq!(summary.skipped, vec!["ok".to_string()]);
    }
}
