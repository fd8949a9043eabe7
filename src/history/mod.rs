//! History persistence for validation results
//!
//! A [`HistoryManager`] owns one on-disk history: a record file holding every
//! persisted [`ValidationResult`] by slot index, a models directory holding the
//! matching fitted artifacts, and a single "best" record that replacement keeps
//! unique. Replacement is atomic from the caller's perspective: records are
//! written to a temporary file and renamed into place.

use crate::error::{PipetuneError, Result};
use crate::validation::{ScoreDirection, ValidationResult};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BEST_RECORD: &str = "best.json";
const BEST_MODEL: &str = "best_model.json";

/// Persists and ranks validation results for one tracked identity.
///
/// Identity is the directory pair: two managers pointed at the same directories
/// track the same history. A missing or corrupted best record reads as "no
/// current best", never as an error.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    output_dir: PathBuf,
    models_dir: PathBuf,
    record_file: String,
    direction: ScoreDirection,
}

impl HistoryManager {
    /// Create a manager rooted at `output_dir`, with model artifacts under
    /// `models_subdir` and records in `<record_file>.json`
    pub fn new(
        output_dir: impl Into<PathBuf>,
        models_subdir: &str,
        record_file: &str,
        direction: ScoreDirection,
    ) -> Self {
        let output_dir = output_dir.into();
        let models_dir = output_dir.join(models_subdir);
        Self {
            output_dir,
            models_dir,
            record_file: record_file.to_string(),
            direction,
        }
    }

    /// Configured ranking direction
    pub fn direction(&self) -> ScoreDirection {
        self.direction
    }

    /// The history root directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn records_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.json", self.record_file))
    }

    fn model_path(&self, index: usize) -> PathBuf {
        self.models_dir.join(format!("model_{index}.json"))
    }

    fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(&self.models_dir)?;
        Ok(())
    }

    // Slots are Option so deletion never shifts the indices of other records
    fn load_slots(&self) -> Result<Vec<Option<ValidationResult>>> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn store_slots(&self, slots: &[Option<ValidationResult>]) -> Result<()> {
        self.ensure_dirs()?;
        let json = serde_json::to_string_pretty(slots)?;
        atomic_write(&self.records_path(), &json)
    }

    /// Persist a result in the next free slot and return its index.
    ///
    /// The fitted model artifact is written alongside as `model_<index>.json`.
    pub fn save(&self, result: &ValidationResult) -> Result<usize> {
        self.ensure_dirs()?;

        let mut slots = self.load_slots()?;
        let index = slots.len();
        slots.push(Some(result.clone()));
        self.store_slots(&slots)?;

        let model_json = serde_json::to_string_pretty(&result.model)?;
        atomic_write(&self.model_path(index), &model_json)?;

        debug!(pipeline = %result.pipeline, index, score = result.mean_score, "saved history record");
        Ok(index)
    }

    /// Load the record at `index`
    pub fn load(&self, index: usize) -> Result<ValidationResult> {
        let slots = self.load_slots()?;
        slots
            .get(index)
            .cloned()
            .flatten()
            .ok_or_else(|| PipetuneError::History(format!("no record at index {index}")))
    }

    /// Load the model artifact persisted with slot `index`
    pub fn load_model(&self, index: usize) -> Result<Value> {
        let path = self.model_path(index);
        if !path.exists() {
            return Err(PipetuneError::History(format!(
                "no model artifact at index {index}"
            )));
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Number of slots, including deleted ones
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.load_slots()?.len())
    }

    /// Drop the record and artifact at `index`; later indices are unaffected
    pub fn delete(&self, index: usize) -> Result<()> {
        let mut slots = self.load_slots()?;
        if let Some(slot) = slots.get_mut(index) {
            *slot = None;
            self.store_slots(&slots)?;
        }
        let model = self.model_path(index);
        if model.exists() {
            fs::remove_file(model)?;
        }
        Ok(())
    }

    /// Compare two results by the configured direction
    pub fn is_better(&self, new: &ValidationResult, current: &ValidationResult) -> bool {
        self.direction.improves(new.mean_score, current.mean_score)
    }

    /// The current best record, if a readable one exists.
    ///
    /// Missing or corrupted best files are the "no current best" initial state.
    pub fn load_best(&self) -> Result<Option<ValidationResult>> {
        let path = self.output_dir.join(BEST_RECORD);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                debug!(path = %path.display(), "best record unreadable, treating as none");
                Ok(None)
            }
        }
    }

    /// Offer a result as the new best.
    ///
    /// Replaces the persisted best record and artifact iff the result improves
    /// on the current best (or none exists). Returns whether it replaced.
    pub fn save_best(&self, result: &ValidationResult) -> Result<bool> {
        if let Some(current) = self.load_best()? {
            if !self.is_better(result, &current) {
                debug!(
                    new = result.mean_score,
                    current = current.mean_score,
                    "result does not improve on best, keeping current"
                );
                return Ok(false);
            }
        }

        self.ensure_dirs()?;
        let record_json = serde_json::to_string_pretty(result)?;
        atomic_write(&self.output_dir.join(BEST_RECORD), &record_json)?;
        let model_json = serde_json::to_string_pretty(&result.model)?;
        atomic_write(&self.output_dir.join(BEST_MODEL), &model_json)?;

        info!(
            pipeline = %result.pipeline,
            score = result.mean_score,
            "replaced best record"
        );
        Ok(true)
    }
}

// Write-to-temp then rename, so readers never observe a half-written file
fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::space::ParamSet;
    use crate::validation::Scoring;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(pipeline: &str, score: f64) -> ValidationResult {
        ValidationResult {
            pipeline: pipeline.to_string(),
            estimator: "decision_tree_classifier".to_string(),
            params: ParamSet::new(),
            selected_features: None,
            fold_scores: vec![score],
            mean_score: score,
            std_score: 0.0,
            scoring: Scoring::Accuracy,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            feature_search_secs: 0.0,
            param_search_secs: 0.0,
            validation_secs: 0.0,
            model: serde_json::json!({"stub": true}),
        }
    }

    fn manager(dir: &TempDir, direction: ScoreDirection) -> HistoryManager {
        HistoryManager::new(dir.path().join("history"), "models", "params", direction)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);

        let idx0 = mgr.save(&record("a", 0.8)).unwrap();
        let idx1 = mgr.save(&record("b", 0.9)).unwrap();
        assert_eq!((idx0, idx1), (0, 1));

        let loaded = mgr.load(1).unwrap();
        assert_eq!(loaded.pipeline, "b");
        assert_eq!(mgr.record_count().unwrap(), 2);
        assert!(mgr.load_model(0).unwrap().is_object());
    }

    #[test]
    fn test_load_best_on_empty_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);
        assert!(mgr.load_best().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_best_is_none() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);
        std::fs::create_dir_all(mgr.output_dir()).unwrap();
        std::fs::write(mgr.output_dir().join("best.json"), "{not json").unwrap();

        assert!(mgr.load_best().unwrap().is_none());
    }

    #[test]
    fn test_best_replacement_higher_is_better() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);

        assert!(mgr.save_best(&record("a", 0.8)).unwrap());
        assert!(mgr.save_best(&record("b", 0.9)).unwrap());
        assert_eq!(mgr.load_best().unwrap().unwrap().mean_score, 0.9);

        // Worse result does not replace
        assert!(!mgr.save_best(&record("c", 0.7)).unwrap());
        assert_eq!(mgr.load_best().unwrap().unwrap().pipeline, "b");
    }

    #[test]
    fn test_best_replacement_lower_is_better() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::LowerIsBetter);

        assert!(mgr.save_best(&record("a", 1.5)).unwrap());
        assert!(mgr.save_best(&record("b", 0.4)).unwrap());
        assert!(!mgr.save_best(&record("c", 0.9)).unwrap());
        assert_eq!(mgr.load_best().unwrap().unwrap().pipeline, "b");
    }

    #[test]
    fn test_equal_score_does_not_replace() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);

        mgr.save_best(&record("a", 0.9)).unwrap();
        assert!(!mgr.save_best(&record("b", 0.9)).unwrap());
        assert_eq!(mgr.load_best().unwrap().unwrap().pipeline, "a");
    }

    #[test]
    fn test_delete_keeps_other_indices_stable() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, ScoreDirection::HigherIsBetter);

        mgr.save(&record("a", 0.1)).unwrap();
        mgr.save(&record("b", 0.2)).unwrap();
        mgr.save(&record("c", 0.3)).unwrap();

        mgr.delete(1).unwrap();

        assert!(mgr.load(1).is_err());
        assert!(mgr.load_model(1).is_err());
        assert_eq!(mgr.load(2).unwrap().pipeline, "c");
        assert_eq!(mgr.record_count().unwrap(), 3);
    }

    #[test]
    fn test_is_better_uses_direction() {
        let dir = TempDir::new().unwrap();
        let higher = manager(&dir, ScoreDirection::HigherIsBetter);
        assert!(higher.is_better(&record("n", 0.9), &record("c", 0.8)));
        assert!(!higher.is_better(&record("n", 0.7), &record("c", 0.8)));

        let lower = HistoryManager::new(
            dir.path().join("lower"),
            "models",
            "params",
            ScoreDirection::LowerIsBetter,
        );
        assert!(lower.is_better(&record("n", 0.2), &record("c", 0.8)));
    }
}
