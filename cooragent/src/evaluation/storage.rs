//! Run artifacts on disk: `results/`, `reports/`, and
//! `transcripts/<run_id>/<task_id>.json` under the configured output
//! directory.

use std::path::{Path, PathBuf};

use crate::error::WorkflowError;

use super::EvaluationResult;

pub struct ResultStore {
    results_dir: PathBuf,
    reports_dir: PathBuf,
    transcripts_dir: PathBuf,
}

impl ResultStore {
    pub fn open(base: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let base = base.as_ref();
        let store = Self {
            results_dir: base.join("results"),
            reports_dir: base.join("reports"),
            transcripts_dir: base.join("transcripts"),
        };
        for dir in [&store.results_dir, &store.reports_dir, &store.transcripts_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                WorkflowError::Internal(format!("create {}: {e}", dir.display()))
            })?;
        }
        Ok(store)
    }

    fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), WorkflowError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| WorkflowError::Internal(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| WorkflowError::Internal(format!("write {}: {e}", path.display())))
    }

    /// Run summary, always persisted: `results/<run_id>.json`.
    pub fn save_summary(&self, result: &EvaluationResult) -> Result<PathBuf, WorkflowError> {
        let path = self.results_dir.join(format!("{}.json", result.run_id));
        let value =
            serde_json::to_value(result).map_err(|e| WorkflowError::Internal(e.to_string()))?;
        Self::write_json(&path, &value)?;
        Ok(path)
    }

    /// Human-readable report: `reports/<run_id>.md`.
    pub fn save_report(&self, run_id: &str, text: &str) -> Result<PathBuf, WorkflowError> {
        let path = self.reports_dir.join(format!("{run_id}.md"));
        std::fs::write(&path, text)
            .map_err(|e| WorkflowError::Internal(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }

    /// Per-task transcript: `transcripts/<run_id>/<task_id>.json`.
    pub fn save_task_transcript(
        &self,
        run_id: &str,
        task_id: &str,
        data: &serde_json::Value,
    ) -> Result<PathBuf, WorkflowError> {
        let run_dir = self.transcripts_dir.join(run_id);
        std::fs::create_dir_all(&run_dir)
            .map_err(|e| WorkflowError::Internal(format!("create {}: {e}", run_dir.display())))?;
        let path = run_dir.join(format!("{task_id}.json"));
        Self::write_json(&path, data)?;
        Ok(path)
    }
}
