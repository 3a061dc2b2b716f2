//! Evaluation harness: drives tasks through the orchestrator under a
//! concurrency bound, with per-task timeouts and retries, and persists run
//! artifacts.

mod adapter;
mod engine;
mod metrics;
mod storage;

pub use adapter::{extract_final_answer, TaskOutcome, WorkflowTaskAdapter};
pub use engine::EvaluationEngine;
pub use metrics::average_metrics;
pub use storage::ResultStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One benchmark question.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvalTask {
    pub task_id: String,
    pub question: String,
    /// Expected answer for substring scoring, when the dataset has one.
    #[serde(default)]
    pub expected: Option<String>,
    /// Short description of any attachments, appended to the user message.
    #[serde(default)]
    pub attachments_summary: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Evaluate only the first N tasks when set.
    pub limit: Option<usize>,
    pub max_concurrent_tasks: usize,
    /// Seconds; 0 disables the per-task timeout.
    pub timeout_per_task: u64,
    pub retry_failed_tasks: bool,
    pub max_retries: u32,
    /// Persist per-task transcripts in addition to the run summary.
    pub save_details: bool,
    pub output_dir: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            limit: None,
            max_concurrent_tasks: 5,
            timeout_per_task: 300,
            retry_failed_tasks: true,
            max_retries: 1,
            save_details: true,
            output_dir: PathBuf::from("./store/evaluation"),
        }
    }
}

/// Score components, each in `[0, 1]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskScore {
    pub task_id: String,
    pub accuracy: f64,
    pub completeness: f64,
    pub efficiency: f64,
    pub tool_usage: f64,
    pub passed: bool,
}

impl TaskScore {
    pub fn zero(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            accuracy: 0.0,
            completeness: 0.0,
            efficiency: 0.0,
            tool_usage: 0.0,
            passed: false,
        }
    }
}

/// Arithmetic means over the run's tasks; aggregate is the mean of the four
/// dimensions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub accuracy: f64,
    pub completeness: f64,
    pub efficiency: f64,
    pub tool_usage: f64,
    pub aggregate_score: f64,
    pub num_tasks: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub run_id: String,
    pub config: EvaluationConfig,
    pub metrics: BenchmarkMetrics,
    pub scores: Vec<TaskScore>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub num_tasks: usize,
}

/// Scoring hook; benchmarks override the default substring scorer.
pub trait Scorer: Send + Sync {
    fn score(&self, task: &EvalTask, outcome: &TaskOutcome) -> TaskScore;
}

/// Default scoring: accuracy is 1.0 iff the expected answer (trimmed,
/// case-insensitive) is a substring of the extracted one; the other
/// dimensions stay 0 unless a benchmark overrides.
pub struct SubstringScorer;

impl Scorer for SubstringScorer {
    fn score(&self, task: &EvalTask, outcome: &TaskOutcome) -> TaskScore {
        let accuracy = match (&task.expected, &outcome.answer) {
            (Some(expected), Some(answer)) if !expected.trim().is_empty() => {
                let expected = expected.trim().to_lowercase();
                let answer = answer.trim().to_lowercase();
                if answer.contains(&expected) {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        TaskScore {
            task_id: task.task_id.clone(),
            accuracy,
            completeness: 0.0,
            efficiency: 0.0,
            tool_usage: 0.0,
            passed: accuracy >= 0.5,
        }
    }
}
