//! Bounded-concurrency task runner with timeouts and retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::WorkflowError;
use crate::service::WorkflowService;

use super::{
    average_metrics, EvalTask, EvaluationConfig, EvaluationResult, ResultStore, Scorer,
    SubstringScorer, TaskOutcome, TaskScore, WorkflowTaskAdapter,
};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

pub struct EvaluationEngine {
    adapter: WorkflowTaskAdapter,
    scorer: Box<dyn Scorer>,
    store: ResultStore,
    config: EvaluationConfig,
}

impl EvaluationEngine {
    pub fn new(
        service: Arc<WorkflowService>,
        config: EvaluationConfig,
    ) -> Result<Self, WorkflowError> {
        let store = ResultStore::open(&config.output_dir)?;
        Ok(Self {
            adapter: WorkflowTaskAdapter::new(service),
            scorer: Box::new(SubstringScorer),
            store,
            config,
        })
    }

    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Runs every task (up to `limit`), never more than
    /// `max_concurrent_tasks` live at once, and persists the run summary plus
    /// per-task transcripts when requested.
    pub async fn run(&self, tasks: Vec<EvalTask>) -> Result<EvaluationResult, WorkflowError> {
        let started_at = Utc::now();
        let run_id = format!("eval-{}", started_at.timestamp());
        let tasks: Vec<EvalTask> = match self.config.limit {
            Some(limit) => tasks.into_iter().take(limit).collect(),
            None => tasks,
        };
        info!(
            run_id = %run_id,
            num_tasks = tasks.len(),
            max_concurrent = self.config.max_concurrent_tasks,
            timeout_s = self.config.timeout_per_task,
            "starting evaluation"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tasks.max(1)));
        let scores: Vec<TaskScore> = join_all(
            tasks
                .iter()
                .map(|task| self.run_task(task, &semaphore, &run_id)),
        )
        .await;

        let metrics = average_metrics(&scores);
        let finished_at = Utc::now();
        let result = EvaluationResult {
            run_id: run_id.clone(),
            config: self.config.clone(),
            metrics,
            scores,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            num_tasks: tasks.len(),
        };
        info!(
            run_id = %run_id,
            aggregate = result.metrics.aggregate_score,
            duration_ms = result.duration_ms,
            "evaluation done"
        );

        self.store.save_summary(&result)?;
        self.store.save_report(&run_id, &render_report(&result))?;
        Ok(result)
    }

    async fn run_task(
        &self,
        task: &EvalTask,
        semaphore: &Arc<Semaphore>,
        run_id: &str,
    ) -> TaskScore {
        let Ok(_permit) = semaphore.acquire().await else {
            return TaskScore::zero(&task.task_id);
        };
        info!(task_id = %task.task_id, "task start");

        let mut attempts = 0u32;
        let outcome = loop {
            let outcome = self.execute_once(task).await;
            if outcome.error.is_none() {
                break outcome;
            }
            let will_retry =
                self.config.retry_failed_tasks && attempts < self.config.max_retries;
            warn!(
                task_id = %task.task_id,
                attempt = attempts + 1,
                error = outcome.error.as_deref().unwrap_or_default(),
                retry = will_retry,
                "task attempt failed"
            );
            if !will_retry {
                break outcome;
            }
            attempts += 1;
            tokio::time::sleep(RETRY_BACKOFF).await;
        };

        let score = self.scorer.score(task, &outcome);
        if self.config.save_details {
            let data = serde_json::json!({
                "task_id": task.task_id,
                "question": task.question,
                "response": outcome.to_json(),
                "score": serde_json::to_value(&score).unwrap_or_default(),
            });
            if let Err(e) = self.store.save_task_transcript(run_id, &task.task_id, &data) {
                warn!(task_id = %task.task_id, error = %e, "failed saving transcript");
            }
        }
        info!(task_id = %task.task_id, accuracy = score.accuracy, "task scored");
        score
    }

    /// One attempt. A timeout drops the run future, which drops the stream
    /// and cancels the run; the outcome records `Cancelled`.
    async fn execute_once(&self, task: &EvalTask) -> TaskOutcome {
        let attempt = self.adapter.execute(task, self.config.save_details);
        let result = if self.config.timeout_per_task > 0 {
            match tokio::time::timeout(
                Duration::from_secs(self.config.timeout_per_task),
                attempt,
            )
            .await
            {
                Ok(result) => result,
                Err(_) => return TaskOutcome::cancelled(),
            }
        } else {
            attempt.await
        };
        result.unwrap_or_else(|e| TaskOutcome::failed(e.to_string()))
    }
}

fn render_report(result: &EvaluationResult) -> String {
    let m = &result.metrics;
    format!(
        "# Evaluation {}\n\n\
         - tasks: {}\n\
         - accuracy: {:.3}\n\
         - completeness: {:.3}\n\
         - efficiency: {:.3}\n\
         - tool usage: {:.3}\n\
         - aggregate: {:.3}\n\
         - duration: {} ms\n",
        result.run_id,
        result.num_tasks,
        m.accuracy,
        m.completeness,
        m.efficiency,
        m.tool_usage,
        m.aggregate_score,
        result.duration_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_aggregate() {
        let now = Utc::now();
        let result = EvaluationResult {
            run_id: "eval-9".into(),
            config: EvaluationConfig::default(),
            metrics: average_metrics(&[TaskScore {
                task_id: "t".into(),
                accuracy: 1.0,
                completeness: 0.0,
                efficiency: 0.0,
                tool_usage: 0.0,
                passed: true,
            }]),
            scores: vec![],
            started_at: now,
            finished_at: now,
            duration_ms: 5,
            num_tasks: 1,
        };
        let report = render_report(&result);
        assert!(report.contains("aggregate: 0.250"));
    }
}
