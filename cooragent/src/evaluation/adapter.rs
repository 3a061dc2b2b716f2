//! Turns one task into a workflow run and the run's stream into an outcome.

use std::sync::Arc;

use regex::Regex;

use stream_event::WorkflowEvent;

use crate::error::WorkflowError;
use crate::message::Message;
use crate::service::{AgentRequest, Lang, TaskType, WorkflowService};

use super::EvalTask;

/// What one task execution produced: the extracted answer, the raw assembled
/// text, the run error if any, and (when requested) every event.
#[derive(Clone, Debug, Default)]
pub struct TaskOutcome {
    pub answer: Option<String>,
    pub raw_output: Option<String>,
    pub error: Option<String>,
    pub transcript: Vec<serde_json::Value>,
}

impl TaskOutcome {
    pub fn cancelled() -> Self {
        Self {
            error: Some("Cancelled".into()),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "answer": self.answer,
            "raw_output": self.raw_output,
            "error": self.error,
            "transcript": self.transcript,
        })
    }
}

/// Scans for an explicit `Final Answer:` / `Answer:` / `Result:` marker
/// (case-insensitive), keeping the first line after it without trailing
/// punctuation. Falls back to the last numeric token, then to the full text.
pub fn extract_final_answer(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let markers = [
        r"(?i)final\s*answer\s*[:\-]\s*(.+)",
        r"(?i)answer\s*[:\-]\s*(.+)",
        r"(?i)result\s*[:\-]\s*(.+)",
    ];
    for pattern in markers {
        let re = Regex::new(pattern).expect("marker pattern is valid");
        if let Some(caps) = re.captures(text) {
            let candidate = caps[1]
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .trim_end_matches(['.', ' '])
                .to_string();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }
    let numeric = Regex::new(r"-?\d+(?:\.\d+)?").expect("numeric pattern is valid");
    if let Some(last) = numeric.find_iter(text).last() {
        return Some(last.as_str().to_string());
    }
    Some(text.trim().to_string())
}

pub struct WorkflowTaskAdapter {
    service: Arc<WorkflowService>,
}

impl WorkflowTaskAdapter {
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self { service }
    }

    fn task_request(task: &EvalTask) -> AgentRequest {
        let mut content = task.question.trim().to_string();
        if let Some(ref summary) = task.attachments_summary {
            content.push_str(&format!("\n\nAttachments summary: {summary}"));
        }
        AgentRequest {
            user_id: "eval".into(),
            lang: Lang::En,
            task_type: TaskType::AgentWorkflow,
            messages: vec![Message::user(content)],
            debug: false,
            deep_thinking_mode: true,
            search_before_planning: false,
            coop_agents: vec![],
        }
    }

    /// Runs the task to its terminal event. Returns Err only when the request
    /// itself is rejected; run-level failures land in `TaskOutcome::error`.
    pub async fn execute(
        &self,
        task: &EvalTask,
        collect_transcript: bool,
    ) -> Result<TaskOutcome, WorkflowError> {
        let mut stream = self.service.run(Self::task_request(task))?;

        let mut chunks = String::new();
        let mut transcript = Vec::new();
        let mut error = None;
        while let Some(event) = stream.next().await {
            if collect_transcript {
                if let Ok(value) = event.to_value() {
                    transcript.push(value);
                }
            }
            match &event {
                WorkflowEvent::Message { data, .. } => {
                    if let Some(ref content) = data.delta.content {
                        chunks.push_str(content);
                    }
                }
                WorkflowEvent::Error { data } => {
                    error = Some(format!("{:?}", data.error.kind));
                }
                _ => {}
            }
        }

        let raw_output = (!chunks.is_empty()).then(|| chunks.clone());
        let answer = if error.is_none() {
            extract_final_answer(&chunks)
        } else {
            None
        };
        Ok(TaskOutcome {
            answer,
            raw_output,
            error,
            transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_wins_over_numbers() {
        let text = "computed 17 then 42\nFinal Answer: Paris.\nmore text";
        assert_eq!(extract_final_answer(text).as_deref(), Some("Paris"));
    }

    #[test]
    fn marker_is_case_insensitive_and_first_line_only() {
        let text = "ANSWER: 12 apples\nnot this line";
        assert_eq!(extract_final_answer(text).as_deref(), Some("12 apples"));
    }

    #[test]
    fn numeric_fallback_takes_last_number() {
        assert_eq!(
            extract_final_answer("tried 3 then settled on 7.5").as_deref(),
            Some("7.5")
        );
    }

    #[test]
    fn full_text_fallback() {
        assert_eq!(
            extract_final_answer("  just words  ").as_deref(),
            Some("just words")
        );
        assert_eq!(extract_final_answer("   "), None);
    }
}
