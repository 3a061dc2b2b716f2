//! Event emission for one run.
//!
//! The sink wraps the run's SPSC channel: a slow consumer blocks the
//! producer at the channel boundary, a dropped consumer cancels the run.
//! Single-string node output is emitted as fixed-size `message` chunks with
//! small yields in between, followed by one `full_message` carrying the
//! concatenation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use stream_event::{
    AgentSpan, MessageDelta, MessagePayload, ToolCallPayload, ToolResultPayload, WorkflowEvent,
};

use crate::error::WorkflowError;

/// Characters per `message` chunk when a node's final text is emitted as a
/// single string.
pub const CHUNK_SIZE: usize = 10;

/// Splits on char boundaries into `size`-char pieces; content-preserving.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WorkflowEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<WorkflowEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Sends one event, blocking on back-pressure. Cancellation (or a dropped
    /// consumer, which cancels the token) aborts with `Cancelled`.
    pub async fn emit(&self, event: WorkflowEvent) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| {
                self.cancel.cancel();
                WorkflowError::Cancelled
            }),
        }
    }

    pub async fn agent_started(&self, agent_name: &str, agent_id: &str) -> Result<(), WorkflowError> {
        self.emit(WorkflowEvent::StartOfAgent {
            agent_name: agent_name.to_string(),
            data: AgentSpan {
                agent_name: agent_name.to_string(),
                agent_id: agent_id.to_string(),
            },
        })
        .await
    }

    pub async fn agent_ended(&self, agent_name: &str, agent_id: &str) -> Result<(), WorkflowError> {
        self.emit(WorkflowEvent::EndOfAgent {
            agent_name: agent_name.to_string(),
            data: AgentSpan {
                agent_name: agent_name.to_string(),
                agent_id: agent_id.to_string(),
            },
        })
        .await
    }

    pub async fn message_delta(
        &self,
        agent_name: &str,
        message_id: &str,
        delta: MessageDelta,
    ) -> Result<(), WorkflowError> {
        self.emit(WorkflowEvent::Message {
            agent_name: agent_name.to_string(),
            data: MessagePayload {
                message_id: message_id.to_string(),
                delta,
            },
        })
        .await
    }

    /// Emits `text` as chunked `message` events plus one `full_message`, all
    /// under a fresh message id. Concatenating the chunks reproduces `text`.
    pub async fn stream_text(&self, agent_name: &str, text: &str) -> Result<(), WorkflowError> {
        let message_id = Uuid::new_v4().to_string();
        for chunk in chunk_text(text, CHUNK_SIZE) {
            self.message_delta(agent_name, &message_id, MessageDelta::content(chunk))
                .await?;
            tokio::task::yield_now().await;
        }
        self.emit(WorkflowEvent::FullMessage {
            agent_name: agent_name.to_string(),
            data: MessagePayload {
                message_id,
                delta: MessageDelta::content(text.to_string()),
            },
        })
        .await
    }

    pub async fn tool_call(
        &self,
        agent_name: &str,
        tool_call_id: &str,
        tool_name: &str,
        tool_input: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        self.emit(WorkflowEvent::ToolCall {
            agent_name: agent_name.to_string(),
            data: ToolCallPayload {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
                tool_input,
            },
        })
        .await
    }

    pub async fn tool_call_result(
        &self,
        agent_name: &str,
        tool_call_id: &str,
        tool_name: &str,
        tool_result: &str,
    ) -> Result<(), WorkflowError> {
        self.emit(WorkflowEvent::ToolCallResult {
            agent_name: agent_name.to_string(),
            data: ToolResultPayload {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
                tool_result: tool_result.to_string(),
            },
        })
        .await
    }
}
