//! Event types for the workflow stream.
//!
//! Wire shape is `{"event": <tag>, "agent_name"?: <string>, "data": {...}}`.
//! The first event of a run is `start_of_workflow`; the last is
//! `end_of_workflow` or `error`. Between them, every node execution is
//! bracketed by `start_of_agent` / `end_of_agent`, with `message` deltas and
//! `tool_call` / `tool_call_result` pairs in between.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error category carried by the terminal `error` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Protocol,
    Tool,
    Llm,
    Template,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Tool => "tool",
            ErrorKind::Llm => "llm",
            ErrorKind::Template => "template",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Kind + human message for the terminal `error` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// Payload of `start_of_workflow`: run id and the input messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowStart {
    pub workflow_id: String,
    pub input: Value,
}

/// Payload of `start_of_agent` / `end_of_agent`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSpan {
    pub agent_name: String,
    pub agent_id: String,
}

/// Incremental text from one node; at most one of the two fields is set per delta.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl MessageDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            reasoning_content: None,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            content: None,
            reasoning_content: Some(text.into()),
        }
    }
}

/// Payload of `message` and `full_message`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: String,
    pub delta: MessageDelta,
}

/// Payload of `tool_call`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool_call_id: String,
    pub tool_name: String,
    pub tool_input: Value,
}

/// Payload of `tool_call_result`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool_call_id: String,
    pub tool_name: String,
    pub tool_result: String,
}

/// Payload of `new_agent_created`: the full persisted definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewAgentPayload {
    pub agent_name: String,
    pub definition: Value,
}

/// Payload of `end_of_workflow`: run id and the final message list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowEnd {
    pub workflow_id: String,
    pub messages: Value,
}

/// Payload of `error`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub workflow_id: String,
    pub error: ErrorInfo,
}

/// One event on a run's stream (tag + payload; `agent_name` where applicable).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StartOfWorkflow {
        data: WorkflowStart,
    },
    StartOfAgent {
        agent_name: String,
        data: AgentSpan,
    },
    EndOfAgent {
        agent_name: String,
        data: AgentSpan,
    },
    Message {
        agent_name: String,
        data: MessagePayload,
    },
    FullMessage {
        agent_name: String,
        data: MessagePayload,
    },
    ToolCall {
        agent_name: String,
        data: ToolCallPayload,
    },
    ToolCallResult {
        agent_name: String,
        data: ToolResultPayload,
    },
    NewAgentCreated {
        agent_name: String,
        data: NewAgentPayload,
    },
    EndOfWorkflow {
        data: WorkflowEnd,
    },
    Error {
        data: WorkflowFailure,
    },
}

impl WorkflowEvent {
    /// Tag string as it appears on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            WorkflowEvent::StartOfWorkflow { .. } => "start_of_workflow",
            WorkflowEvent::StartOfAgent { .. } => "start_of_agent",
            WorkflowEvent::EndOfAgent { .. } => "end_of_agent",
            WorkflowEvent::Message { .. } => "message",
            WorkflowEvent::FullMessage { .. } => "full_message",
            WorkflowEvent::ToolCall { .. } => "tool_call",
            WorkflowEvent::ToolCallResult { .. } => "tool_call_result",
            WorkflowEvent::NewAgentCreated { .. } => "new_agent_created",
            WorkflowEvent::EndOfWorkflow { .. } => "end_of_workflow",
            WorkflowEvent::Error { .. } => "error",
        }
    }

    /// True for `end_of_workflow` and `error` (exactly one of which ends a run).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::EndOfWorkflow { .. } | WorkflowEvent::Error { .. }
        )
    }

    /// Serializes this event to a JSON object.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Serializes this event to one newline-terminated JSON line.
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_of_workflow_format() {
        let ev = WorkflowEvent::StartOfWorkflow {
            data: WorkflowStart {
                workflow_id: "wf-1".into(),
                input: json!([{"role": "user", "content": "hi"}]),
            },
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "start_of_workflow");
        assert_eq!(v["data"]["workflow_id"], "wf-1");
        assert_eq!(v["data"]["input"][0]["content"], "hi");
    }

    #[test]
    fn message_format_omits_missing_delta_fields() {
        let ev = WorkflowEvent::Message {
            agent_name: "planner".into(),
            data: MessagePayload {
                message_id: "m-1".into(),
                delta: MessageDelta::content("chunk"),
            },
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "message");
        assert_eq!(v["agent_name"], "planner");
        assert_eq!(v["data"]["delta"]["content"], "chunk");
        assert!(v["data"]["delta"].get("reasoning_content").is_none());
    }

    #[test]
    fn error_kind_round_trip() {
        let ev = WorkflowEvent::Error {
            data: WorkflowFailure {
                workflow_id: "wf-1".into(),
                error: ErrorInfo {
                    kind: ErrorKind::Cancelled,
                    message: "run cancelled".into(),
                },
            },
        };
        let line = ev.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        let back: WorkflowEvent = serde_json::from_str(line.trim_end()).unwrap();
        match back {
            WorkflowEvent::Error { data } => {
                assert_eq!(data.error.kind, ErrorKind::Cancelled);
            }
            other => panic!("expected error event, got {}", other.tag()),
        }
    }

    #[test]
    fn terminal_tags() {
        let end = WorkflowEvent::EndOfWorkflow {
            data: WorkflowEnd {
                workflow_id: "wf-1".into(),
                messages: json!([]),
            },
        };
        assert!(end.is_terminal());
        assert_eq!(end.tag(), "end_of_workflow");
        let span = WorkflowEvent::StartOfAgent {
            agent_name: "coordinator".into(),
            data: AgentSpan {
                agent_name: "coordinator".into(),
                agent_id: "wf-1_coordinator_1".into(),
            },
        };
        assert!(!span.is_terminal());
    }
}
