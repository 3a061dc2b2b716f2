//! Conversation messages flowing through a run.
//!
//! A message is a role plus content; messages produced by a dispatched agent
//! additionally carry that agent's name. The list on
//! [`SessionState`](crate::state::SessionState) is append-only within a run.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set when the message was produced on behalf of a named agent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// Message attributed to a named agent (proxy reply, planner output, node notes).
    pub fn from_agent(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// Serializes a message slice for event payloads (`start_of_workflow.input`,
/// `end_of_workflow.messages`).
pub fn messages_to_value(messages: &[Message]) -> serde_json::Value {
    serde_json::to_value(messages).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}
