//! Workflow stream protocol: event tag + data payload.
//!
//! One run of the orchestrator produces an ordered stream of [`WorkflowEvent`]s,
//! serialized as one JSON object per line (`{"event": <tag>, "data": {...}}`).
//! State-carrying payloads (`input`, `messages`, `definition`, `tool_input`)
//! use `serde_json::Value`; the core crate serializes its own types into that.

mod event;

pub use event::{
    AgentSpan, ErrorInfo, ErrorKind, MessageDelta, MessagePayload, NewAgentPayload,
    ToolCallPayload, ToolResultPayload, WorkflowEnd, WorkflowEvent, WorkflowFailure,
    WorkflowStart,
};
