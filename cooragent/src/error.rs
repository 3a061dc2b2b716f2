//! Error taxonomy for workflow runs.
//!
//! Layer-local errors (`RegistryError`, `ToolError`, `TemplateError`) convert
//! into [`WorkflowError`]; the controller maps the final error into the
//! terminal `error` event via [`WorkflowError::kind`].

use stream_event::{ErrorInfo, ErrorKind};
use thiserror::Error;

/// One run's failure modes. Every node returns `Result<_, WorkflowError>`;
/// the graph controller turns the first unrecovered error into the stream's
/// terminal `error` event.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed request, unknown tool in a definition, non-JSON planner output.
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Structured LM output broke the contract (missing field, next-agent
    /// outside the roster).
    #[error("protocol: {0}")]
    Protocol(String),

    /// Tool invocation failed. Non-fatal inside the proxy loop.
    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    /// Upstream LM call failed after the in-node retry.
    #[error("llm: {0}")]
    Llm(String),

    /// Prompt template referenced an unknown placeholder.
    #[error("template: {0}")]
    Template(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            WorkflowError::Protocol(_) => ErrorKind::Protocol,
            WorkflowError::Tool { .. } => ErrorKind::Tool,
            WorkflowError::Llm(_) => ErrorKind::Llm,
            WorkflowError::Template(_) => ErrorKind::Template,
            WorkflowError::Cancelled => ErrorKind::Cancelled,
            WorkflowError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Kind + message as carried by the terminal `error` event.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_each_variant() {
        assert_eq!(
            WorkflowError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(WorkflowError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            WorkflowError::Tool {
                tool: "t".into(),
                message: "m".into()
            }
            .kind(),
            ErrorKind::Tool
        );
    }

    #[test]
    fn error_info_carries_display_message() {
        let info = WorkflowError::Protocol("next not in roster".into()).to_error_info();
        assert_eq!(info.kind, ErrorKind::Protocol);
        assert!(info.message.contains("next not in roster"));
    }
}
