//! Agent definitions, durable store, and the shared in-memory registry.

mod defaults;
mod definition;
mod registry;
mod store;

pub use defaults::default_agents;
pub use definition::{AgentDefinition, SHARE_OWNER};
pub use registry::AgentRegistry;
pub use store::AgentStore;

use thiserror::Error;

use crate::error::WorkflowError;

/// Failure modes of registry operations. Store I/O never escapes raw; it is
/// wrapped as `Storage`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent {0} already exists")]
    AlreadyExists(String),
    #[error("agent {0} not found")]
    NotFound(String),
    #[error("agent {agent} references tool {tool} which is not in the tool registry")]
    SchemaMismatch { agent: String, tool: String },
    #[error("invalid agent definition: {0}")]
    Validation(String),
    #[error("agent store: {0}")]
    Storage(String),
}

impl From<RegistryError> for WorkflowError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyExists(name) => WorkflowError::AlreadyExists(name),
            RegistryError::NotFound(name) => WorkflowError::NotFound(name),
            RegistryError::SchemaMismatch { agent, tool } => WorkflowError::Validation(format!(
                "agent {agent} references unknown tool {tool}"
            )),
            RegistryError::Validation(message) => WorkflowError::Validation(message),
            RegistryError::Storage(message) => WorkflowError::Internal(message),
        }
    }
}
