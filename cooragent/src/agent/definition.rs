//! The persisted agent record.

use serde::{Deserialize, Serialize};

use crate::llm::LlmType;
use crate::tools::ToolSpec;

use super::RegistryError;

/// Owner id that makes an agent visible to every user.
pub const SHARE_OWNER: &str = "share";

/// A named, persisted configuration of LM channel, tools, and prompt that the
/// orchestrator can dispatch. `agent_name` is globally unique across the
/// store; `(user_id, agent_name)` is the external identity.
///
/// `selected_tools` carries the schema snapshot captured when the agent was
/// created (or last re-bound through `edit`), so registry-side schema
/// evolution does not silently change this agent's contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub user_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub description: String,
    pub llm_type: LlmType,
    #[serde(default)]
    pub selected_tools: Vec<ToolSpec>,
    /// Template text with `<<VAR>>` placeholders.
    pub prompt: String,
}

impl AgentDefinition {
    pub fn is_shared(&self) -> bool {
        self.user_id == SHARE_OWNER
    }

    /// Structural checks before any store write. The name doubles as the
    /// record's file stem, so it is restricted to word characters.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.user_id.is_empty() {
            return Err(RegistryError::Validation("user_id must not be empty".into()));
        }
        if self.agent_name.is_empty() {
            return Err(RegistryError::Validation(
                "agent_name must not be empty".into(),
            ));
        }
        if !self
            .agent_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RegistryError::Validation(format!(
                "agent_name {} may only contain alphanumerics, '_' and '-'",
                self.agent_name
            )));
        }
        if self.prompt.is_empty() {
            return Err(RegistryError::Validation("prompt must not be empty".into()));
        }
        Ok(())
    }
}
