//! Tools: trait, registry, and input validation.
//!
//! Tools are registered at process start and the registry is read-only
//! afterwards. Every call is validated against the tool's JSON Schema before
//! the implementation runs. A registry entry may be spec-only (no
//! implementation): agents referencing it stay loadable but the call fails
//! with [`ToolError::NotRunnable`].

mod defaults;
mod search;

pub use defaults::{
    default_tool_specs, seed_tool_records, TOOL_BASH, TOOL_BROWSER, TOOL_CRAWL, TOOL_PYTHON_REPL,
};
pub use search::{TavilySearch, TOOL_TAVILY};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowError;

/// Name, description, and input schema of one tool. Agents persist a snapshot
/// of the specs they were created with, so later schema evolution in the
/// registry does not silently change an agent's contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Per-call context. The cancellation token is derived from the run's token;
/// tools are expected to honor it.
#[derive(Clone, Debug, Default)]
pub struct ToolContext {
    pub user_id: Option<String>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            user_id: None,
            cancel,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("{tool} is registered without an implementation")]
    NotRunnable { tool: String },
    #[error("{tool} failed: {message}")]
    Execution { tool: String, message: String },
    #[error("cancelled")]
    Cancelled,
}

impl From<ToolError> for WorkflowError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Cancelled => WorkflowError::Cancelled,
            ToolError::Unknown(name) => WorkflowError::Tool {
                tool: name,
                message: "unknown tool".into(),
            },
            ToolError::InvalidInput { tool, message }
            | ToolError::Execution { tool, message } => WorkflowError::Tool { tool, message },
            ToolError::NotRunnable { tool } => WorkflowError::Tool {
                tool,
                message: "registered without an implementation".into(),
            },
        }
    }
}

/// A single invokable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    fn spec(&self) -> ToolSpec;

    /// Executes with already-validated arguments.
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Validates `args` against a JSON Schema; all violations are joined into one
/// message.
pub fn validate_args(tool: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::InvalidInput {
        tool: tool.to_string(),
        message: format!("invalid schema: {e}"),
    })?;
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidInput {
            tool: tool.to_string(),
            message: errors.join("; "),
        })
    }
}

struct ToolEntry {
    spec: ToolSpec,
    imp: Option<Arc<dyn Tool>>,
}

/// Name-indexed tool set with stable registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an invokable tool. Replaces any spec-only entry of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let spec = tool.spec();
        let name = spec.name.clone();
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(
            name,
            ToolEntry {
                spec,
                imp: Some(tool),
            },
        );
    }

    /// Registers a spec without an implementation (known tool, not runnable
    /// in this process). Does not overwrite an invokable entry.
    pub fn register_spec(&mut self, spec: ToolSpec) {
        if let Some(existing) = self.entries.get(&spec.name) {
            if existing.imp.is_some() {
                return;
            }
        } else {
            self.order.push(spec.name.clone());
        }
        self.entries.insert(spec.name.clone(), ToolEntry { spec, imp: None });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<ToolSpec> {
        self.entries.get(name).map(|e| e.spec.clone())
    }

    /// All specs in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|e| e.spec.clone()))
            .collect()
    }

    /// Validates against the registry's own schema, then invokes.
    pub async fn call(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        validate_args(name, &entry.spec.input_schema, &args)?;
        self.invoke_unvalidated(name, args, ctx).await
    }

    /// Invokes without schema validation. The proxy loop validates against the
    /// agent's recorded snapshot instead of the live schema, then calls this.
    pub async fn invoke_unvalidated(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        let tool = entry.imp.as_ref().ok_or_else(|| ToolError::NotRunnable {
            tool: name.to_string(),
        })?;
        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        tool.call(args, ctx).await
    }
}
