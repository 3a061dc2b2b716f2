//! LM client abstraction and the per-channel gateway.
//!
//! Nodes never talk to a concrete model; they resolve a client from
//! [`LlmGateway`] by [`LlmType`] and call the [`LlmClient`] trait. The
//! OpenAI-compatible implementation lives in [`ChatOpenAI`]; tests use
//! [`MockLlm`] with a scripted reply queue.
//!
//! # Streaming
//!
//! `invoke_stream` accepts an optional `Sender<MessageDelta>`; implementations
//! that stream (like `ChatOpenAI`) send deltas as they arrive and still return
//! the complete response. The default implementation calls `invoke` and sends
//! the full content as a single delta.

mod mock;
mod openai;

pub use mock::{MockLlm, MockReply};
pub use openai::ChatOpenAI;

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use stream_event::MessageDelta;

use crate::error::WorkflowError;
use crate::message::Message;
use crate::tools::ToolSpec;

/// LM channel an agent or node runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Basic,
    Reasoning,
    Vision,
    Code,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::Basic => "basic",
            LlmType::Reasoning => "reasoning",
            LlmType::Vision => "vision",
            LlmType::Code => "code",
        }
    }

    pub const ALL: [LlmType; 4] = [
        LlmType::Basic,
        LlmType::Reasoning,
        LlmType::Vision,
        LlmType::Code,
    ];
}

impl FromStr for LlmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(LlmType::Basic),
            "reasoning" => Ok(LlmType::Reasoning),
            "vision" => Ok(LlmType::Vision),
            "code" => Ok(LlmType::Code),
            _ => Err(format!(
                "unknown llm type: {s} (use basic, reasoning, vision, or code)"
            )),
        }
    }
}

/// One tool invocation requested by the LM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One completion: assistant text plus any tool calls.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: String,
    /// Empty means a plain reply; the proxy loop ends on it.
    pub tool_calls: Vec<ToolCall>,
}

/// LM client: messages in, assistant content and optional tool calls out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion turn. `tools` constrains the model to the given specs;
    /// pass an empty slice for plain chat.
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse, WorkflowError>;

    /// Streaming variant. When `delta_tx` is `Some`, deltas are sent through
    /// the channel as they arrive; the full response is still returned.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        delta_tx: Option<mpsc::Sender<MessageDelta>>,
    ) -> Result<LlmResponse, WorkflowError> {
        let response = self.invoke(messages, tools).await?;
        if let Some(tx) = delta_tx {
            if !response.content.is_empty() {
                let _ = tx.send(MessageDelta::content(response.content.clone())).await;
            }
        }
        Ok(response)
    }

    /// Structured output: the reply must be a JSON document. The default
    /// implementation invokes plain chat, strips a ```json fence, and parses.
    async fn invoke_structured(
        &self,
        messages: &[Message],
        _schema: &Value,
    ) -> Result<Value, WorkflowError> {
        let response = self.invoke(messages, &[]).await?;
        let text = strip_json_fence(&response.content);
        serde_json::from_str(text).map_err(|e| {
            WorkflowError::Protocol(format!("structured output is not valid JSON: {e}"))
        })
    }
}

impl std::fmt::Debug for dyn LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LlmClient")
    }
}

/// Removes a leading ```json fence and a trailing ``` when present.
pub fn strip_json_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Retries an LM call once on `WorkflowError::Llm`; the second failure
/// surfaces to the caller.
pub async fn with_retry<T, F, Fut>(op: F) -> Result<T, WorkflowError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    match op().await {
        Err(WorkflowError::Llm(message)) => {
            tracing::warn!(error = %message, "llm call failed, retrying once");
            op().await
        }
        other => other,
    }
}

/// Maps each [`LlmType`] to a client. Built once at startup; read-only after.
pub struct LlmGateway {
    clients: HashMap<LlmType, Arc<dyn LlmClient>>,
}

impl LlmGateway {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    pub fn with_client(mut self, llm_type: LlmType, client: Arc<dyn LlmClient>) -> Self {
        self.clients.insert(llm_type, client);
        self
    }

    /// One client serving every channel (tests, single-model deployments).
    pub fn single(client: Arc<dyn LlmClient>) -> Self {
        let mut gateway = Self::new();
        for llm_type in LlmType::ALL {
            gateway.clients.insert(llm_type, Arc::clone(&client));
        }
        gateway
    }

    /// Builds OpenAI-compatible clients from configured model names.
    /// `OPENAI_API_KEY` / `OPENAI_BASE_URL` come from the environment.
    pub fn from_settings(settings: &env_config::LlmSettings) -> Result<Self, WorkflowError> {
        let mut gateway = Self::new();
        for llm_type in LlmType::ALL {
            let model = settings.models.get(llm_type.as_str()).ok_or_else(|| {
                WorkflowError::Internal(format!(
                    "no model configured for llm type {}",
                    llm_type.as_str()
                ))
            })?;
            gateway
                .clients
                .insert(llm_type, Arc::new(ChatOpenAI::new(model.clone())));
        }
        Ok(gateway)
    }

    pub fn get(&self, llm_type: LlmType) -> Result<Arc<dyn LlmClient>, WorkflowError> {
        self.clients.get(&llm_type).cloned().ok_or_else(|| {
            WorkflowError::Internal(format!(
                "no llm client registered for type {}",
                llm_type.as_str()
            ))
        })
    }
}

impl Default for LlmGateway {
    fn default() -> Self {
        Self::new()
    }
}
