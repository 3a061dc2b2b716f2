//! OpenAI-compatible Chat Completions client implementing [`LlmClient`].
//!
//! API key comes from `OPENAI_API_KEY` (or an explicit [`OpenAIConfig`]);
//! `OPENAI_BASE_URL` selects a compatible endpoint. Streaming uses the
//! chat-completions stream API and forwards content deltas through the
//! caller's channel; tool calls are accumulated across chunks by index.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::debug;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject, ResponseFormat,
    },
    Client,
};

use stream_event::MessageDelta;

use crate::error::WorkflowError;
use crate::message::{Message, Role};
use crate::tools::ToolSpec;

use super::{strip_json_fence, LlmClient, LlmResponse, ToolCall};

pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    /// Default config: API key and base URL from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request_messages(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(m.content.as_str()),
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(m.content.as_str()),
                ),
                Role::Assistant => {
                    ChatCompletionRequestMessage::Assistant(m.content.as_str().into())
                }
            })
            .collect()
    }

    fn request_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTools> {
        tools
            .iter()
            .map(|t| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(t.input_schema.clone()),
                        ..Default::default()
                    },
                })
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        stream: bool,
        json_mode: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, WorkflowError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::request_messages(messages));
        if !tools.is_empty() {
            args.tools(Self::request_tools(tools));
        }
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        if stream {
            args.stream(true);
        }
        if json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        args.build()
            .map_err(|e| WorkflowError::Llm(format!("request build failed: {e}")))
    }

    /// Tool-call arguments arrive as a JSON string; a malformed payload is
    /// kept verbatim so schema validation reports it downstream.
    fn parse_arguments(raw: String) -> serde_json::Value {
        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse, WorkflowError> {
        let request = self.build_request(messages, tools, false, false)?;
        debug!(model = %self.model, message_count = messages.len(), tools_count = tools.len(), "chat create");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| WorkflowError::Llm(format!("chat completion failed: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::Llm("no choices in completion".into()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| match tc {
                ChatCompletionMessageToolCalls::Function(f) => Some(ToolCall {
                    id: f.id,
                    name: f.function.name,
                    arguments: Self::parse_arguments(f.function.arguments),
                }),
                _ => None,
            })
            .collect();

        Ok(LlmResponse {
            content,
            tool_calls,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        delta_tx: Option<mpsc::Sender<MessageDelta>>,
    ) -> Result<LlmResponse, WorkflowError> {
        let Some(delta_tx) = delta_tx else {
            return self.invoke(messages, tools).await;
        };

        let request = self.build_request(messages, tools, true, false)?;
        debug!(model = %self.model, message_count = messages.len(), "chat create_stream");

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| WorkflowError::Llm(format!("chat stream failed: {e}")))?;

        let mut content = String::new();
        // index -> (id, name, arguments) accumulated across chunks
        let mut calls: std::collections::BTreeMap<u32, (String, String, String)> =
            std::collections::BTreeMap::new();

        while let Some(result) = stream.next().await {
            let chunk =
                result.map_err(|e| WorkflowError::Llm(format!("chat stream failed: {e}")))?;
            for choice in chunk.choices {
                if let Some(ref text) = choice.delta.content {
                    if !text.is_empty() {
                        content.push_str(text);
                        let _ = delta_tx.send(MessageDelta::content(text.clone())).await;
                    }
                }
                if let Some(ref deltas) = choice.delta.tool_calls {
                    for tc in deltas {
                        let entry = calls.entry(tc.index).or_default();
                        if let Some(ref id) = tc.id {
                            if !id.is_empty() {
                                entry.0 = id.clone();
                            }
                        }
                        if let Some(ref func) = tc.function {
                            if let Some(ref name) = func.name {
                                entry.1.push_str(name);
                            }
                            if let Some(ref args) = func.arguments {
                                entry.2.push_str(args);
                            }
                        }
                    }
                }
            }
        }

        let tool_calls = calls
            .into_values()
            .map(|(id, name, arguments)| ToolCall {
                id,
                name,
                arguments: Self::parse_arguments(arguments),
            })
            .collect();

        Ok(LlmResponse {
            content,
            tool_calls,
        })
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, WorkflowError> {
        let request = self.build_request(messages, &[], false, true)?;
        debug!(model = %self.model, "chat create (json mode)");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| WorkflowError::Llm(format!("chat completion failed: {e}")))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| WorkflowError::Llm("no content in structured completion".into()))?;

        serde_json::from_str(strip_json_fence(&content)).map_err(|e| {
            WorkflowError::Protocol(format!("structured output is not valid JSON: {e}"))
        })
    }
}
