//! Planner: produces the JSON plan, optionally preceded by a search preflight.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::graph::{Command, NodeContext, StatePatch, WorkflowNode, NODE_PLANNER, NODE_PUBLISHER};
use crate::llm::{strip_json_fence, LlmClient, LlmGateway, LlmType};
use crate::message::Message;
use crate::prompts::PromptLibrary;
use crate::state::SessionState;
use crate::tools::{ToolRegistry, TOOL_TAVILY};

const SEARCH_RESULTS_HEADER: &str = "# Relative Search Results";

pub struct PlannerNode {
    llm: Arc<LlmGateway>,
    prompts: Arc<PromptLibrary>,
    tools: Arc<ToolRegistry>,
}

impl PlannerNode {
    pub fn new(
        llm: Arc<LlmGateway>,
        prompts: Arc<PromptLibrary>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            llm,
            prompts,
            tools,
        }
    }

    /// One streaming attempt: forwards LM deltas to the stream as `message`
    /// events under a fresh message id, returns the accumulated text. The
    /// forwarder is joined before returning so the node's events all precede
    /// its `end_of_agent`.
    async fn stream_once(
        &self,
        client: &Arc<dyn LlmClient>,
        messages: &[Message],
        ctx: &NodeContext,
    ) -> Result<String, WorkflowError> {
        let message_id = Uuid::new_v4().to_string();
        let (tx, mut rx) = mpsc::channel(16);
        let sink = ctx.sink.clone();
        let forward = tokio::spawn(async move {
            while let Some(delta) = rx.recv().await {
                if sink
                    .message_delta(NODE_PLANNER, &message_id, delta)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        let result = client.invoke_stream(messages, &[], Some(tx)).await;
        let _ = forward.await;
        Ok(result?.content)
    }
}

#[async_trait]
impl WorkflowNode for PlannerNode {
    fn name(&self) -> &'static str {
        NODE_PLANNER
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &NodeContext,
    ) -> Result<Command, WorkflowError> {
        ctx.check_cancelled()?;
        let mut messages = self.prompts.apply(NODE_PLANNER, state)?;

        if state.search_before_planning {
            let query = state.last_user_content().unwrap_or_default().to_string();
            let results = self
                .tools
                .call(
                    TOOL_TAVILY,
                    json!({ "query": query }),
                    &ctx.tool_context(&state.user_id),
                )
                .await
                .map_err(WorkflowError::from)?;
            if let Some(last) = messages.last_mut() {
                last.content
                    .push_str(&format!("\n\n{SEARCH_RESULTS_HEADER}\n\n{results}"));
            }
        }

        let llm_type = if state.deep_thinking_mode {
            LlmType::Reasoning
        } else {
            LlmType::Basic
        };
        let client = self.llm.get(llm_type)?;

        // streamed, so the retry re-streams instead of using with_retry
        let content = match self.stream_once(&client, &messages, ctx).await {
            Err(WorkflowError::Llm(message)) => {
                tracing::warn!(error = %message, "planner stream failed, retrying once");
                self.stream_once(&client, &messages, ctx).await?
            }
            other => other?,
        };
        ctx.check_cancelled()?;

        let plan = strip_json_fence(&content).to_string();
        serde_json::from_str::<serde_json::Value>(&plan).map_err(|_| {
            WorkflowError::Validation("planner output is not valid JSON".into())
        })?;

        let patch = StatePatch {
            messages: vec![Message::from_agent(NODE_PLANNER, plan.clone())],
            full_plan: Some(plan),
            ..Default::default()
        };
        Ok(Command::to(NODE_PUBLISHER).with_patch(patch))
    }
}
