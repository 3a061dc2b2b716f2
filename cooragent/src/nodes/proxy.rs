//! Proxy: runs the selected agent's LM-plus-tools loop.
//!
//! The loop alternates LM generation (constrained by the agent's bound prompt
//! and tool schemas) with tool execution. Inputs are validated against the
//! agent's recorded schema snapshots; a failing call becomes a message in the
//! loop rather than a run error, so the agent can self-correct. The loop ends
//! on the first non-tool reply.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::agent::{AgentDefinition, AgentRegistry};
use crate::error::WorkflowError;
use crate::graph::{Command, NodeContext, StatePatch, WorkflowNode, NODE_PROXY, NODE_PUBLISHER};
use crate::llm::{with_retry, LlmGateway, ToolCall};
use crate::message::Message;
use crate::prompts;
use crate::state::SessionState;
use crate::tools::{validate_args, ToolContext, ToolError, ToolRegistry};

use super::response_message;

/// Bound on think/act rounds inside one dispatch; a loop that never produces
/// a plain reply is broken.
const MAX_AGENT_TURNS: usize = 20;

pub struct ProxyNode {
    llm: Arc<LlmGateway>,
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
}

impl ProxyNode {
    pub fn new(
        llm: Arc<LlmGateway>,
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            llm,
            agents,
            tools,
        }
    }

    /// Validates against the agent's snapshot, then invokes the live tool.
    async fn execute_tool(
        &self,
        agent: &AgentDefinition,
        call: &ToolCall,
        tool_ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let snapshot = agent
            .selected_tools
            .iter()
            .find(|t| t.name == call.name)
            .ok_or_else(|| ToolError::InvalidInput {
                tool: call.name.clone(),
                message: format!("tool is not bound to agent {}", agent.agent_name),
            })?;
        validate_args(&call.name, &snapshot.input_schema, &call.arguments)?;
        self.tools
            .invoke_unvalidated(&call.name, call.arguments.clone(), tool_ctx)
            .await
    }
}

#[async_trait]
impl WorkflowNode for ProxyNode {
    fn name(&self) -> &'static str {
        NODE_PROXY
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &NodeContext,
    ) -> Result<Command, WorkflowError> {
        ctx.check_cancelled()?;
        let agent_name = state.next.clone();
        let agent = self
            .agents
            .resolve(&agent_name)
            .ok_or_else(|| WorkflowError::NotFound(format!("agent {agent_name}")))?;
        let client = self.llm.get(agent.llm_type)?;
        let mut messages = prompts::bind_text(&agent.prompt, state)?;
        let specs = agent.selected_tools.clone();
        let tool_ctx = ctx.tool_context(&state.user_id);

        let mut turns = 0;
        let reply = loop {
            turns += 1;
            if turns > MAX_AGENT_TURNS {
                return Err(WorkflowError::Internal(format!(
                    "agent {agent_name} exceeded {MAX_AGENT_TURNS} tool rounds"
                )));
            }
            ctx.check_cancelled()?;

            let response = with_retry(|| client.invoke(&messages, &specs)).await?;
            if response.tool_calls.is_empty() {
                break response.content;
            }
            if !response.content.is_empty() {
                messages.push(Message::assistant(response.content.clone()));
            }

            for call in &response.tool_calls {
                let call_id = if call.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    call.id.clone()
                };
                ctx.sink
                    .tool_call(&agent_name, &call_id, &call.name, call.arguments.clone())
                    .await?;
                match self.execute_tool(&agent, call, &tool_ctx).await {
                    Ok(result) => {
                        ctx.sink
                            .tool_call_result(&agent_name, &call_id, &call.name, &result)
                            .await?;
                        messages.push(Message::user(format!(
                            "Tool `{}` returned:\n{result}",
                            call.name
                        )));
                    }
                    Err(ToolError::Cancelled) => return Err(WorkflowError::Cancelled),
                    Err(e) => {
                        // structured failure goes back into the loop
                        let failure = e.to_string();
                        tracing::warn!(agent = %agent_name, tool = %call.name, error = %failure, "tool call failed");
                        ctx.sink
                            .tool_call_result(&agent_name, &call_id, &call.name, &failure)
                            .await?;
                        messages.push(Message::user(format!(
                            "Tool `{}` failed: {failure}\nFix the input and retry, or answer without it.",
                            call.name
                        )));
                    }
                }
            }
        };

        ctx.check_cancelled()?;
        ctx.sink.stream_text(&agent_name, &reply).await?;

        let patch = StatePatch {
            messages: vec![Message::from_agent(
                &agent_name,
                response_message(&agent_name, &reply),
            )],
            processing_agent_name: Some(agent_name),
            ..Default::default()
        };
        Ok(Command::to(NODE_PUBLISHER).with_patch(patch))
    }
}
