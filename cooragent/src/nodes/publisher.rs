//! Publisher: routes to the next agent, the factory, or FINISH.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::WorkflowError;
use crate::graph::{
    Command, NodeContext, StatePatch, WorkflowNode, NODE_FACTORY, NODE_PROXY, NODE_PUBLISHER,
};
use crate::llm::{with_retry, LlmGateway, LlmType};
use crate::prompts::PromptLibrary;
use crate::state::SessionState;

const FINISH: &str = "FINISH";

fn router_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "next": {"type": "string", "description": "Name of the next agent, agent_factory, or FINISH"}
        },
        "required": ["next"],
    })
}

pub struct PublisherNode {
    llm: Arc<LlmGateway>,
    prompts: Arc<PromptLibrary>,
}

impl PublisherNode {
    pub fn new(llm: Arc<LlmGateway>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl WorkflowNode for PublisherNode {
    fn name(&self) -> &'static str {
        NODE_PUBLISHER
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &NodeContext,
    ) -> Result<Command, WorkflowError> {
        ctx.check_cancelled()?;
        let messages = self.prompts.apply(NODE_PUBLISHER, state)?;
        let client = self.llm.get(LlmType::Basic)?;
        let schema = router_schema();
        let value = with_retry(|| client.invoke_structured(&messages, &schema)).await?;

        let next = value
            .get("next")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WorkflowError::Protocol("router output is missing `next`".into()))?;

        match next {
            FINISH => {
                tracing::info!(workflow_id = %state.workflow_id, "publisher finished the run");
                Ok(Command::end())
            }
            NODE_FACTORY => Ok(Command::to(NODE_FACTORY).with_patch(StatePatch {
                next: Some(NODE_FACTORY.to_string()),
                ..Default::default()
            })),
            agent if state.team_members.iter().any(|m| m == agent) => {
                tracing::info!(agent, "publisher delegating");
                Ok(Command::to(NODE_PROXY).with_patch(StatePatch {
                    next: Some(agent.to_string()),
                    ..Default::default()
                }))
            }
            other => Err(WorkflowError::Protocol(format!(
                "publisher selected {other}, which is not in the team roster"
            ))),
        }
    }
}
