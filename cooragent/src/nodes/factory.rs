//! Factory: manufactures a new agent from a structured LM specification and
//! registers it for reuse.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use stream_event::{NewAgentPayload, WorkflowEvent};

use crate::agent::{AgentDefinition, AgentRegistry, RegistryError};
use crate::error::WorkflowError;
use crate::graph::{Command, NodeContext, StatePatch, WorkflowNode, NODE_FACTORY, NODE_PUBLISHER};
use crate::llm::{with_retry, LlmGateway, LlmType};
use crate::message::Message;
use crate::prompts::PromptLibrary;
use crate::state::SessionState;
use crate::tools::ToolSpec;

use super::response_message;

#[derive(Debug, Deserialize)]
struct ToolRef {
    name: String,
}

/// Shape the LM must return; missing required fields are a protocol error.
#[derive(Debug, Deserialize)]
struct AgentBlueprint {
    agent_name: String,
    agent_description: String,
    llm_type: LlmType,
    #[serde(default)]
    selected_tools: Vec<ToolRef>,
    prompt: String,
}

fn blueprint_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "agent_name": {"type": "string"},
            "agent_description": {"type": "string"},
            "llm_type": {"type": "string", "enum": ["basic", "reasoning", "vision", "code"]},
            "selected_tools": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"],
                }
            },
            "prompt": {"type": "string"},
        },
        "required": ["agent_name", "agent_description", "llm_type", "selected_tools", "prompt"],
    })
}

pub struct FactoryNode {
    llm: Arc<LlmGateway>,
    prompts: Arc<PromptLibrary>,
    agents: Arc<AgentRegistry>,
}

impl FactoryNode {
    pub fn new(
        llm: Arc<LlmGateway>,
        prompts: Arc<PromptLibrary>,
        agents: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            llm,
            prompts,
            agents,
        }
    }
}

#[async_trait]
impl WorkflowNode for FactoryNode {
    fn name(&self) -> &'static str {
        NODE_FACTORY
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &NodeContext,
    ) -> Result<Command, WorkflowError> {
        ctx.check_cancelled()?;
        let messages = self.prompts.apply(NODE_FACTORY, state)?;
        let client = self.llm.get(LlmType::Basic)?;
        let schema = blueprint_schema();
        let value = with_retry(|| client.invoke_structured(&messages, &schema)).await?;

        let blueprint: AgentBlueprint = serde_json::from_value(value).map_err(|e| {
            WorkflowError::Protocol(format!("agent specification is missing required fields: {e}"))
        })?;

        let def = AgentDefinition {
            user_id: state.user_id.clone(),
            agent_name: blueprint.agent_name.clone(),
            nick_name: blueprint.agent_name.clone(),
            description: blueprint.agent_description,
            llm_type: blueprint.llm_type,
            // name references only; create() snapshots the registry schemas
            selected_tools: blueprint
                .selected_tools
                .into_iter()
                .map(|t| ToolSpec {
                    name: t.name,
                    description: String::new(),
                    input_schema: json!({}),
                })
                .collect(),
            prompt: blueprint.prompt,
        };

        match self.agents.create(def) {
            Ok(created) => {
                tracing::info!(agent = %created.agent_name, "factory created agent");
                let definition = serde_json::to_value(created.as_ref())
                    .map_err(|e| WorkflowError::Internal(e.to_string()))?;
                ctx.sink
                    .emit(WorkflowEvent::NewAgentCreated {
                        agent_name: created.agent_name.clone(),
                        data: NewAgentPayload {
                            agent_name: created.agent_name.clone(),
                            definition,
                        },
                    })
                    .await?;
                let patch = StatePatch {
                    messages: vec![Message::from_agent(
                        NODE_FACTORY,
                        response_message(
                            NODE_FACTORY,
                            &format!("New agent {} created.", created.agent_name),
                        ),
                    )],
                    new_team_member: Some(created.agent_name.clone()),
                    ..Default::default()
                };
                Ok(Command::to(NODE_PUBLISHER).with_patch(patch))
            }
            Err(RegistryError::AlreadyExists(name)) => {
                // the publisher will choose again with this note in context
                let patch = StatePatch {
                    messages: vec![Message::from_agent(
                        NODE_FACTORY,
                        response_message(
                            NODE_FACTORY,
                            &format!(
                                "Agent {name} already exists; select it or request a different name."
                            ),
                        ),
                    )],
                    ..Default::default()
                };
                Ok(Command::to(NODE_PUBLISHER).with_patch(patch))
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EventSink, Goto};
    use crate::llm::{MockLlm, MockReply};
    use crate::tools::{default_tool_specs, ToolRegistry};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn registry() -> (tempfile::TempDir, Arc<AgentRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let mut tools = ToolRegistry::new();
        for spec in default_tool_specs() {
            tools.register_spec(spec);
        }
        let registry = AgentRegistry::open(dir.path(), Arc::new(tools), "admin").unwrap();
        (dir, Arc::new(registry))
    }

    fn blueprint_reply() -> serde_json::Value {
        json!({
            "agent_name": "stock_analyzer",
            "agent_description": "Analyzes stocks from web data",
            "llm_type": "basic",
            "selected_tools": [{"name": "tavily_tool"}],
            "prompt": "Analyze the requested stock using search results.",
        })
    }

    fn ctx() -> (NodeContext, mpsc::Receiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        (
            NodeContext {
                sink: EventSink::new(tx, cancel.clone()),
                cancel,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn creates_agent_emits_event_and_extends_team() {
        let (_dir, agents) = registry();
        let node = FactoryNode::new(
            Arc::new(LlmGateway::single(Arc::new(MockLlm::new(vec![
                MockReply::structured(blueprint_reply()),
            ])))),
            Arc::new(PromptLibrary::embedded()),
            Arc::clone(&agents),
        );
        let (ctx, mut rx) = ctx();
        let mut state = SessionState::new("u2", "wf-1");
        state.next = NODE_FACTORY.into();

        let cmd = node.run(&state, &ctx).await.unwrap();
        assert_eq!(cmd.goto, Goto::Node(NODE_PUBLISHER.into()));
        assert_eq!(cmd.patch.new_team_member.as_deref(), Some("stock_analyzer"));

        let ev = rx.try_recv().unwrap();
        match ev {
            WorkflowEvent::NewAgentCreated { data, .. } => {
                assert_eq!(data.agent_name, "stock_analyzer");
                // snapshot happened: the persisted definition has the real schema
                assert_eq!(
                    data.definition["selected_tools"][0]["input_schema"]["required"][0],
                    "query"
                );
            }
            other => panic!("expected new_agent_created, got {}", other.tag()),
        }
        assert!(agents.resolve("stock_analyzer").is_some());
    }

    #[tokio::test]
    async fn duplicate_name_returns_to_publisher_with_note() {
        let (_dir, agents) = registry();
        let node = FactoryNode::new(
            Arc::new(LlmGateway::single(Arc::new(MockLlm::new(vec![
                MockReply::structured(json!({
                    "agent_name": "researcher",
                    "agent_description": "duplicate of a default",
                    "llm_type": "basic",
                    "selected_tools": [],
                    "prompt": "irrelevant",
                })),
            ])))),
            Arc::new(PromptLibrary::embedded()),
            agents,
        );
        let (ctx, mut rx) = ctx();
        let state = SessionState::new("u2", "wf-1");

        let cmd = node.run(&state, &ctx).await.unwrap();
        assert_eq!(cmd.goto, Goto::Node(NODE_PUBLISHER.into()));
        assert!(cmd.patch.new_team_member.is_none());
        assert!(cmd.patch.messages[0].content.contains("already exists"));
        assert!(rx.try_recv().is_err(), "no event on duplicate");
    }

    #[tokio::test]
    async fn missing_fields_are_a_protocol_error() {
        let (_dir, agents) = registry();
        let node = FactoryNode::new(
            Arc::new(LlmGateway::single(Arc::new(MockLlm::new(vec![
                MockReply::structured(json!({"agent_name": "x"})),
            ])))),
            Arc::new(PromptLibrary::embedded()),
            agents,
        );
        let (ctx, _rx) = ctx();
        let state = SessionState::new("u2", "wf-1");
        let err = node.run(&state, &ctx).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Protocol(_)));
    }
}
