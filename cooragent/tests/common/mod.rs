//! Shared builders for integration tests: a runnable echo tool and a service
//! wired to a scripted LM.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use cooragent::{
    default_tool_specs, AgentDefinition, AgentRegistry, LlmClient, LlmGateway, LlmType,
    PromptLibrary, Tool, ToolContext, ToolError, ToolRegistry, ToolSpec, WorkflowService,
};
use env_config::WorkflowSettings;

/// Minimal runnable tool: echoes its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo_tool"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "echo_tool".into(),
            description: "Echo the given text".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok(args["text"].as_str().unwrap_or_default().to_string())
    }
}

/// Service over a fresh agent store seeded with the default roster, the echo
/// tool registered as runnable, and every LM channel served by `llm`.
pub fn build_service(llm: Arc<dyn LlmClient>, store_dir: &Path) -> WorkflowService {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(EchoTool));
    for spec in default_tool_specs() {
        tools.register_spec(spec);
    }
    let tools = Arc::new(tools);
    let agents =
        Arc::new(AgentRegistry::open(store_dir, Arc::clone(&tools), "admin").unwrap());
    WorkflowService::new(
        Arc::new(LlmGateway::single(llm)),
        agents,
        tools,
        Arc::new(PromptLibrary::embedded()),
        WorkflowSettings::default(),
    )
}

/// A user-owned agent bound to the echo tool, created through the registry so
/// its schema snapshot is captured.
pub fn create_echo_agent(registry: &AgentRegistry, owner: &str, name: &str) {
    registry
        .create(AgentDefinition {
            user_id: owner.into(),
            agent_name: name.into(),
            nick_name: name.into(),
            description: "echoes text back".into(),
            llm_type: LlmType::Basic,
            selected_tools: vec![EchoTool.spec()],
            prompt: "Echo what you are asked. Plan:\n<<FULL_PLAN>>".into(),
        })
        .unwrap();
}
