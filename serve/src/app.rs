//! App state and router.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use cooragent::{
    default_tool_specs, seed_tool_records, AgentRegistry, LlmGateway, PromptLibrary, TavilySearch,
    ToolRegistry, WorkflowService,
};

use super::routes;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
}

impl AppState {
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self { service }
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        self.service.agents()
    }
}

/// Wires the production service: default tool specs (search runnable when
/// `TAVILY_API_KEY` is set), agent store from settings, OpenAI-compatible LM
/// gateway, prompt library with on-disk overrides.
pub fn build_state(
    settings: &config::Settings,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let mut tools = ToolRegistry::new();
    if let Some(search) = TavilySearch::from_env() {
        tools.register(Arc::new(search));
    }
    for spec in default_tool_specs() {
        tools.register_spec(spec);
    }
    let tools = Arc::new(tools);
    seed_tool_records(&settings.store.tools_dir())?;

    let agents = Arc::new(AgentRegistry::open(
        settings.store.agents_dir(),
        Arc::clone(&tools),
        settings.workflow.admin_user.clone(),
    )?);
    let llm = Arc::new(LlmGateway::from_settings(&settings.llm)?);
    let prompts = Arc::new(PromptLibrary::with_dir(settings.store.prompts_dir()));

    let service = Arc::new(WorkflowService::new(
        llm,
        agents,
        tools,
        prompts,
        settings.workflow.clone(),
    ));
    Ok(AppState::new(service))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/workflow", post(routes::workflow))
        .route("/v1/list_agents", post(routes::list_agents))
        .route("/v1/list_default_agents", get(routes::list_default_agents))
        .route("/v1/list_default_tools", get(routes::list_default_tools))
        .route("/v1/edit_agent", post(routes::edit_agent))
        .route("/v1/remove_agent", post(routes::remove_agent))
        .with_state(state)
}
