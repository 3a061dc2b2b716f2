//! Workflow service: request validation, team assembly, and run lifecycle.
//!
//! One call to [`WorkflowService::run`] spawns the graph on its own task and
//! returns a [`WorkflowStream`] of events. Dropping the stream cancels the
//! run; back-pressure is the event channel's capacity.

mod session;

pub use session::SessionCache;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use env_config::WorkflowSettings;
use stream_event::WorkflowEvent;

use crate::agent::AgentRegistry;
use crate::error::WorkflowError;
use crate::graph::{
    run_workflow, CompiledWorkflow, EventSink, WorkflowGraph, NODE_COORDINATOR, NODE_FACTORY,
};
use crate::llm::LlmGateway;
use crate::message::Message;
use crate::nodes::{CoordinatorNode, FactoryNode, PlannerNode, ProxyNode, PublisherNode};
use crate::prompts::PromptLibrary;
use crate::state::SessionState;
use crate::tools::ToolRegistry;

/// Description of the built-in roster for the publisher prompt. Non-share
/// agents on the roster get appended lines; share-owned ones stay roster-only.
const DEFAULT_TEAM_MEMBERS_DESCRIPTION: &str = "\
- **`researcher`**: Uses search engines and web crawlers to gather information from the internet. Outputs a Markdown report summarizing findings. Researcher can not do math or programming.
- **`coder`**: Executes Python or Bash commands, performs mathematical calculations, and outputs a Markdown report. Must be used for all mathematical computations.
- **`browser`**: Directly interacts with web pages, performing complex operations and interactions. You can also leverage `browser` to perform in-domain search, like Facebook, Instagram, Github, etc.
- **`reporter`**: Write a professional report based on the result of each step. Please note that this agent is unable to perform any code or command-line operations.
- **`agent_factory`**: Create a new agent based on the user's requirement.
";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Zh,
    Jp,
    Es,
    De,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    AgentWorkflow,
    AgentFactory,
}

/// One workflow request as received on `/v1/workflow` or from the CLI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRequest {
    pub user_id: String,
    #[serde(default)]
    pub lang: Lang,
    pub task_type: TaskType,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub deep_thinking_mode: bool,
    #[serde(default)]
    pub search_before_planning: bool,
    #[serde(default)]
    pub coop_agents: Vec<String>,
}

/// Consumer end of one run. Dropping it cancels the run.
#[derive(Debug)]
pub struct WorkflowStream {
    rx: mpsc::Receiver<WorkflowEvent>,
    cancel: CancellationToken,
}

impl WorkflowStream {
    pub async fn next(&mut self) -> Option<WorkflowEvent> {
        self.rx.recv().await
    }

    /// Token shared with the run; external cancellation (timeout, shutdown)
    /// goes through here.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for WorkflowStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl futures_util::Stream for WorkflowStream {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub struct WorkflowService {
    llm: Arc<LlmGateway>,
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptLibrary>,
    sessions: SessionCache,
    settings: WorkflowSettings,
}

impl WorkflowService {
    pub fn new(
        llm: Arc<LlmGateway>,
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        prompts: Arc<PromptLibrary>,
        settings: WorkflowSettings,
    ) -> Self {
        let sessions = SessionCache::new(settings.session_history_turns);
        Self {
            llm,
            agents,
            tools,
            prompts,
            sessions,
            settings,
        }
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Roster and description for one run:
    /// `agent_factory ∪ share-owned ∪ owned-by-user ∪ coop grants`.
    fn assemble_team(&self, user_id: &str, coop_agents: &[String]) -> (Vec<String>, String) {
        let mut team = vec![NODE_FACTORY.to_string()];
        let mut description = DEFAULT_TEAM_MEMBERS_DESCRIPTION.to_string();
        for agent in self.agents.all() {
            let joined = if agent.is_shared() {
                true
            } else {
                agent.user_id == user_id
                    || (self.settings.coop_grant_enabled
                        && coop_agents.iter().any(|n| *n == agent.agent_name))
            };
            if !joined || team.contains(&agent.agent_name) {
                continue;
            }
            team.push(agent.agent_name.clone());
            if !agent.is_shared() {
                description.push_str(&format!(
                    "\n- **`{}`**: {}",
                    agent.agent_name, agent.description
                ));
            }
        }
        (team, description)
    }

    fn build_graph(&self, task_type: TaskType) -> Result<CompiledWorkflow, WorkflowError> {
        let mut graph = WorkflowGraph::new();
        graph
            .add_node(Arc::new(CoordinatorNode::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.prompts),
            )))
            .add_node(Arc::new(PlannerNode::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.prompts),
                Arc::clone(&self.tools),
            )))
            .add_node(Arc::new(PublisherNode::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.prompts),
            )))
            .add_node(Arc::new(FactoryNode::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.prompts),
                Arc::clone(&self.agents),
            )))
            .set_start(NODE_COORDINATOR);
        if task_type == TaskType::AgentWorkflow {
            graph.add_node(Arc::new(ProxyNode::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.agents),
                Arc::clone(&self.tools),
            )));
        }
        graph
            .compile()
            .map_err(|e| WorkflowError::Internal(e.to_string()))
    }

    /// Validates the request, assembles the team, and spawns the run.
    pub fn run(&self, request: AgentRequest) -> Result<WorkflowStream, WorkflowError> {
        if request.messages.is_empty() {
            return Err(WorkflowError::Validation("input could not be empty".into()));
        }

        let workflow_id = Uuid::new_v4().to_string();
        let input = self
            .sessions
            .record_and_window(&request.user_id, &request.messages);
        let (team_members, team_members_description) =
            self.assemble_team(&request.user_id, &request.coop_agents);

        let mut state = SessionState::new(&request.user_id, &workflow_id);
        state.messages = input;
        state.team_members = team_members;
        state.team_members_description = team_members_description;
        state.deep_thinking_mode = request.deep_thinking_mode;
        state.search_before_planning = request.search_before_planning;

        tracing::info!(
            workflow_id = %workflow_id,
            user_id = %request.user_id,
            task_type = ?request.task_type,
            debug = request.debug,
            team_size = state.team_members.len(),
            "starting workflow"
        );

        let graph = self.build_graph(request.task_type)?;
        let (tx, rx) = mpsc::channel(self.settings.event_buffer.max(1));
        let cancel = CancellationToken::new();
        let sink = EventSink::new(tx, cancel.clone());
        let run_cancel = cancel.clone();
        let max_node_visits = self.settings.max_node_visits;
        tokio::spawn(async move {
            run_workflow(&graph, state, sink, run_cancel, max_node_visits).await;
        });

        Ok(WorkflowStream { rx, cancel })
    }
}
