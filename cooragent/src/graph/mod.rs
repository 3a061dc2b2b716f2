//! Orchestration graph: node trait, commands, and the run controller.
//!
//! A node is one step: `(state) -> Command`, where a [`Command`] is a state
//! patch plus where to go next. The controller applies patches (message
//! appends only), brackets every node execution with `start_of_agent` /
//! `end_of_agent` events, and checks cancellation at each suspension point.
//! Cycles (publisher ↔ proxy, publisher ↔ factory) terminate via `FINISH` or
//! the node-visit cap.

mod controller;
mod events;

pub use controller::run_workflow;
pub use events::{chunk_text, EventSink, CHUNK_SIZE};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowError;
use crate::message::Message;
use crate::state::SessionState;

/// Sentinel node names wired into the graph.
pub const NODE_COORDINATOR: &str = "coordinator";
pub const NODE_PLANNER: &str = "planner";
pub const NODE_PUBLISHER: &str = "publisher";
pub const NODE_FACTORY: &str = "agent_factory";
pub const NODE_PROXY: &str = "agent_proxy";

/// Where the run goes after a node completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Goto {
    Node(String),
    End,
}

/// Append-only state update produced by one node.
#[derive(Debug, Default)]
pub struct StatePatch {
    /// Appended to `state.messages`; nothing is ever reordered or removed.
    pub messages: Vec<Message>,
    pub full_plan: Option<String>,
    pub next: Option<String>,
    pub processing_agent_name: Option<String>,
    /// Factory output; appended to `team_members` if not already present.
    pub new_team_member: Option<String>,
}

impl StatePatch {
    pub fn apply(self, state: &mut SessionState) {
        state.messages.extend(self.messages);
        if let Some(plan) = self.full_plan {
            state.full_plan = plan;
        }
        if let Some(next) = self.next {
            state.next = next;
        }
        if let Some(name) = self.processing_agent_name {
            state.processing_agent_name = name;
        }
        if let Some(member) = self.new_team_member {
            if !state.team_members.contains(&member) {
                state.team_members.push(member);
            }
        }
    }
}

/// A node's result: patch plus routing.
#[derive(Debug)]
pub struct Command {
    pub patch: StatePatch,
    pub goto: Goto,
}

impl Command {
    pub fn to(node: impl Into<String>) -> Self {
        Self {
            patch: StatePatch::default(),
            goto: Goto::Node(node.into()),
        }
    }

    pub fn end() -> Self {
        Self {
            patch: StatePatch::default(),
            goto: Goto::End,
        }
    }

    pub fn with_patch(mut self, patch: StatePatch) -> Self {
        self.patch = patch;
        self
    }
}

/// Run-scoped context handed to a node: the event sink and the run's
/// cancellation token.
#[derive(Clone)]
pub struct NodeContext {
    pub sink: EventSink,
    pub cancel: CancellationToken,
}

impl NodeContext {
    pub fn check_cancelled(&self) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Tool context with a token derived from the run's token.
    pub fn tool_context(&self, user_id: &str) -> crate::tools::ToolContext {
        crate::tools::ToolContext {
            user_id: Some(user_id.to_string()),
            cancel: self.cancel.child_token(),
        }
    }
}

/// One step in the orchestration graph.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    /// Node id; doubles as the `agent_name` on bracketing events.
    fn name(&self) -> &'static str;

    async fn run(&self, state: &SessionState, ctx: &NodeContext)
        -> Result<Command, WorkflowError>;
}

#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("graph has no start node")]
    MissingStart,
    #[error("start node {0} is not registered")]
    StartNotFound(String),
}

/// Graph under construction: nodes plus a start node. Edges are dynamic (each
/// node names its successor), so compile only checks the entry point.
#[derive(Default)]
pub struct WorkflowGraph {
    nodes: HashMap<String, Arc<dyn WorkflowNode>>,
    start: Option<String>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; replaces any node with the same name.
    pub fn add_node(&mut self, node: Arc<dyn WorkflowNode>) -> &mut Self {
        self.nodes.insert(node.name().to_string(), node);
        self
    }

    pub fn set_start(&mut self, name: impl Into<String>) -> &mut Self {
        self.start = Some(name.into());
        self
    }

    pub fn compile(self) -> Result<CompiledWorkflow, CompilationError> {
        let start = self.start.ok_or(CompilationError::MissingStart)?;
        if !self.nodes.contains_key(&start) {
            return Err(CompilationError::StartNotFound(start));
        }
        Ok(CompiledWorkflow {
            nodes: self.nodes,
            start,
        })
    }
}

/// Immutable, executable graph. Driven by [`run_workflow`].
pub struct CompiledWorkflow {
    pub(crate) nodes: HashMap<String, Arc<dyn WorkflowNode>>,
    pub(crate) start: String,
}
