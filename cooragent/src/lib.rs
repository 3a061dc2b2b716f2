//! # CoorAgent
//!
//! A multi-agent orchestration runtime. A user submits a natural-language
//! task; the runtime plans it, selects or manufactures specialized worker
//! agents from a persisted registry, dispatches them in sequence, streams
//! incremental progress to the caller, and persists newly created agents for
//! reuse.
//!
//! ## Design principles
//!
//! - **Explicit state machine**: each node is one step, `(state) -> Command`,
//!   where a [`Command`] is a state patch plus the next node. The controller
//!   owns the event channel and applies patches; cancellation is one check
//!   per suspension point.
//! - **Flat registry, visibility on read**: agents are indexed by globally
//!   unique `agent_name`; per-user visibility filters apply when listing and
//!   assembling teams.
//! - **Snapshots over locks**: a run resolves its agent once and keeps that
//!   `Arc` snapshot; registry edits swap the index entry without touching
//!   in-flight runs.
//! - **Back-pressured streaming**: one bounded SPSC channel per run; a slow
//!   consumer blocks the producer, a dropped consumer cancels the run.
//!
//! ## Main modules
//!
//! - [`graph`]: [`WorkflowNode`], [`Command`], [`WorkflowGraph`], the run
//!   controller and [`EventSink`].
//! - [`nodes`]: coordinator, planner, publisher, factory, and proxy nodes.
//! - [`agent`]: [`AgentDefinition`], [`AgentStore`], [`AgentRegistry`].
//! - [`tools`]: [`Tool`], [`ToolRegistry`], JSON-Schema input validation,
//!   [`TavilySearch`].
//! - [`llm`]: [`LlmClient`] trait, [`LlmGateway`], [`ChatOpenAI`], [`MockLlm`].
//! - [`prompts`]: `<<VAR>>` binder and the embedded template library.
//! - [`service`]: [`WorkflowService`], [`AgentRequest`], the per-user
//!   session cache.
//! - [`evaluation`]: bounded-concurrency harness, scoring, artifacts.
//!
//! Key types are re-exported at the crate root:
//! `use cooragent::{WorkflowService, AgentRequest, WorkflowEvent};`

pub mod agent;
pub mod error;
pub mod evaluation;
pub mod graph;
pub mod llm;
pub mod message;
pub mod nodes;
pub mod prompts;
pub mod service;
pub mod state;
pub mod tools;

pub use agent::{default_agents, AgentDefinition, AgentRegistry, AgentStore, RegistryError};
pub use error::WorkflowError;
pub use evaluation::{
    average_metrics, extract_final_answer, EvalTask, EvaluationConfig, EvaluationEngine,
    EvaluationResult, ResultStore, Scorer, SubstringScorer, TaskOutcome, TaskScore,
    WorkflowTaskAdapter,
};
pub use graph::{
    chunk_text, run_workflow, Command, CompilationError, CompiledWorkflow, EventSink, Goto,
    NodeContext, StatePatch, WorkflowGraph, WorkflowNode, CHUNK_SIZE,
};
pub use llm::{
    strip_json_fence, with_retry, ChatOpenAI, LlmClient, LlmGateway, LlmResponse, LlmType,
    MockLlm, MockReply, ToolCall,
};
pub use message::{Message, Role};
pub use nodes::{CoordinatorNode, FactoryNode, PlannerNode, ProxyNode, PublisherNode};
pub use prompts::{bind_text, render, PromptLibrary, TemplateError};
pub use service::{
    AgentRequest, Lang, SessionCache, TaskType, WorkflowService, WorkflowStream,
};
pub use state::SessionState;
pub use tools::{
    default_tool_specs, seed_tool_records, validate_args, TavilySearch, Tool, ToolContext,
    ToolError, ToolRegistry, ToolSpec,
};

// Re-export the wire-level event types so callers need only this crate.
pub use stream_event::{ErrorInfo, ErrorKind, MessageDelta, WorkflowEvent};
