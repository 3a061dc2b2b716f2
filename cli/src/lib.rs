//! Command implementations for the `cooragent` binary.
//!
//! Everything runs against a local [`WorkflowService`] built from settings;
//! the HTTP server wraps the same service. Output is one JSON object per
//! line so shells and tests can consume it.

use std::io::Read;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use cooragent::{
    AgentDefinition, AgentRequest, Lang, LlmType, Message, TaskType, WorkflowEvent,
};
use serve::AppState;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Settings(#[from] config::LoadError),
    #[error("{0}")]
    Workflow(#[from] cooragent::WorkflowError),
    #[error("{0}")]
    Registry(#[from] cooragent::RegistryError),
    #[error("invalid input: {0}")]
    Input(String),
    #[error("run aborted: cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

#[derive(Parser, Debug)]
#[command(name = "cooragent")]
#[command(about = "CoorAgent — multi-agent workflows from the command line")]
pub struct Cli {
    /// Path to config.toml (default: $XDG_CONFIG_HOME/cooragent/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workflow and stream its events as JSON lines
    Run(RunArgs),
    /// List agents visible to a user
    ListAgents(ListAgentsArgs),
    /// List the built-in default agents
    ListDefaultAgents,
    /// List the built-in default tools
    ListDefaultTools,
    /// Replace an agent definition
    EditAgent(EditAgentArgs),
    /// Remove an agent
    RemoveAgent(RemoveAgentArgs),
    /// Start the HTTP server
    Serve,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// User id the run executes as
    #[arg(short, long)]
    pub user: String,

    /// Task type: agent_workflow or agent_factory
    #[arg(short, long, default_value = "agent_workflow")]
    pub task_type: String,

    /// User message(s), in order
    #[arg(short, long = "message", required = true)]
    pub messages: Vec<String>,

    /// Verbose execution logging
    #[arg(long)]
    pub debug: bool,

    /// Plan on the reasoning LM channel
    #[arg(long, overrides_with = "no_deep_thinking")]
    pub deep_thinking: bool,
    #[arg(long, hide = true)]
    pub no_deep_thinking: bool,

    /// Run a web search before planning
    #[arg(long)]
    pub search_before_planning: bool,

    /// Additional agents granted to this run
    #[arg(short = 'a', long = "agent")]
    pub coop_agents: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ListAgentsArgs {
    #[arg(short, long)]
    pub user: String,

    /// Regex filter on agent_name
    #[arg(short = 'm', long = "match")]
    pub pattern: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditAgentArgs {
    #[arg(short, long)]
    pub name: String,

    #[arg(short, long)]
    pub user: String,

    /// Prompt for fields on stdin instead of reading a full JSON definition
    #[arg(long, overrides_with = "no_interactive")]
    pub interactive: bool,
    #[arg(long, hide = true)]
    pub no_interactive: bool,
}

#[derive(Args, Debug)]
pub struct RemoveAgentArgs {
    #[arg(short, long)]
    pub name: String,

    #[arg(short, long)]
    pub user: String,
}

pub fn parse_task_type(s: &str) -> Result<TaskType, CliError> {
    match s {
        "agent_workflow" => Ok(TaskType::AgentWorkflow),
        "agent_factory" => Ok(TaskType::AgentFactory),
        other => Err(CliError::Input(format!(
            "unknown task type {other} (use agent_workflow or agent_factory)"
        ))),
    }
}

fn print_line(value: &serde_json::Value) {
    println!("{value}");
}

/// Streams one run to stdout. Ctrl-C cancels the run; the partial stream
/// drains and the command fails with `Cancelled`.
pub async fn run_workflow(state: &AppState, args: RunArgs) -> Result<(), CliError> {
    let request = AgentRequest {
        user_id: args.user,
        lang: Lang::En,
        task_type: parse_task_type(&args.task_type)?,
        messages: args.messages.into_iter().map(Message::user).collect(),
        debug: args.debug,
        deep_thinking_mode: args.deep_thinking && !args.no_deep_thinking,
        search_before_planning: args.search_before_planning,
        coop_agents: args.coop_agents,
    };

    let mut stream = state.service.run(request)?;
    let cancel = stream.cancel_token();
    let mut interrupted = false;
    let mut failed = false;
    tracing::debug!("run started, streaming events");

    loop {
        tokio::select! {
            interrupt = tokio::signal::ctrl_c(), if !interrupted => {
                if interrupt.is_ok() {
                    tracing::info!("interrupt received, cancelling run");
                    interrupted = true;
                    cancel.cancel();
                }
            }
            event = stream.next() => {
                let Some(event) = event else { break };
                if let WorkflowEvent::Error { .. } = event {
                    failed = true;
                }
                if let Ok(value) = event.to_value() {
                    print_line(&value);
                }
            }
        }
    }

    if interrupted {
        return Err(CliError::Cancelled);
    }
    if failed {
        return Err(CliError::Other("workflow ended with an error event".into()));
    }
    Ok(())
}

pub fn list_agents(state: &AppState, args: ListAgentsArgs) -> Result<(), CliError> {
    let agents = state
        .agents()
        .list(Some(&args.user), args.pattern.as_deref())?;
    for def in agents {
        if let Ok(value) = serde_json::to_value(def.as_ref()) {
            print_line(&value);
        }
    }
    Ok(())
}

pub fn list_default_agents() {
    for def in cooragent::default_agents() {
        if let Ok(value) = serde_json::to_value(&def) {
            print_line(&value);
        }
    }
}

pub fn list_default_tools() {
    for spec in cooragent::default_tool_specs() {
        if let Ok(value) = serde_json::to_value(&spec) {
            print_line(&value);
        }
    }
}

fn prompt_field(label: &str, current: &str) -> Result<String, CliError> {
    eprint!("{label} [{current}]: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| CliError::Input(e.to_string()))?;
    let line = line.trim();
    Ok(if line.is_empty() {
        current.to_string()
    } else {
        line.to_string()
    })
}

/// Interactive mode prompts per field (empty keeps the current value);
/// non-interactive reads a full JSON definition from stdin. Either way the
/// registry receives a complete record.
pub fn edit_agent(state: &AppState, args: EditAgentArgs) -> Result<(), CliError> {
    let interactive = args.interactive && !args.no_interactive;
    let new_def = if interactive {
        let current = state
            .agents()
            .resolve(&args.name)
            .ok_or_else(|| cooragent::RegistryError::NotFound(args.name.clone()))?;
        let mut def = current.as_ref().clone();
        def.nick_name = prompt_field("nick_name", &def.nick_name)?;
        def.description = prompt_field("description", &def.description)?;
        def.llm_type = prompt_field("llm_type", def.llm_type.as_str())?
            .parse::<LlmType>()
            .map_err(CliError::Input)?;
        def.prompt = prompt_field("prompt", &def.prompt)?;
        def
    } else {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::Input(e.to_string()))?;
        let def: AgentDefinition =
            serde_json::from_str(&buffer).map_err(|e| CliError::Input(e.to_string()))?;
        if def.agent_name != args.name {
            return Err(CliError::Input(format!(
                "definition names {} but -n was {}",
                def.agent_name, args.name
            )));
        }
        def
    };

    state.agents().edit(new_def)?;
    print_line(&serde_json::json!({"result": "success"}));
    Ok(())
}

pub fn remove_agent(state: &AppState, args: RemoveAgentArgs) -> Result<(), CliError> {
    state.agents().remove(&args.user, &args.name)?;
    print_line(&serde_json::json!({
        "result": "success",
        "message": format!("agent {} removed", args.name),
    }));
    Ok(())
}


/// Loads `.env` plus settings and builds the shared service state.
pub fn bootstrap(
    config_path: Option<&std::path::Path>,
) -> Result<(config::Settings, AppState), CliError> {
    config::load_and_apply_dotenv(None)?;
    let settings = config::Settings::load(config_path)?;
    let state = serve::build_state(&settings).map_err(|e| CliError::Other(e.to_string()))?;
    Ok((settings, state))
}
