//! CoorAgent CLI binary.
//!
//! Subcommands: `run`, `list-agents`, `list-default-agents`,
//! `list-default-tools`, `edit-agent`, `remove-agent`, `serve`.
//! Exit code 0 on success, 1 on user-visible errors, 130 when a run is
//! interrupted.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliError, Command};

/// Logs go to stderr, or to a daily-rolling file when `COORAGENT_LOG_DIR` is
/// set (the returned guard flushes the writer on exit).
fn init_tracing(debug: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default = if debug {
        "cooragent=debug,serve=debug,cli=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if let Ok(dir) = std::env::var("COORAGENT_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "cooragent.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

async fn dispatch(args: Cli) -> Result<(), CliError> {
    let (settings, state) = cli::bootstrap(args.config.as_deref())?;
    match args.cmd {
        Command::Run(run_args) => cli::run_workflow(&state, run_args).await,
        Command::ListAgents(list_args) => cli::list_agents(&state, list_args),
        Command::ListDefaultAgents => {
            cli::list_default_agents();
            Ok(())
        }
        Command::ListDefaultTools => {
            cli::list_default_tools();
            Ok(())
        }
        Command::EditAgent(edit_args) => cli::edit_agent(&state, edit_args),
        Command::RemoveAgent(remove_args) => cli::remove_agent(&state, remove_args),
        Command::Serve => serve::run_serve(settings)
            .await
            .map_err(|e| CliError::Other(e.to_string())),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let debug = matches!(&args.cmd, Command::Run(run) if run.debug);
    let _guard = init_tracing(debug);

    match dispatch(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Cancelled) => {
            eprintln!("cancelled");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
