mod config;
mod decision;
mod hooks;
mod logging;
mod notify;
mod repository;
mod store;
mod transcript;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::HookConfig;
use hooks::{Outcome, Standalone};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

/// Claude Code hooks: keep prompts and replies in PostgreSQL and relay
/// replies to Telegram.
#[derive(Debug, Parser)]
#[command(name = "hookrelay", version, about)]
struct Cli {
    /// Settings file (default: $CLAUDE_PROJECT_DIR/.claude/hookrelay.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// UserPromptSubmit hook: store the prompt in PostgreSQL, or the YAML file
    SavePrompt,
    /// Stop hook: store the last assistant message in PostgreSQL
    SaveOutput,
    /// Stop/Notification hook: send the last assistant message to Telegram
    Notify {
        /// Read this transcript instead of a hook payload on stdin
        #[arg(long, value_name = "PATH")]
        transcript: Option<PathBuf>,
        /// Session id shown in the message header
        #[arg(long, requires = "transcript")]
        session_id: Option<String>,
    },
    /// Create the tables and indexes if they do not exist
    InitDb,
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading hook input from stdin")?;
    Ok(buffer)
}

fn run(command: Command, config: &HookConfig) -> Result<Outcome> {
    match command {
        Command::SavePrompt => hooks::save_prompt(config, &read_stdin()?),
        Command::SaveOutput => hooks::save_output(config, &read_stdin()?),
        Command::Notify {
            transcript,
            session_id,
        } => {
            let standalone = transcript.map(|transcript| Standalone {
                transcript,
                session_id,
            });
            hooks::notify(config, standalone, read_stdin)
        }
        Command::InitDb => hooks::init_db(config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match HookConfig::from_env().with_settings_file(cli.config.as_deref()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("hookrelay: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let guard = logging::init(&config);
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let code = match run(cli.command, &config) {
        Ok(outcome) => {
            tracing::info!(%outcome, "hook finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "hook failed");
            eprintln!("hookrelay: {err:#}");
            ExitCode::FAILURE
        }
    };

    drop(guard);
    code
}
