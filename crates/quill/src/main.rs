// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quill - collaborative persona editing with a tool-using AI agent.
//!
//! This is the binary entry point.

mod changelog;
mod chat;
mod serve;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use quill_agent::LoopState;
use quill_config::QuillConfig;

/// Quill - collaborative persona editing with a tool-using AI agent.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and agent.
    Serve,
    /// Send one message to a persona's editing agent and print the records.
    Chat {
        /// Persona to edit.
        #[arg(long)]
        persona: String,
        /// Message for the agent.
        message: String,
    },
    /// Inspect the changelog.
    Changelog {
        /// Only show entries after this entry id.
        #[arg(long)]
        since: Option<String>,
        /// Keep only the newest N entries before listing.
        #[arg(long, value_name = "N")]
        truncate: Option<usize>,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Manage Quill configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration and report every problem found.
    Check,
}

fn load_config(path: Option<&std::path::Path>) -> QuillConfig {
    let loaded = match path {
        Some(path) => quill_config::load_and_validate_path(path),
        None => quill_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            quill_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout stays
/// machine-readable for `quill chat`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quill={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("{} {err}", "error:".red().bold());
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let Some(command) = cli.command else {
        println!("quill: use --help for available commands");
        return;
    };
    init_tracing(&config.agent.log_level);

    match command {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                fail(e);
            }
        }
        Commands::Chat { persona, message } => {
            match chat::run_chat(config, persona, message).await {
                Ok(LoopState::Done) => {}
                Ok(_) => std::process::exit(2),
                Err(e) => fail(e),
            }
        }
        Commands::Changelog {
            since,
            truncate,
            plain,
        } => {
            if let Err(e) = changelog::run_changelog(config, since, truncate, plain).await {
                fail(e);
            }
        }
        Commands::Config {
            action: ConfigCommands::Check,
        } => {
            println!(
                "{} configuration is valid (agent.name={}, database={})",
                "✓".green(),
                config.agent.name,
                config.storage.database_path
            );
        }
    }
}
