// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Cortex CLI
//!
//! The `cortex` binary drives the pattern engine against a configured pattern
//! store, a JSON content corpus and an embedder.
//!
//! ## Commands
//!
//! - `cortex discover|promote` - Mine and promote pattern candidates
//! - `cortex describe|compose|specialize` - Define patterns
//! - `cortex execute|list|get|constraints` - Inspect and run patterns
//! - `cortex feedback` - Judge a match
//! - `cortex request` - Handle a raw JSON request
//! - `cortex config show|generate` - Configuration management
//! - `cortex update` - Apply PostgreSQL schema migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod output;
mod runtime;

use commands::{ConfigCommand, PatternCommand};
use runtime::RuntimeOptions;

/// Cortex - discover, compose and refine patterns over embedded content
#[derive(Parser)]
#[command(name = "cortex")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CORTEX_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Content corpus (JSON array or JSON lines of content nodes)
    #[arg(long, global = true, env = "CORTEX_CORPUS", value_name = "FILE")]
    corpus: Option<PathBuf>,

    /// Print raw response envelopes as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CORTEX_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Pattern(PatternCommand),

    /// Handle a raw JSON request (`-` reads stdin)
    #[command(name = "request")]
    Request {
        #[arg(value_name = "JSON")]
        body: String,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply pattern store migrations (PostgreSQL backend)
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: commands::UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let options = RuntimeOptions {
        config_path: cli.config.clone(),
        corpus: cli.corpus,
        json: cli.json,
    };

    match cli.command {
        Some(Commands::Pattern(command)) => exit_on_failure(commands::pattern::handle_command(command, options).await?),
        Some(Commands::Request { body }) => exit_on_failure(commands::pattern::handle_raw(body, options).await?),
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Update { command }) => commands::update::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

fn exit_on_failure(success: bool) -> Result<()> {
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_feedback() {
        let cli = Cli::try_parse_from(["cortex", "feedback", "open-questions", "n1", "incorrect", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Some(Commands::Pattern(PatternCommand::Feedback { .. }))
        ));
    }

    #[test]
    fn test_rejects_unknown_judgment() {
        assert!(Cli::try_parse_from(["cortex", "feedback", "p", "n1", "maybe"]).is_err());
    }
}
