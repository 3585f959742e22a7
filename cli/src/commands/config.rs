// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aegis_cortex::domain::config::{CortexConfig, EmbedderConfig, StorageConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path (default: ./cortex-config.yaml)
        #[arg(short, long, default_value = "./cortex-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let source = config_override.clone().or_else(CortexConfig::discover_config);
    let config = CortexConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CORTEX_CONFIG_PATH: {}",
            std::env::var("CORTEX_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./cortex-config.yaml");
        println!("  4. ~/.cortex/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    match &source {
        Some(path) => println!("  Loaded from: {}", path.display()),
        None => println!("  Loaded from: {}", "(defaults)".dimmed()),
    }
    println!();

    println!("{}", "Discovery:".bold());
    println!("  Sample size: {}", config.discovery.sample_size);
    println!("  Similarity floor: {}", config.discovery.similarity_floor);
    println!("  Min instances: {}", config.discovery.min_instances);
    println!();

    println!("{}", "Execution:".bold());
    println!("  Match threshold: {}", config.execution.match_threshold);
    match config.execution.default_limit {
        Some(limit) => println!("  Default limit: {}", limit),
        None => println!("  Default limit: unlimited"),
    }
    println!();

    println!("{}", "Learning:".bold());
    println!("  Learning rate: {}", config.learning.learning_rate);
    println!("  Contradiction decay: {}", config.learning.contradiction_decay);
    println!("  Exclusion threshold: {}", config.learning.exclusion_threshold);
    println!();

    println!("{}", "Storage:".bold());
    match &config.storage {
        StorageConfig::InMemory => println!("  Backend: in_memory"),
        StorageConfig::Sled { path } => println!("  Backend: sled ({})", path),
        StorageConfig::Postgres { max_connections, .. } => {
            println!("  Backend: postgres (max {} connections)", max_connections)
        }
    }

    println!("{}", "Embedder:".bold());
    match &config.embedder {
        EmbedderConfig::Hashing { dimensions } => println!("  Provider: hashing ({} dims)", dimensions),
        EmbedderConfig::Ollama { endpoint, model } => println!("  Provider: ollama {} ({})", endpoint, model),
    }

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    CortexConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
