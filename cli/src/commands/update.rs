// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Store Update Command
//!
//! Implements `cortex update`: applies the pattern store migrations to a
//! PostgreSQL database so the schema matches this build.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! cortex update
//!
//! # Preview migrations without applying
//! cortex update --dry-run
//! ```
//!
//! The connection string comes from `--database-url` / `CORTEX_DATABASE_URL`,
//! else from a `postgres` storage section in the configuration.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use aegis_cortex::domain::config::{CortexConfig, StorageConfig};
use aegis_cortex::infrastructure::postgres_repository::MIGRATOR;

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,

    /// PostgreSQL connection string (overrides configuration)
    #[arg(long, env = "CORTEX_DATABASE_URL")]
    database_url: Option<String>,
}

pub async fn execute(cmd: UpdateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Cortex Update".bold().green());

    let database_url = match cmd.database_url {
        Some(url) => url,
        None => {
            let config = CortexConfig::load_or_default(config_path).context("Failed to load configuration")?;
            match config.storage {
                StorageConfig::Postgres { connection_string, .. } => connection_string,
                _ => anyhow::bail!("No PostgreSQL pattern store configured (set CORTEX_DATABASE_URL or storage.backend: postgres)"),
            }
        }
    };

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);
    let total_migrations = MIGRATOR.iter().count();

    println!("Migration status: {} applied, {} total available.", applied_count, total_migrations);

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        MIGRATOR.run(&pool).await.context("Failed to apply migrations")?;
        println!("{}", "✓ Pattern store updated successfully.".green());
    } else {
        println!("{}", "✓ Pattern store is up to date.".green());
    }

    Ok(())
}
