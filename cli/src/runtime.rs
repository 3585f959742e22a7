// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Builds a [`PatternApi`] from configuration and CLI flags.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use aegis_cortex::application::repository_factory::{create_embedder, create_pattern_repository};
use aegis_cortex::application::{HeuristicDimensionExtractor, PatternSystem};
use aegis_cortex::domain::config::CortexConfig;
use aegis_cortex::infrastructure::InMemoryContentStore;
use aegis_cortex::presentation::api::PatternApi;

pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub corpus: Option<PathBuf>,
    pub json: bool,
}

pub async fn build_api(options: &RuntimeOptions) -> Result<PatternApi> {
    let config = CortexConfig::load_or_default(options.config_path.clone())
        .context("Failed to load configuration")?;

    let repository = create_pattern_repository(&config.storage)
        .await
        .context("Failed to open pattern store")?;
    let embedder = create_embedder(&config.embedder);

    let content_store = match &options.corpus {
        Some(path) => InMemoryContentStore::from_json_file(path)
            .with_context(|| format!("Failed to load corpus {}", path.display()))?,
        None => {
            warn!("No corpus given (--corpus / CORTEX_CORPUS); content store is empty");
            InMemoryContentStore::new()
        }
    };
    let indexed = content_store
        .index_embeddings(embedder.as_ref(), config.discovery.embed_batch_size)
        .await
        .context("Failed to embed corpus")?;
    info!(nodes = content_store.len().await, indexed, "Content store ready");

    let system = PatternSystem::new(
        repository,
        Arc::new(content_store),
        embedder,
        Arc::new(HeuristicDimensionExtractor),
        &config,
    );
    Ok(PatternApi::new(Arc::new(system)))
}
