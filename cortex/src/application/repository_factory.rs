// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete collaborator implementations from configuration. The
//! domain layer only declares the traits; this module picks the adapter.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Config-driven construction of the pattern store and embedder

use std::sync::Arc;

use crate::domain::config::{EmbedderConfig, StorageConfig};
use crate::domain::content::Embedder;
use crate::domain::repository::{PatternRepository, RepositoryError};
use crate::infrastructure::embedding_client::{HashingEmbedder, OllamaEmbeddingClient};
use crate::infrastructure::memory_repository::InMemoryPatternRepository;
use crate::infrastructure::postgres_repository::PostgresPatternRepository;
use crate::infrastructure::sled_repository::SledPatternRepository;

/// Creates a PatternRepository implementation based on the configured backend
pub async fn create_pattern_repository(storage: &StorageConfig) -> Result<Arc<dyn PatternRepository>, RepositoryError> {
    match storage {
        StorageConfig::InMemory => Ok(Arc::new(InMemoryPatternRepository::new())),
        StorageConfig::Sled { path } => Ok(Arc::new(SledPatternRepository::open(path)?)),
        StorageConfig::Postgres {
            connection_string,
            max_connections,
        } => Ok(Arc::new(
            PostgresPatternRepository::connect(connection_string, *max_connections).await?,
        )),
    }
}

/// Creates an Embedder implementation based on the configured provider
pub fn create_embedder(embedder: &EmbedderConfig) -> Arc<dyn Embedder> {
    match embedder {
        EmbedderConfig::Hashing { dimensions } => Arc::new(HashingEmbedder::new(*dimensions)),
        EmbedderConfig::Ollama { endpoint, model } => {
            Arc::new(OllamaEmbeddingClient::new(endpoint.clone(), model.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sled_backend_opens_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig::Sled {
            path: dir.path().join("patterns.db").to_string_lossy().into_owned(),
        };
        let repository = create_pattern_repository(&storage).await.unwrap();
        assert!(repository.list_patterns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hashing_embedder_dimensions() {
        let embedder = create_embedder(&EmbedderConfig::Hashing { dimensions: 64 });
        assert_eq!(embedder.embed("hello world").await.unwrap().len(), 64);
    }
}
