// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Clients
//!
//! Two [`Embedder`] implementations:
//!
//! - [`HashingEmbedder`]: deterministic signed feature hashing of content words
//!   and their character trigrams. Needs no service, keeps lexical and
//!   sub-word overlap, and produces identical vectors across runs.
//! - [`OllamaEmbeddingClient`]: HTTP client for an Ollama-compatible
//!   `/api/embeddings` endpoint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::content::{Embedder, EmbedderError};
use crate::domain::text;

const TRIGRAM_WEIGHT: f32 = 0.5;

/// Local feature-hashing embedder
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();

        let index = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    /// Synchronous embedding; the async trait method delegates here
    pub fn embed_text(&self, input: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];

        for word in text::content_words(input) {
            self.accumulate(&mut vector, &word, 1.0);

            let padded: Vec<char> = format!("^{}$", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, &format!("#{}", trigram), TRIGRAM_WEIGHT);
            }
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(self.embed_text(text))
    }
}

/// Client for an Ollama-compatible embedding endpoint
pub struct OllamaEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingClient {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedderError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbedderError::Unreachable(format!("HTTP {}: {}", status, error_text)));
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(EmbedderError::InvalidResponse("empty embedding".to_string()));
        }

        debug!(model = %self.model, dimensions = body.embedding.len(), "Embedded text");
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::cosine_similarity;

    #[tokio::test]
    async fn test_generate_embedding() {
        let client = HashingEmbedder::new(384);
        let embedding = client.embed("philosophical uncertainty").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_consistent_embeddings() {
        let client = HashingEmbedder::default();
        let emb1 = client.embed("same text").await.unwrap();
        let emb2 = client.embed("same text").await.unwrap();

        assert_eq!(emb1, emb2, "Same text should produce same embedding");
    }

    #[test]
    fn test_subword_overlap_scores_higher() {
        let client = HashingEmbedder::default();
        let query = client.embed_text("philosophical uncertainty");
        let related = client.embed_text("I remain uncertain about these philosophical puzzles");
        let unrelated = client.embed_text("Quarterly revenue grew eleven percent");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_stopword_only_text_is_zero_vector() {
        let client = HashingEmbedder::new(16);
        assert!(client.embed_text("the and of").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_ollama_unreachable_maps_to_error() {
        let client = OllamaEmbeddingClient::new("http://127.0.0.1:1".to_string(), "nomic-embed-text".to_string());
        let result = client.embed("hello").await;
        assert!(matches!(result, Err(EmbedderError::Unreachable(_))));
    }
}
