// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Content Graph Collaborators (Anti-Corruption Layer)
//!
//! The Cortex does not own content storage or the embedding model. It consumes
//! both through the two traits below, which fix the contract the engine relies
//! on:
//!
//! - [`Embedder`]: `text -> vector`, with a batched variant.
//! - [`ContentStore`]: deterministic sampling, id lookup and vector search over
//!   content nodes.
//!
//! Implementations live in `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A node of the external content graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: String,
    pub text: String,
    pub author_role: String,
    pub source_type: String,
    /// Conversation/thread the node belongs to, if any
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Structural position within the thread (turn order)
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ContentNode {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        author_role: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author_role: author_role.into(),
            source_type: source_type.into(),
            thread_id: None,
            position: 0,
            has_media: false,
            embedding: None,
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>, position: u32) -> Self {
        self.thread_id = Some(thread_id.into());
        self.position = position;
        self
    }

    pub fn with_media(mut self) -> Self {
        self.has_media = true;
        self
    }

    /// First `max_chars` characters of the text, on a char boundary
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push('…');
        }
        preview
    }
}

/// Filter for sampled node retrieval
#[derive(Debug, Clone, Default)]
pub struct SampleQuery {
    /// Restrict to these source types (empty = all)
    pub source_types: Vec<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedderError {
    #[error("Embedding service unreachable: {0}")]
    Unreachable(String),

    #[error("Embedding service returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentStoreError {
    #[error("Content store unreachable: {0}")]
    Unreachable(String),

    #[error("Content store query failed: {0}")]
    Query(String),
}

/// Embedding function consumed by discovery and execution
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed several texts; implementations may override with a real batch call
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Content graph retrieval primitives consumed by the engine
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Bounded sample of nodes in a stable order
    async fn sample(&self, query: &SampleQuery) -> Result<Vec<ContentNode>, ContentStoreError>;

    /// Look up a single node by id
    async fn get(&self, id: &str) -> Result<Option<ContentNode>, ContentStoreError>;

    /// Vector search; returns nodes with cosine similarity, best first
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(ContentNode, f32)>, ContentStoreError>;
}

/// Cosine similarity of two vectors; 0.0 on length mismatch or zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
