// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory content graph adapter
//!
//! Holds content nodes in insertion order, which is the deterministic order
//! `sample` returns them in. Used by tests and by the CLI, which loads a corpus
//! from a JSON file (an array of nodes, or one node per line).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::content::{
    cosine_similarity, ContentNode, ContentStore, ContentStoreError, Embedder, EmbedderError, SampleQuery,
};

#[derive(Default)]
struct Corpus {
    nodes: Vec<ContentNode>,
    positions: HashMap<String, usize>,
}

impl Corpus {
    fn upsert(&mut self, node: ContentNode) {
        match self.positions.get(&node.id) {
            Some(&index) => self.nodes[index] = node,
            None => {
                self.positions.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryContentStore {
    corpus: RwLock<Corpus>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = ContentNode>) -> Self {
        let mut corpus = Corpus::default();
        for node in nodes {
            corpus.upsert(node);
        }
        Self {
            corpus: RwLock::new(corpus),
        }
    }

    /// Load a corpus file: a JSON array of nodes, or JSON lines
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ContentStoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ContentStoreError::Unreachable(format!("{}: {}", path.display(), e)))?;

        let nodes: Vec<ContentNode> = if raw.trim_start().starts_with('[') {
            serde_json::from_str(&raw).map_err(|e| ContentStoreError::Query(format!("{}: {}", path.display(), e)))?
        } else {
            raw.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str(line)
                        .map_err(|e| ContentStoreError::Query(format!("{} line {}: {}", path.display(), i + 1, e)))
                })
                .collect::<Result<_, _>>()?
        };

        info!(path = %path.display(), nodes = nodes.len(), "Loaded content corpus");
        Ok(Self::with_nodes(nodes))
    }

    pub async fn insert(&self, node: ContentNode) {
        self.corpus.write().await.upsert(node);
    }

    pub async fn len(&self) -> usize {
        self.corpus.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Embed every node that lacks a vector; returns how many were embedded
    pub async fn index_embeddings(&self, embedder: &dyn Embedder, batch_size: usize) -> Result<usize, EmbedderError> {
        let pending: Vec<(usize, String)> = {
            let corpus = self.corpus.read().await;
            corpus
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.embedding.is_none())
                .map(|(i, node)| (i, node.text.clone()))
                .collect()
        };

        let mut embedded = 0;
        for chunk in pending.chunks(batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            let mut corpus = self.corpus.write().await;
            for ((index, _), vector) in chunk.iter().zip(vectors) {
                if let Some(node) = corpus.nodes.get_mut(*index) {
                    node.embedding = Some(vector);
                    embedded += 1;
                }
            }
        }

        debug!(embedded, "Indexed content embeddings");
        Ok(embedded)
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn sample(&self, query: &SampleQuery) -> Result<Vec<ContentNode>, ContentStoreError> {
        let corpus = self.corpus.read().await;
        Ok(corpus
            .nodes
            .iter()
            .filter(|node| {
                query.source_types.is_empty()
                    || query.source_types.iter().any(|s| s.eq_ignore_ascii_case(&node.source_type))
            })
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentNode>, ContentStoreError> {
        let corpus = self.corpus.read().await;
        Ok(corpus.positions.get(id).map(|&index| corpus.nodes[index].clone()))
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(ContentNode, f32)>, ContentStoreError> {
        let corpus = self.corpus.read().await;
        let mut scored: Vec<(ContentNode, f32)> = corpus
            .nodes
            .iter()
            .filter_map(|node| {
                node.embedding
                    .as_ref()
                    .map(|vector| (node.clone(), cosine_similarity(embedding, vector)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::embedding_client::HashingEmbedder;
    use std::io::Write;

    fn node(id: &str, source: &str, embedding: Vec<f32>) -> ContentNode {
        let mut node = ContentNode::new(id, format!("text of {}", id), "user", source);
        node.embedding = Some(embedding);
        node
    }

    #[tokio::test]
    async fn test_sample_filters_and_keeps_order() {
        let store = InMemoryContentStore::with_nodes(vec![
            node("a", "chat", vec![1.0, 0.0]),
            node("b", "email", vec![0.0, 1.0]),
            node("c", "Chat", vec![1.0, 1.0]),
        ]);

        let all = store.sample(&SampleQuery { source_types: vec![], limit: 10 }).await.unwrap();
        assert_eq!(all.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let chats = store
            .sample(&SampleQuery { source_types: vec!["chat".to_string()], limit: 10 })
            .await
            .unwrap();
        assert_eq!(chats.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);

        let limited = store.sample(&SampleQuery { source_types: vec![], limit: 1 }).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = InMemoryContentStore::with_nodes(vec![
            node("a", "chat", vec![1.0, 0.0]),
            node("b", "chat", vec![0.0, 1.0]),
            node("c", "chat", vec![0.7, 0.7]),
        ]);

        let hits = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.id, "a");
        assert_eq!(hits[1].0.id, "c");
    }

    #[tokio::test]
    async fn test_index_embeddings_fills_missing_vectors() {
        let store = InMemoryContentStore::with_nodes(vec![
            ContentNode::new("a", "philosophical uncertainty", "user", "chat"),
            node("b", "chat", vec![0.0; 64]),
        ]);

        let embedded = store.index_embeddings(&HashingEmbedder::new(64), 8).await.unwrap();
        assert_eq!(embedded, 1);
        assert!(store.get("a").await.unwrap().unwrap().embedding.is_some());
    }

    #[tokio::test]
    async fn test_load_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id":"n1","text":"hello","authorRole":"user","sourceType":"chat"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id":"n2","text":"world","authorRole":"assistant","sourceType":"chat","threadId":"t1","position":2}}"#).unwrap();

        let store = InMemoryContentStore::from_json_file(file.path()).unwrap();
        assert_eq!(store.len().await, 2);
        let n2 = store.get("n2").await.unwrap().unwrap();
        assert_eq!(n2.thread_id.as_deref(), Some("t1"));
        assert_eq!(n2.position, 2);
    }
}
