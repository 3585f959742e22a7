//! Shared fixtures for the Cortex integration tests

#![allow(dead_code)]

use std::sync::Arc;

use aegis_cortex::application::{HeuristicDimensionExtractor, PatternSystem};
use aegis_cortex::domain::config::CortexConfig;
use aegis_cortex::domain::content::{ContentNode, Embedder, EmbedderError};
use aegis_cortex::domain::repository::PatternRepository;
use aegis_cortex::domain::text;
use aegis_cortex::infrastructure::{InMemoryContentStore, InMemoryPatternRepository};
use async_trait::async_trait;

/// Topic axes; every text also gets a small constant component so no vector is zero
const AXES: &[&[&str]] = &[
    &["bake", "baking", "recipe", "oven", "flour", "bread"],
    &["flight", "hotel", "trip", "airport", "travel"],
    &["wonder", "maybe", "perhaps", "unsure", "uncertain", "whether"],
    &["certainly", "definitely", "fact", "clearly"],
    &["invoice", "payment", "receipt", "shipping"],
];
const BIAS: f32 = 0.05;

/// Deterministic embedder with one axis per topic
pub struct AxisEmbedder;

impl AxisEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; AXES.len() + 1];
        for token in text::tokenize(text) {
            for (axis, words) in AXES.iter().enumerate() {
                if words.contains(&token.as_str()) {
                    vector[axis] += 1.0;
                }
            }
        }
        vector[AXES.len()] = BIAS;

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter().map(|v| v / norm).collect()
    }
}

#[async_trait]
impl Embedder for AxisEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(Self::vector(text))
    }
}

/// Embedder that is always down
pub struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        Err(EmbedderError::Unreachable("connection refused".to_string()))
    }
}

pub fn corpus() -> Vec<ContentNode> {
    vec![
        ContentNode::new("c1", "I bake bread with flour in the oven", "user", "chat"),
        ContentNode::new("c2", "this recipe needs an oven and flour", "assistant", "chat"),
        ContentNode::new("t1", "booked a flight and a hotel for the trip", "user", "chat"),
        ContentNode::new("t2", "the airport before my flight was busy", "user", "chat"),
        ContentNode::new("m1", "bake bread for the flight on my trip", "user", "chat"),
        ContentNode::new("u1", "I wonder whether maybe free will is uncertain", "user", "chat"),
        ContentNode::new("a1", "it is certainly a fact, clearly", "assistant", "chat"),
        ContentNode::new("e1", "invoice for the bread flour order", "user", "email"),
        ContentNode::new("e2", "payment receipt for baking supplies and flour", "user", "email"),
        ContentNode::new("e3", "shipping receipt for the oven and flour", "user", "email"),
    ]
}

pub async fn store_with(nodes: Vec<ContentNode>, embedder: &dyn Embedder) -> Arc<InMemoryContentStore> {
    let store = InMemoryContentStore::with_nodes(nodes);
    store.index_embeddings(embedder, 8).await.unwrap();
    Arc::new(store)
}

pub fn config() -> CortexConfig {
    let mut config = CortexConfig::default();
    config.discovery.min_instances = 2;
    config
}

pub async fn system_with(repository: Arc<dyn PatternRepository>, nodes: Vec<ContentNode>) -> PatternSystem {
    let embedder = Arc::new(AxisEmbedder);
    let store = store_with(nodes, embedder.as_ref()).await;
    PatternSystem::new(
        repository,
        store,
        embedder,
        Arc::new(HeuristicDimensionExtractor),
        &config(),
    )
}

pub async fn system() -> PatternSystem {
    system_with(Arc::new(InMemoryPatternRepository::new()), corpus()).await
}

/// `cooking` and `travel` atomic patterns over the shared corpus
pub async fn system_with_topics() -> PatternSystem {
    let system = system().await;
    system
        .describe("bake bread with flour in the oven", Some("cooking"), &[])
        .await
        .unwrap();
    system
        .describe("a trip with a flight and a hotel", Some("travel"), &[])
        .await
        .unwrap();
    system
}

pub fn ids(matches: &[aegis_cortex::application::PatternMatch]) -> std::collections::BTreeSet<String> {
    matches.iter().map(|m| m.content_id.clone()).collect()
}
