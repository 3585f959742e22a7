// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Discovery Engine
//!
//! Unsupervised candidate mining over a bounded corpus sample:
//!
//! 1. sample nodes from the content store in its deterministic order
//! 2. embed nodes that arrive without a vector (batched)
//! 3. greedy single-pass clustering against running centroids
//! 4. drop clusters below the minimum size
//! 5. summarize each survivor by TF-IDF keywords and propose dimensions
//! 6. score cohesion as mean pairwise cosine similarity
//!
//! A run only reads the content store. Its output is advisory until a
//! candidate is promoted through the composer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::domain::config::DiscoveryConfig;
use crate::domain::content::{cosine_similarity, ContentNode, ContentStore, Embedder, SampleQuery};
use crate::domain::discovery::{CandidateStatus, DiscoveredPatternCandidate, DiscoveryMethod, DiscoveryRequest};
use crate::domain::error::PatternError;
use crate::domain::pattern::{Dimension, DimensionType};
use crate::domain::text;

const ATTRIBUTE_DIMENSION_WEIGHT: f64 = 0.5;

/// Result of one discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryRun {
    pub candidates: Vec<DiscoveredPatternCandidate>,
    pub sampled_nodes: usize,
    pub clusters_found: usize,
}

/// Members are indices into the sampled node list
#[derive(Debug, Clone)]
struct Cluster {
    members: Vec<usize>,
    centroid_sum: Vec<f32>,
}

impl Cluster {
    fn seed(index: usize, embedding: &[f32]) -> Self {
        Self {
            members: vec![index],
            centroid_sum: embedding.to_vec(),
        }
    }

    fn absorb(&mut self, index: usize, embedding: &[f32]) {
        self.members.push(index);
        for (sum, value) in self.centroid_sum.iter_mut().zip(embedding) {
            *sum += value;
        }
    }
}

pub struct DiscoveryEngine {
    content_store: Arc<dyn ContentStore>,
    embedder: Arc<dyn Embedder>,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(content_store: Arc<dyn ContentStore>, embedder: Arc<dyn Embedder>, config: DiscoveryConfig) -> Self {
        Self {
            content_store,
            embedder,
            config,
        }
    }

    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryRun, PatternError> {
        let started = Instant::now();
        let min_instances = request.min_instances.unwrap_or(self.config.min_instances).max(1);

        let nodes = self
            .content_store
            .sample(&SampleQuery {
                source_types: request.source_types.clone(),
                limit: self.config.sample_size,
            })
            .await?;
        let embeddings = self.embeddings_for(&nodes).await?;

        let clusters = self.cluster(&embeddings);
        let clusters_found = clusters.len();
        let document_frequency = document_frequency(&nodes);

        let mut candidates: Vec<DiscoveredPatternCandidate> = clusters
            .into_iter()
            .filter(|cluster| cluster.members.len() >= min_instances)
            .map(|cluster| self.summarize(&cluster, &nodes, &embeddings, &document_frequency))
            .collect();

        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.instance_count.cmp(&a.instance_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = request.limit {
            candidates.truncate(limit);
        }

        metrics::counter!("cortex_discovery_runs_total").increment(1);
        info!(
            sampled = nodes.len(),
            clusters = clusters_found,
            candidates = candidates.len(),
            min_instances,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Discovery run complete"
        );

        Ok(DiscoveryRun {
            candidates,
            sampled_nodes: nodes.len(),
            clusters_found,
        })
    }

    /// Stored vectors where present, embedder output for the rest
    async fn embeddings_for(&self, nodes: &[ContentNode]) -> Result<Vec<Vec<f32>>, PatternError> {
        let mut embeddings: Vec<Option<Vec<f32>>> = nodes.iter().map(|n| n.embedding.clone()).collect();
        let missing: Vec<usize> = (0..nodes.len()).filter(|&i| embeddings[i].is_none()).collect();

        for chunk in missing.chunks(self.config.embed_batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|&i| nodes[i].text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (&i, vector) in chunk.iter().zip(vectors) {
                embeddings[i] = Some(vector);
            }
        }

        debug!(embedded = missing.len(), total = nodes.len(), "Resolved sample embeddings");
        Ok(embeddings.into_iter().map(Option::unwrap_or_default).collect())
    }

    fn cluster(&self, embeddings: &[Vec<f32>]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for (index, embedding) in embeddings.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (c, cluster) in clusters.iter().enumerate() {
                let similarity = cosine_similarity(&cluster.centroid_sum, embedding);
                if best.map_or(true, |(_, s)| similarity > s) {
                    best = Some((c, similarity));
                }
            }

            match best {
                Some((c, similarity)) if similarity >= self.config.similarity_floor => {
                    clusters[c].absorb(index, embedding);
                }
                _ => clusters.push(Cluster::seed(index, embedding)),
            }
        }

        clusters
    }

    fn summarize(
        &self,
        cluster: &Cluster,
        nodes: &[ContentNode],
        embeddings: &[Vec<f32>],
        document_frequency: &HashMap<String, usize>,
    ) -> DiscoveredPatternCandidate {
        let members: Vec<&ContentNode> = cluster.members.iter().map(|&i| &nodes[i]).collect();
        let keywords = cluster_keywords(&members, document_frequency, nodes.len(), self.config.keyword_count);

        let mut dimensions = Vec::new();
        if !keywords.is_empty() {
            dimensions.push(Dimension::new(DimensionType::Topic, keywords.join(", "), 1.0));
        }
        if let Some(role) = dominant(members.iter().map(|n| n.author_role.to_lowercase()), self.config.dominance_ratio) {
            dimensions.push(Dimension::new(
                DimensionType::Role,
                format!("written by {}", role),
                ATTRIBUTE_DIMENSION_WEIGHT,
            ));
        }
        if let Some(source) = dominant(members.iter().map(|n| n.source_type.to_lowercase()), self.config.dominance_ratio) {
            dimensions.push(Dimension::new(
                DimensionType::Source,
                format!("from {}", source),
                ATTRIBUTE_DIMENSION_WEIGHT,
            ));
        }

        let member_ids: Vec<String> = members.iter().map(|n| n.id.clone()).collect();
        let observation = if keywords.is_empty() {
            format!("{} closely related nodes", members.len())
        } else {
            format!("{} nodes recurring around: {}", members.len(), keywords.join(", "))
        };

        DiscoveredPatternCandidate {
            id: DiscoveredPatternCandidate::id_for_members(&member_ids),
            observation,
            confidence: cohesion(&cluster.members, embeddings),
            instance_count: members.len(),
            discovery_method: DiscoveryMethod::Clustering,
            status: CandidateStatus::Candidate,
            dimensions,
            keywords,
            member_ids,
        }
    }
}

/// Number of sampled documents containing each content word
fn document_frequency(nodes: &[ContentNode]) -> HashMap<String, usize> {
    let mut frequency = HashMap::new();
    for node in nodes {
        let words: HashSet<String> = text::content_words(&node.text).into_iter().collect();
        for word in words {
            *frequency.entry(word).or_insert(0) += 1;
        }
    }
    frequency
}

/// Top terms by member term frequency times inverse document frequency
fn cluster_keywords(
    members: &[&ContentNode],
    document_frequency: &HashMap<String, usize>,
    sample_size: usize,
    count: usize,
) -> Vec<String> {
    let mut term_frequency: HashMap<String, usize> = HashMap::new();
    for node in members {
        for word in text::content_words(&node.text) {
            *term_frequency.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, f64)> = term_frequency
        .into_iter()
        .map(|(word, tf)| {
            let df = document_frequency.get(&word).copied().unwrap_or(1).max(1);
            let idf = (1.0 + sample_size as f64 / df as f64).ln();
            (word, tf as f64 * idf)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(count).map(|(word, _)| word).collect()
}

/// Value shared by at least `ratio` of the members; ties resolve alphabetically
fn dominant(values: impl Iterator<Item = String>, ratio: f64) -> Option<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;
    for value in values {
        total += 1;
        *counts.entry(value).or_insert(0) += 1;
    }

    let (value, count) = counts
        .into_iter()
        .filter(|(value, _)| !value.is_empty())
        .fold(None, |best: Option<(String, usize)>, (value, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((value, count)),
        })?;

    (total > 0 && count as f64 / total as f64 >= ratio).then_some(value)
}

/// Mean pairwise cosine similarity, clamped to [0, 1]
fn cohesion(members: &[usize], embeddings: &[Vec<f32>]) -> f64 {
    if members.len() < 2 {
        return 1.0;
    }

    let mut total = 0.0_f64;
    let mut pairs = 0usize;
    for (i, &a) in members.iter().enumerate() {
        for &b in &members[i + 1..] {
            total += cosine_similarity(&embeddings[a], &embeddings[b]) as f64;
            pairs += 1;
        }
    }
    (total / pairs as f64).clamp(0.0, 1.0)
}
