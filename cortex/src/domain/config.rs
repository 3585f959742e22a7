// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cortex Configuration
//
// YAML configuration for the pattern engine:
// - Discovery clustering parameters
// - Execution thresholds and candidate pool sizes
// - Learning rate and constraint exclusion threshold
// - Pattern store backend selection
// - Embedding service selection
//
// Every field has a default so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::learning::LearningRule;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum number of nodes sampled per run
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Minimum cosine similarity to join an existing cluster
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    /// Default minimum cluster size when the caller does not pass one
    #[serde(default = "default_min_instances")]
    pub min_instances: usize,

    /// Texts per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Keywords kept in each cluster summary
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,

    /// Share of members that must agree on an attribute to propose a dimension for it
    #[serde(default = "default_dominance_ratio")]
    pub dominance_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Nodes retrieved per dimension prototype
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Atomic scores below this are not matches
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Result cap when the caller does not pass a limit; unset returns every match
    #[serde(default)]
    pub default_limit: Option<usize>,

    /// Characters of node text included in match previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Multiplicative decay applied when a constraint is contradicted
    #[serde(default = "default_contradiction_decay")]
    pub contradiction_decay: f64,

    /// Constraints at or above this confidence exclude instead of down-weighting
    #[serde(default = "default_exclusion_threshold")]
    pub exclusion_threshold: f64,

    /// Keywords of an offending node considered during induction
    #[serde(default = "default_induction_keywords")]
    pub induction_keywords: usize,
}

impl LearningConfig {
    pub fn rule(&self) -> LearningRule {
        LearningRule::new(self.learning_rate, self.contradiction_decay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    InMemory,
    Sled {
        #[serde(default = "default_sled_path")]
        path: String,
    },
    Postgres {
        connection_string: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sled { path: default_sled_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbedderConfig {
    /// Deterministic local feature hashing
    Hashing {
        #[serde(default = "default_hashing_dimensions")]
        dimensions: usize,
    },
    /// Ollama-compatible `/api/embeddings` endpoint
    Ollama {
        endpoint: String,
        model: String,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Hashing { dimensions: default_hashing_dimensions() }
    }
}

// Default value functions
fn default_sample_size() -> usize {
    500
}

fn default_similarity_floor() -> f32 {
    0.35
}

fn default_min_instances() -> usize {
    5
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_keyword_count() -> usize {
    5
}

fn default_dominance_ratio() -> f64 {
    0.8
}

fn default_candidate_pool() -> usize {
    200
}

fn default_match_threshold() -> f64 {
    0.1
}

fn default_preview_chars() -> usize {
    200
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_contradiction_decay() -> f64 {
    0.5
}

fn default_exclusion_threshold() -> f64 {
    0.8
}

fn default_induction_keywords() -> usize {
    5
}

fn default_sled_path() -> String {
    dirs::home_dir()
        .map(|home| home.join(".cortex").join("patterns.db"))
        .unwrap_or_else(|| PathBuf::from("./cortex-patterns.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_max_connections() -> u32 {
    5
}

fn default_hashing_dimensions() -> usize {
    384
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            similarity_floor: default_similarity_floor(),
            min_instances: default_min_instances(),
            embed_batch_size: default_embed_batch_size(),
            keyword_count: default_keyword_count(),
            dominance_ratio: default_dominance_ratio(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            candidate_pool: default_candidate_pool(),
            match_threshold: default_match_threshold(),
            default_limit: None,
            preview_chars: default_preview_chars(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            contradiction_decay: default_contradiction_decay(),
            exclusion_threshold: default_exclusion_threshold(),
            induction_keywords: default_induction_keywords(),
        }
    }
}

impl CortexConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    /// Discover configuration file using precedence order
    /// 1. CORTEX_CONFIG_PATH environment variable
    /// 2. ./cortex-config.yaml (working directory)
    /// 3. ~/.cortex/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CORTEX_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("./cortex-config.yaml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".cortex").join("config.yaml");
            if user.exists() {
                return Some(user);
            }
        }

        None
    }

    /// Load from an explicit path, else the discovered path, else defaults
    pub fn load_or_default(path: Option<PathBuf>) -> anyhow::Result<Self> {
        match path.or_else(Self::discover_config) {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = CortexConfig::from_yaml_str("").unwrap();
        assert_eq!(config.discovery.sample_size, 500);
        assert_eq!(config.discovery.min_instances, 5);
        assert_eq!(config.learning.exclusion_threshold, 0.8);
        assert_eq!(config.execution.default_limit, None);
        assert!(matches!(config.embedder, EmbedderConfig::Hashing { dimensions: 384 }));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
discovery:
  similarity_floor: 0.6
execution:
  default_limit: 25
learning:
  learning_rate: 0.2
storage:
  backend: postgres
  connection_string: postgres://cortex@localhost/cortex
embedder:
  provider: ollama
  endpoint: http://localhost:11434
  model: nomic-embed-text
"#;
        let config = CortexConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.discovery.similarity_floor, 0.6);
        assert_eq!(config.discovery.sample_size, 500);
        assert_eq!(config.learning.rule().learning_rate, 0.2);
        assert_eq!(config.execution.default_limit, Some(25));
        match config.storage {
            StorageConfig::Postgres { max_connections, .. } => assert_eq!(max_connections, 5),
            other => panic!("unexpected storage {:?}", other),
        }
        assert!(matches!(config.embedder, EmbedderConfig::Ollama { .. }));
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cortex-config.yaml");

        let mut config = CortexConfig::default();
        config.storage = StorageConfig::InMemory;
        config.to_yaml_file(&path).unwrap();

        let loaded = CortexConfig::from_yaml_file(&path).unwrap();
        assert!(matches!(loaded.storage, StorageConfig::InMemory));
    }
}
