// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern System
//!
//! Facade over the Cortex services. Every collaborator is passed in by the
//! caller (see [`crate::application::repository_factory`] for config-driven
//! construction); the system holds no global state of its own.
//!
//! The first operation on a fresh system hydrates the catalog from the
//! repository and seeds the built-in patterns. That happens exactly once,
//! even under concurrent first calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::catalog::PatternCatalog;
use crate::application::composer::{Composer, DimensionExtractor};
use crate::application::discovery::{DiscoveryEngine, DiscoveryRun};
use crate::application::executor::{ExecutionOutcome, PatternExecutor};
use crate::application::learner::{FeedbackResult, Learner};
use crate::domain::config::CortexConfig;
use crate::domain::constraint::LearnedConstraint;
use crate::domain::content::{ContentStore, Embedder};
use crate::domain::discovery::{CandidateStatus, DiscoveredPatternCandidate, DiscoveryRequest};
use crate::domain::error::PatternError;
use crate::domain::events::CortexEvent;
use crate::domain::feedback::Judgment;
use crate::domain::pattern::{CompositionOperator, Pattern};
use crate::domain::repository::PatternRepository;
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

/// A pattern together with its learned constraints
#[derive(Debug, Clone)]
pub struct PatternDetails {
    pub pattern: Pattern,
    pub constraints: Vec<LearnedConstraint>,
}

pub struct PatternSystem {
    catalog: Arc<PatternCatalog>,
    composer: Composer,
    discovery: DiscoveryEngine,
    executor: Arc<PatternExecutor>,
    learner: Learner,
    event_bus: EventBus,
    loaded: OnceCell<()>,
    /// Candidates of the most recent discovery run, promoted ones marked
    candidates: RwLock<HashMap<Uuid, DiscoveredPatternCandidate>>,
}

impl PatternSystem {
    pub fn new(
        repository: Arc<dyn PatternRepository>,
        content_store: Arc<dyn ContentStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn DimensionExtractor>,
        config: &CortexConfig,
    ) -> Self {
        Self::with_event_bus(
            repository,
            content_store,
            embedder,
            extractor,
            config,
            EventBus::with_default_capacity(),
        )
    }

    pub fn with_event_bus(
        repository: Arc<dyn PatternRepository>,
        content_store: Arc<dyn ContentStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn DimensionExtractor>,
        config: &CortexConfig,
        event_bus: EventBus,
    ) -> Self {
        let catalog = Arc::new(PatternCatalog::new(repository));
        let executor = Arc::new(PatternExecutor::new(
            catalog.clone(),
            content_store.clone(),
            embedder.clone(),
            config.execution.clone(),
            &config.learning,
            event_bus.clone(),
        ));

        Self {
            composer: Composer::new(catalog.clone(), extractor, event_bus.clone()),
            discovery: DiscoveryEngine::new(content_store.clone(), embedder, config.discovery.clone()),
            learner: Learner::new(
                catalog.clone(),
                content_store,
                executor.clone(),
                config.learning.clone(),
                event_bus.clone(),
            ),
            executor,
            catalog,
            event_bus,
            loaded: OnceCell::new(),
            candidates: RwLock::new(HashMap::new()),
        }
    }

    /// Hydrate the catalog and seed built-ins; runs once per system
    pub async fn ensure_loaded(&self) -> Result<(), PatternError> {
        self.loaded
            .get_or_try_init(|| async {
                let stored = self.catalog.hydrate().await?;
                let seeded = self.composer.seed_builtins().await?;
                info!(stored, seeded, "Pattern system ready");
                Ok::<(), PatternError>(())
            })
            .await?;
        Ok(())
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryRun, PatternError> {
        self.ensure_loaded().await?;
        let started = Instant::now();

        let run = self.discovery.discover(request).await.map_err(|e| {
            warn!(error = %e, "Discovery run failed");
            e
        })?;

        *self.candidates.write().await = run.candidates.iter().map(|c| (c.id, c.clone())).collect();

        self.event_bus.publish(CortexEvent::DiscoveryCompleted {
            sampled_nodes: run.sampled_nodes,
            clusters_found: run.clusters_found,
            candidates: run.candidates.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        Ok(run)
    }

    pub async fn describe(&self, description: &str, name: Option<&str>, tags: &[String]) -> Result<Pattern, PatternError> {
        self.ensure_loaded().await?;
        self.composer.describe(description, name, tags).await
    }

    pub async fn execute(
        &self,
        reference: &str,
        limit: Option<usize>,
        min_confidence: Option<f64>,
    ) -> Result<ExecutionOutcome, PatternError> {
        self.ensure_loaded().await?;
        self.executor.execute(reference, limit, min_confidence).await
    }

    /// Patterns oldest first, optionally without built-ins, filtered to any of `tags`
    pub async fn list(&self, include_builtin: bool, tags: &[String]) -> Result<Vec<Pattern>, PatternError> {
        self.ensure_loaded().await?;
        Ok(self
            .catalog
            .list()
            .await
            .into_iter()
            .filter(|p| include_builtin || !p.builtin)
            .filter(|p| p.has_any_tag(tags))
            .collect())
    }

    pub async fn get(&self, reference: &str) -> Result<PatternDetails, PatternError> {
        self.ensure_loaded().await?;
        let pattern = self.catalog.resolve(reference).await?;
        let constraints = self.catalog.constraints(pattern.id).await;
        Ok(PatternDetails { pattern, constraints })
    }

    pub async fn feedback(
        &self,
        reference: &str,
        content_id: &str,
        judgment: Judgment,
        explanation: Option<String>,
    ) -> Result<FeedbackResult, PatternError> {
        self.ensure_loaded().await?;
        self.learner.feedback(reference, content_id, judgment, explanation).await
    }

    /// Constraints of a pattern, most recent first
    pub async fn get_constraints(&self, reference: &str) -> Result<Vec<LearnedConstraint>, PatternError> {
        self.ensure_loaded().await?;
        let pattern = self.catalog.resolve(reference).await?;
        Ok(self.catalog.constraints(pattern.id).await)
    }

    pub async fn compose(
        &self,
        name: &str,
        description: &str,
        operator: CompositionOperator,
        operands: &[String],
        tags: &[String],
    ) -> Result<Pattern, PatternError> {
        self.ensure_loaded().await?;
        self.composer.compose(name, description, operator, operands, tags).await
    }

    pub async fn specialize(
        &self,
        name: &str,
        description: &str,
        base: &str,
        specialization: &str,
    ) -> Result<Pattern, PatternError> {
        self.ensure_loaded().await?;
        self.composer.specialize(name, description, base, specialization).await
    }

    /// Persist a candidate of the latest discovery run as an atomic pattern
    pub async fn promote(&self, candidate_id: Uuid, name: Option<&str>, tags: &[String]) -> Result<Pattern, PatternError> {
        self.ensure_loaded().await?;

        let mut candidates = self.candidates.write().await;
        let candidate = candidates
            .get_mut(&candidate_id)
            .filter(|c| c.status == CandidateStatus::Candidate)
            .ok_or_else(|| PatternError::CandidateNotFound(candidate_id.to_string()))?;

        let pattern = self.composer.promote(candidate, name, tags).await?;
        candidate.status = CandidateStatus::Promoted;
        info!(candidate_id = %candidate.id, pattern = %pattern.name, "Promoted discovery candidate");
        Ok(pattern)
    }

    /// Candidates of the most recent discovery run, best first
    pub async fn candidates(&self) -> Vec<DiscoveredPatternCandidate> {
        let mut candidates: Vec<DiscoveredPatternCandidate> = self.candidates.read().await.values().cloned().collect();
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.instance_count.cmp(&a.instance_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }
}
