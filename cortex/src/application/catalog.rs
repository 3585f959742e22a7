// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern Catalog
//!
//! In-process index over the [`PatternRepository`]: patterns by id and name,
//! plus each pattern's learned constraints. The catalog is hydrated once from
//! the store and then kept in step with it by write-through: every mutation
//! reaches the repository first and is reflected in the index only after the
//! write succeeded, so a read never observes state the store does not hold.
//!
//! The catalog also owns the per-pattern write locks. Feedback and usage
//! counters both rewrite the stored pattern, so both take the same lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::constraint::LearnedConstraint;
use crate::domain::error::PatternError;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::pattern::{Pattern, PatternId};
use crate::domain::repository::{sort_constraints, FeedbackOutcome, PatternRepository};

#[derive(Default)]
struct Index {
    patterns: HashMap<PatternId, Pattern>,
    names: HashMap<String, PatternId>,
    constraints: HashMap<PatternId, Vec<LearnedConstraint>>,
}

pub struct PatternCatalog {
    repository: Arc<dyn PatternRepository>,
    index: RwLock<Index>,
    locks: DashMap<PatternId, Arc<Mutex<()>>>,
}

impl PatternCatalog {
    pub fn new(repository: Arc<dyn PatternRepository>) -> Self {
        Self {
            repository,
            index: RwLock::new(Index::default()),
            locks: DashMap::new(),
        }
    }

    /// Replace the index with the repository's contents
    pub async fn hydrate(&self) -> Result<usize, PatternError> {
        let snapshot = self.repository.load_snapshot().await?;

        let mut index = Index::default();
        for pattern in snapshot.patterns {
            index.names.insert(pattern.name.clone(), pattern.id);
            index.patterns.insert(pattern.id, pattern);
        }
        for constraint in snapshot.constraints {
            index.constraints.entry(constraint.pattern_id).or_default().push(constraint);
        }
        for constraints in index.constraints.values_mut() {
            sort_constraints(constraints);
        }

        let count = index.patterns.len();
        *self.index.write().await = index;
        info!(patterns = count, "Hydrated pattern catalog");
        Ok(count)
    }

    /// Resolve a pattern by name, falling back to its id
    pub async fn resolve(&self, reference: &str) -> Result<Pattern, PatternError> {
        let index = self.index.read().await;
        let by_name = index.names.get(reference).and_then(|id| index.patterns.get(id));
        let by_id = || {
            Uuid::parse_str(reference)
                .ok()
                .and_then(|uuid| index.patterns.get(&PatternId(uuid)))
        };

        by_name
            .or_else(by_id)
            .cloned()
            .ok_or_else(|| PatternError::PatternNotFound(reference.to_string()))
    }

    pub async fn get(&self, id: PatternId) -> Option<Pattern> {
        self.index.read().await.patterns.get(&id).cloned()
    }

    pub async fn contains_name(&self, name: &str) -> bool {
        self.index.read().await.names.contains_key(name)
    }

    /// All patterns, oldest first
    pub async fn list(&self) -> Vec<Pattern> {
        let index = self.index.read().await;
        let mut patterns: Vec<Pattern> = index.patterns.values().cloned().collect();
        patterns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        patterns
    }

    /// Constraints of a pattern, most recent first
    pub async fn constraints(&self, id: PatternId) -> Vec<LearnedConstraint> {
        self.index.read().await.constraints.get(&id).cloned().unwrap_or_default()
    }

    pub async fn feedback_history(&self, id: PatternId) -> Result<Vec<FeedbackRecord>, PatternError> {
        Ok(self.repository.feedback_for(id).await?)
    }

    /// Persist a new pattern and index it
    pub async fn insert(&self, pattern: Pattern) -> Result<Pattern, PatternError> {
        if self.contains_name(&pattern.name).await {
            return Err(PatternError::DuplicateName(pattern.name));
        }

        self.repository.save_pattern(&pattern).await?;

        let mut index = self.index.write().await;
        index.names.insert(pattern.name.clone(), pattern.id);
        index.patterns.insert(pattern.id, pattern.clone());
        debug!(pattern_id = %pattern.id, name = %pattern.name, "Indexed pattern");
        Ok(pattern)
    }

    /// Serializes writers of one pattern (feedback, usage counters)
    pub fn lock_for(&self, id: PatternId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Bump usage counters of a pattern
    pub async fn record_usage(&self, id: PatternId) -> Result<Pattern, PatternError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let updated = self.repository.record_usage(id, Utc::now()).await?;
        self.index.write().await.patterns.insert(id, updated.clone());
        Ok(updated)
    }

    /// Write one feedback outcome; the caller holds the pattern's lock
    pub async fn commit_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), PatternError> {
        self.repository.apply_feedback(outcome).await?;

        let mut index = self.index.write().await;
        index.patterns.insert(outcome.pattern.id, outcome.pattern.clone());

        let constraints = index.constraints.entry(outcome.pattern.id).or_default();
        for constraint in &outcome.constraints {
            match constraints.iter_mut().find(|c| c.id == constraint.id) {
                Some(slot) => *slot = constraint.clone(),
                None => constraints.push(constraint.clone()),
            }
        }
        sort_constraints(constraints);
        Ok(())
    }
}
