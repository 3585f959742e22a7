// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory pattern store for tests and ephemeral sessions

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::constraint::LearnedConstraint;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::pattern::{Pattern, PatternId};
use crate::domain::repository::{sort_constraints, FeedbackOutcome, PatternRepository, RepositoryError};

#[derive(Default)]
struct State {
    patterns: HashMap<PatternId, Pattern>,
    names: HashMap<String, PatternId>,
    constraints: HashMap<PatternId, Vec<LearnedConstraint>>,
    feedback: HashMap<PatternId, Vec<FeedbackRecord>>,
}

#[derive(Clone, Default)]
pub struct InMemoryPatternRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryPatternRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternRepository for InMemoryPatternRepository {
    async fn save_pattern(&self, pattern: &Pattern) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.names.get(&pattern.name) {
            if *existing != pattern.id {
                return Err(RepositoryError::Conflict(pattern.name.clone()));
            }
        }

        if let Some(previous) = state.patterns.get(&pattern.id) {
            if previous.name != pattern.name {
                let stale = previous.name.clone();
                state.names.remove(&stale);
            }
        }

        state.names.insert(pattern.name.clone(), pattern.id);
        state.patterns.insert(pattern.id, pattern.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PatternId) -> Result<Option<Pattern>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.patterns.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Pattern>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.names.get(name).and_then(|id| state.patterns.get(id)).cloned())
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, RepositoryError> {
        let state = self.state.read().await;
        let mut patterns: Vec<Pattern> = state.patterns.values().cloned().collect();
        patterns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(patterns)
    }

    async fn record_usage(&self, pattern_id: PatternId, used_at: DateTime<Utc>) -> Result<Pattern, RepositoryError> {
        let mut state = self.state.write().await;
        let pattern = state
            .patterns
            .get_mut(&pattern_id)
            .ok_or_else(|| RepositoryError::NotFound(pattern_id.to_string()))?;
        pattern.record_usage(used_at);
        Ok(pattern.clone())
    }

    async fn constraints_for(&self, pattern_id: PatternId) -> Result<Vec<LearnedConstraint>, RepositoryError> {
        let state = self.state.read().await;
        let mut constraints = state.constraints.get(&pattern_id).cloned().unwrap_or_default();
        sort_constraints(&mut constraints);
        Ok(constraints)
    }

    async fn feedback_for(&self, pattern_id: PatternId) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.feedback.get(&pattern_id).cloned().unwrap_or_default())
    }

    async fn apply_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let pattern_id = outcome.pattern.id;

        if !state.patterns.contains_key(&pattern_id) {
            return Err(RepositoryError::NotFound(pattern_id.to_string()));
        }

        state.patterns.insert(pattern_id, outcome.pattern.clone());

        let existing = state.constraints.entry(pattern_id).or_default();
        for constraint in &outcome.constraints {
            match existing.iter_mut().find(|c| c.id == constraint.id) {
                Some(slot) => *slot = constraint.clone(),
                None => existing.push(constraint.clone()),
            }
        }

        state.feedback.entry(pattern_id).or_default().push(outcome.record.clone());
        Ok(())
    }
}
