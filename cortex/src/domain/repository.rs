// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern Store Interface
//!
//! Persistence contract for the Cortex aggregate (a [`Pattern`] together with
//! its [`LearnedConstraint`]s and [`FeedbackRecord`] history). The trait lives
//! in the domain layer; implementations live in `crate::infrastructure`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryPatternRepository` | process memory (tests, ephemeral use) |
//! | `SledPatternRepository` | embedded `sled` key-value store |
//! | `PostgresPatternRepository` | PostgreSQL via `sqlx` |
//!
//! Every write completes before the call returns; there is no window in which
//! a later read in the same process observes stale state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::constraint::LearnedConstraint;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::pattern::{Pattern, PatternId};

/// Everything one feedback call changes, written atomically
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub record: FeedbackRecord,
    /// Pattern with updated success rate / dimension weights
    pub pattern: Pattern,
    /// Constraints to insert or replace (matched by id)
    pub constraints: Vec<LearnedConstraint>,
}

/// Full contents of a store, used to hydrate the in-process catalog
#[derive(Debug, Clone, Default)]
pub struct PatternSnapshot {
    pub patterns: Vec<Pattern>,
    pub constraints: Vec<LearnedConstraint>,
}

#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Insert or replace a pattern. A different pattern already holding the
    /// same name is a `Conflict`.
    async fn save_pattern(&self, pattern: &Pattern) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PatternId) -> Result<Option<Pattern>, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Pattern>, RepositoryError>;

    async fn list_patterns(&self) -> Result<Vec<Pattern>, RepositoryError>;

    /// Increment the usage counter and stamp `last_used_at`; returns the
    /// updated pattern
    async fn record_usage(&self, pattern_id: PatternId, used_at: DateTime<Utc>) -> Result<Pattern, RepositoryError>;

    /// Constraints of a pattern, most recently learned first
    async fn constraints_for(&self, pattern_id: PatternId) -> Result<Vec<LearnedConstraint>, RepositoryError>;

    /// Feedback history of a pattern in the order it was recorded
    async fn feedback_for(&self, pattern_id: PatternId) -> Result<Vec<FeedbackRecord>, RepositoryError>;

    /// Append the feedback record, replace the pattern and upsert constraints
    /// as one all-or-nothing write
    async fn apply_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), RepositoryError>;

    /// Every pattern and constraint in the store
    async fn load_snapshot(&self) -> Result<PatternSnapshot, RepositoryError> {
        let patterns = self.list_patterns().await?;
        let mut constraints = Vec::new();
        for pattern in &patterns {
            constraints.extend(self.constraints_for(pattern.id).await?);
        }
        Ok(PatternSnapshot { patterns, constraints })
    }
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Name already taken: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for RepositoryError {
    fn from(err: sled::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

/// Most recent first, ties by id for a stable order
pub fn sort_constraints(constraints: &mut [LearnedConstraint]) {
    constraints.sort_by(|a, b| b.learned_at.cmp(&a.learned_at).then_with(|| a.id.0.cmp(&b.id.0)));
}
