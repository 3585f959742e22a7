// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sled Pattern Repository
//!
//! Embedded, durable `PatternRepository` backed by a `sled` database. Four
//! trees hold the aggregate:
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `patterns` | pattern id (16 bytes) | pattern JSON |
//! | `pattern_names` | pattern name (UTF-8) | pattern id |
//! | `constraints` | pattern id ++ constraint id | constraint JSON |
//! | `feedback` | pattern id ++ sequence (u64 BE) | feedback JSON |
//!
//! Multi-tree writes run inside a sled transaction and every write is flushed
//! before the call returns.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use crate::domain::constraint::LearnedConstraint;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::pattern::{Pattern, PatternId};
use crate::domain::repository::{sort_constraints, FeedbackOutcome, PatternRepository, RepositoryError};

const PATTERNS_TREE: &str = "patterns";
const NAMES_TREE: &str = "pattern_names";
const CONSTRAINTS_TREE: &str = "constraints";
const FEEDBACK_TREE: &str = "feedback";

pub struct SledPatternRepository {
    db: Db,
    patterns: Tree,
    names: Tree,
    constraints: Tree,
    feedback: Tree,
}

impl SledPatternRepository {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RepositoryError::Database(format!("Failed to create {}: {}", parent.display(), e)))?;
            }
        }

        debug!(path = %path.display(), "Opening sled pattern store");
        Self::from_db(sled::open(path)?)
    }

    pub fn from_db(db: Db) -> Result<Self, RepositoryError> {
        Ok(Self {
            patterns: db.open_tree(PATTERNS_TREE)?,
            names: db.open_tree(NAMES_TREE)?,
            constraints: db.open_tree(CONSTRAINTS_TREE)?,
            feedback: db.open_tree(FEEDBACK_TREE)?,
            db,
        })
    }

    async fn flush(&self) -> Result<(), RepositoryError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

fn pattern_key(id: PatternId) -> Vec<u8> {
    id.0.as_bytes().to_vec()
}

fn compound_key(pattern_id: PatternId, suffix: &[u8]) -> Vec<u8> {
    let mut key = pattern_key(pattern_id);
    key.extend_from_slice(suffix);
    key
}

fn abort(err: RepositoryError) -> ConflictableTransactionError<RepositoryError> {
    ConflictableTransactionError::Abort(err)
}

fn map_transaction_error(err: TransactionError<RepositoryError>) -> RepositoryError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => err.into(),
    }
}

#[async_trait]
impl PatternRepository for SledPatternRepository {
    async fn save_pattern(&self, pattern: &Pattern) -> Result<(), RepositoryError> {
        let id_key = pattern_key(pattern.id);
        let payload = serde_json::to_vec(pattern)?;

        let result: TransactionResult<(), RepositoryError> =
            (&self.patterns, &self.names).transaction(|(patterns, names)| {
                if let Some(owner) = names.get(pattern.name.as_bytes())? {
                    if &owner[..] != id_key.as_slice() {
                        return Err(abort(RepositoryError::Conflict(pattern.name.clone())));
                    }
                }

                if let Some(previous) = patterns.get(id_key.as_slice())? {
                    let previous: Pattern = serde_json::from_slice(&previous)
                        .map_err(|e| abort(RepositoryError::Serialization(e.to_string())))?;
                    if previous.name != pattern.name {
                        names.remove(previous.name.as_bytes())?;
                    }
                }

                names.insert(pattern.name.as_bytes(), id_key.as_slice())?;
                patterns.insert(id_key.as_slice(), payload.as_slice())?;
                Ok(())
            });
        result.map_err(map_transaction_error)?;

        self.flush().await
    }

    async fn find_by_id(&self, id: PatternId) -> Result<Option<Pattern>, RepositoryError> {
        match self.patterns.get(pattern_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Pattern>, RepositoryError> {
        match self.names.get(name.as_bytes())? {
            Some(id) => match self.patterns.get(id)? {
                Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, RepositoryError> {
        let mut patterns = Vec::new();
        for entry in self.patterns.iter() {
            let (_, value) = entry?;
            patterns.push(serde_json::from_slice::<Pattern>(&value)?);
        }
        patterns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(patterns)
    }

    async fn record_usage(&self, pattern_id: PatternId, used_at: DateTime<Utc>) -> Result<Pattern, RepositoryError> {
        let id_key = pattern_key(pattern_id);

        let result: TransactionResult<Pattern, RepositoryError> = self.patterns.transaction(|patterns| {
            let bytes = patterns
                .get(id_key.as_slice())?
                .ok_or_else(|| abort(RepositoryError::NotFound(pattern_id.to_string())))?;
            let mut pattern: Pattern = serde_json::from_slice(&bytes)
                .map_err(|e| abort(RepositoryError::Serialization(e.to_string())))?;
            pattern.record_usage(used_at);

            let payload = serde_json::to_vec(&pattern)
                .map_err(|e| abort(RepositoryError::Serialization(e.to_string())))?;
            patterns.insert(id_key.as_slice(), payload)?;
            Ok(pattern)
        });
        let pattern = result.map_err(map_transaction_error)?;

        self.flush().await?;
        Ok(pattern)
    }

    async fn constraints_for(&self, pattern_id: PatternId) -> Result<Vec<LearnedConstraint>, RepositoryError> {
        let mut constraints = Vec::new();
        for entry in self.constraints.scan_prefix(pattern_key(pattern_id)) {
            let (_, value) = entry?;
            constraints.push(serde_json::from_slice::<LearnedConstraint>(&value)?);
        }
        sort_constraints(&mut constraints);
        Ok(constraints)
    }

    async fn feedback_for(&self, pattern_id: PatternId) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let mut records = Vec::new();
        for entry in self.feedback.scan_prefix(pattern_key(pattern_id)) {
            let (_, value) = entry?;
            records.push(serde_json::from_slice::<FeedbackRecord>(&value)?);
        }
        Ok(records)
    }

    async fn apply_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), RepositoryError> {
        let pattern_id = outcome.pattern.id;
        let id_key = pattern_key(pattern_id);
        let pattern_payload = serde_json::to_vec(&outcome.pattern)?;

        let sequence = self.db.generate_id()?;
        let feedback_key = compound_key(pattern_id, &sequence.to_be_bytes());
        let feedback_payload = serde_json::to_vec(&outcome.record)?;

        let mut constraint_rows = Vec::with_capacity(outcome.constraints.len());
        for constraint in &outcome.constraints {
            constraint_rows.push((
                compound_key(pattern_id, constraint.id.0.as_bytes()),
                serde_json::to_vec(constraint)?,
            ));
        }

        let result: TransactionResult<(), RepositoryError> = (&self.patterns, &self.constraints, &self.feedback)
            .transaction(|(patterns, constraints, feedback)| {
                if patterns.get(id_key.as_slice())?.is_none() {
                    return Err(abort(RepositoryError::NotFound(pattern_id.to_string())));
                }

                patterns.insert(id_key.as_slice(), pattern_payload.as_slice())?;
                for (key, value) in &constraint_rows {
                    constraints.insert(key.as_slice(), value.as_slice())?;
                }
                feedback.insert(feedback_key.as_slice(), feedback_payload.as_slice())?;
                Ok(())
            });
        result.map_err(map_transaction_error)?;

        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraint::{ConstraintKind, NodeAttribute};
    use crate::domain::feedback::Judgment;
    use crate::domain::pattern::{Dimension, DimensionType};
    use std::collections::BTreeSet;

    fn pattern(name: &str) -> Pattern {
        Pattern::atomic(
            name,
            "open questions about consciousness",
            BTreeSet::from(["philosophy".to_string()]),
            vec![Dimension::new(DimensionType::Semantic, "open questions about consciousness", 1.0)],
        )
    }

    #[tokio::test]
    async fn test_patterns_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.db");
        let p = pattern("consciousness");

        {
            let repo = SledPatternRepository::open(&path).unwrap();
            repo.save_pattern(&p).await.unwrap();
            repo.record_usage(p.id, Utc::now()).await.unwrap();

            let record = FeedbackRecord::new(p.id, "n1", Judgment::Incorrect, Some("an email".to_string()));
            let constraint = LearnedConstraint::new(
                p.id,
                ConstraintKind::ExcludeAttribute {
                    attribute: NodeAttribute::SourceType,
                    value: "email".to_string(),
                },
                0.5,
                record.id,
            );
            let mut updated = repo.find_by_id(p.id).await.unwrap().unwrap();
            updated.success_rate = 0.45;
            repo.apply_feedback(&FeedbackOutcome {
                record,
                pattern: updated,
                constraints: vec![constraint],
            })
            .await
            .unwrap();
        }

        let repo = SledPatternRepository::open(&path).unwrap();
        let loaded = repo.find_by_name("consciousness").await.unwrap().unwrap();
        assert_eq!(loaded.id, p.id);
        assert_eq!(loaded.usage_count, 1);
        assert_eq!(loaded.success_rate, 0.45);
        assert_eq!(loaded.dimensions().unwrap().len(), 1);

        let constraints = repo.constraints_for(p.id).await.unwrap();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].confidence, 0.5);

        let feedback = repo.feedback_for(p.id).await.unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].explanation.as_deref(), Some("an email"));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let repo = SledPatternRepository::from_db(db).unwrap();

        repo.save_pattern(&pattern("dup")).await.unwrap();
        let result = repo.save_pattern(&pattern("dup")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.list_patterns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feedback_for_unknown_pattern_writes_nothing() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let repo = SledPatternRepository::from_db(db).unwrap();

        let ghost = pattern("ghost");
        let record = FeedbackRecord::new(ghost.id, "n1", Judgment::Correct, None);
        let result = repo
            .apply_feedback(&FeedbackOutcome {
                record,
                pattern: ghost.clone(),
                constraints: vec![],
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert!(repo.feedback_for(ghost.id).await.unwrap().is_empty());
        assert!(repo.find_by_id(ghost.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feedback_is_chronological() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let repo = SledPatternRepository::from_db(db).unwrap();
        let p = pattern("ordered");
        repo.save_pattern(&p).await.unwrap();

        for content_id in ["a", "b", "c"] {
            repo.apply_feedback(&FeedbackOutcome {
                record: FeedbackRecord::new(p.id, content_id, Judgment::Correct, None),
                pattern: p.clone(),
                constraints: vec![],
            })
            .await
            .unwrap();
        }

        let ids: Vec<String> = repo.feedback_for(p.id).await.unwrap().into_iter().map(|r| r.content_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
