// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Pattern Repository
//!
//! `PatternRepository` backed by the `patterns`, `learned_constraints` and
//! `pattern_feedback` tables (schema in `cortex/migrations/`). Each row keeps
//! the aggregate's JSON payload in a JSONB column; the scalar columns exist for
//! lookups and ordering only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use crate::domain::constraint::LearnedConstraint;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::pattern::{Pattern, PatternId};
use crate::domain::repository::{sort_constraints, FeedbackOutcome, PatternRepository, RepositoryError};

/// Schema migrations for the pattern tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresPatternRepository {
    pool: PgPool,
}

impl PostgresPatternRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to apply migrations: {}", e)))?;

        info!(migrations = MIGRATOR.iter().count(), "Connected to PostgreSQL pattern store");
        Ok(Self::new(pool))
    }
}

fn save_error(err: sqlx::Error, name: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => RepositoryError::Conflict(name.to_string()),
        _ => RepositoryError::Database(format!("Failed to save pattern: {}", err)),
    }
}

fn pattern_from_row(row: &sqlx::postgres::PgRow) -> Result<Pattern, RepositoryError> {
    let payload: serde_json::Value = row.get("payload");
    serde_json::from_value(payload)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize pattern: {}", e)))
}

#[async_trait]
impl PatternRepository for PostgresPatternRepository {
    async fn save_pattern(&self, pattern: &Pattern) -> Result<(), RepositoryError> {
        let payload = serde_json::to_value(pattern)?;

        sqlx::query(
            r#"
            INSERT INTO patterns (id, name, kind, builtin, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                payload = EXCLUDED.payload,
                updated_at = NOW()
            "#,
        )
        .bind(pattern.id.0)
        .bind(&pattern.name)
        .bind(pattern.definition.kind())
        .bind(pattern.builtin)
        .bind(payload)
        .bind(pattern.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| save_error(e, &pattern.name))?;

        Ok(())
    }

    async fn find_by_id(&self, id: PatternId) -> Result<Option<Pattern>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM patterns WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pattern_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Pattern>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM patterns WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pattern_from_row).transpose()
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, RepositoryError> {
        let rows = sqlx::query("SELECT payload FROM patterns ORDER BY created_at ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(pattern_from_row).collect()
    }

    async fn record_usage(&self, pattern_id: PatternId, used_at: DateTime<Utc>) -> Result<Pattern, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT payload FROM patterns WHERE id = $1 FOR UPDATE")
            .bind(pattern_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(pattern_id.to_string()))?;

        let mut pattern = pattern_from_row(&row)?;
        pattern.record_usage(used_at);

        sqlx::query("UPDATE patterns SET payload = $2, updated_at = NOW() WHERE id = $1")
            .bind(pattern_id.0)
            .bind(serde_json::to_value(&pattern)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(pattern)
    }

    async fn constraints_for(&self, pattern_id: PatternId) -> Result<Vec<LearnedConstraint>, RepositoryError> {
        let rows = sqlx::query("SELECT payload FROM learned_constraints WHERE pattern_id = $1")
            .bind(pattern_id.0)
            .fetch_all(&self.pool)
            .await?;

        let mut constraints = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            constraints.push(serde_json::from_value::<LearnedConstraint>(payload)?);
        }
        sort_constraints(&mut constraints);
        Ok(constraints)
    }

    async fn feedback_for(&self, pattern_id: PatternId) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT payload FROM pattern_feedback WHERE pattern_id = $1 ORDER BY seq ASC")
            .bind(pattern_id.0)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            records.push(serde_json::from_value::<FeedbackRecord>(payload)?);
        }
        Ok(records)
    }

    async fn apply_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), RepositoryError> {
        let pattern_id = outcome.pattern.id;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE patterns SET payload = $2, updated_at = NOW() WHERE id = $1")
            .bind(pattern_id.0)
            .bind(serde_json::to_value(&outcome.pattern)?)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(pattern_id.to_string()));
        }

        for constraint in &outcome.constraints {
            sqlx::query(
                r#"
                INSERT INTO learned_constraints (id, pattern_id, constraint_type, confidence, payload, learned_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    confidence = EXCLUDED.confidence,
                    payload = EXCLUDED.payload
                "#,
            )
            .bind(constraint.id.0)
            .bind(pattern_id.0)
            .bind(constraint.constraint.type_name())
            .bind(constraint.confidence)
            .bind(serde_json::to_value(constraint)?)
            .bind(constraint.learned_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO pattern_feedback (id, pattern_id, content_id, judgment, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(outcome.record.id.0)
        .bind(pattern_id.0)
        .bind(&outcome.record.content_id)
        .bind(outcome.record.judgment.as_str())
        .bind(serde_json::to_value(&outcome.record)?)
        .bind(outcome.record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::PatternError;
    use crate::domain::feedback::Judgment;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::collections::BTreeSet;
    use std::fmt;

    #[derive(Debug)]
    struct StubDatabaseError {
        unique: bool,
    }

    impl fmt::Display for StubDatabaseError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl std::error::Error for StubDatabaseError {}

    impl DatabaseError for StubDatabaseError {
        fn message(&self) -> &str {
            if self.unique {
                "duplicate key value violates unique constraint \"patterns_name_key\""
            } else {
                "null value in column \"payload\" violates not-null constraint"
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::NotNullViolation
            }
        }
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate_name() {
        let err = save_error(sqlx::Error::Database(Box::new(StubDatabaseError { unique: true })), "cooking");
        assert!(matches!(&err, RepositoryError::Conflict(name) if name == "cooking"));
        assert!(matches!(PatternError::from(err), PatternError::DuplicateName(name) if name == "cooking"));

        let other = save_error(sqlx::Error::Database(Box::new(StubDatabaseError { unique: false })), "cooking");
        assert!(matches!(other, RepositoryError::Database(_)));
        assert!(matches!(save_error(sqlx::Error::PoolTimedOut, "cooking"), RepositoryError::Database(_)));
    }

    // Runs against a live database: CORTEX_TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "requires CORTEX_TEST_DATABASE_URL"]
    async fn test_postgres_round_trip() {
        let url = std::env::var("CORTEX_TEST_DATABASE_URL").unwrap();
        let repo = PostgresPatternRepository::connect(&url, 2).await.unwrap();

        let name = format!("pg-{}", uuid::Uuid::new_v4());
        let pattern = Pattern::atomic(&name, "a stored pattern", BTreeSet::new(), vec![]);
        repo.save_pattern(&pattern).await.unwrap();

        let duplicate = Pattern::atomic(&name, "other", BTreeSet::new(), vec![]);
        assert!(matches!(repo.save_pattern(&duplicate).await, Err(RepositoryError::Conflict(_))));

        let used = repo.record_usage(pattern.id, Utc::now()).await.unwrap();
        assert_eq!(used.usage_count, 1);

        let record = FeedbackRecord::new(pattern.id, "n1", Judgment::Correct, None);
        repo.apply_feedback(&FeedbackOutcome {
            record,
            pattern: used,
            constraints: vec![],
        })
        .await
        .unwrap();

        assert_eq!(repo.feedback_for(pattern.id).await.unwrap().len(), 1);
        assert_eq!(repo.find_by_name(&name).await.unwrap().unwrap().usage_count, 1);
    }
}
