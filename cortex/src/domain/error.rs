// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cortex Error Taxonomy
//!
//! Every fallible Cortex operation resolves to a [`PatternError`]. Collaborator
//! failures (embedder, content store, pattern store) are mapped into the
//! `EmbedderUnavailable` / `StoreUnavailable` variants at the application
//! boundary so callers see a closed set of failure modes.
//!
//! The presentation layer turns each variant into a structured
//! `{ "success": false, "error": { "code", "message" } }` envelope using
//! [`PatternError::code`].

use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    #[error("Pattern description must not be empty")]
    EmptyDescription,

    #[error("A pattern named '{0}' already exists")]
    DuplicateName(String),

    #[error("Content node not found: {0}")]
    ContentNotFound(String),

    #[error("Discovery candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("Embedding service unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("Pattern store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PatternError {
    /// Stable machine-readable code used in API error payloads
    pub fn code(&self) -> &'static str {
        match self {
            PatternError::PatternNotFound(_) => "pattern_not_found",
            PatternError::InvalidComposition(_) => "invalid_composition",
            PatternError::EmptyDescription => "empty_description",
            PatternError::DuplicateName(_) => "duplicate_name",
            PatternError::ContentNotFound(_) => "content_not_found",
            PatternError::CandidateNotFound(_) => "candidate_not_found",
            PatternError::EmbedderUnavailable(_) => "embedder_unavailable",
            PatternError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<RepositoryError> for PatternError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(name) => PatternError::DuplicateName(name),
            other => PatternError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<crate::domain::content::EmbedderError> for PatternError {
    fn from(err: crate::domain::content::EmbedderError) -> Self {
        PatternError::EmbedderUnavailable(err.to_string())
    }
}

impl From<crate::domain::content::ContentStoreError> for PatternError {
    fn from(err: crate::domain::content::ContentStoreError) -> Self {
        PatternError::StoreUnavailable(err.to_string())
    }
}
