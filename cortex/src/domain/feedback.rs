// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Append-only human correctness judgments on individual matches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pattern::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub Uuid);

impl FeedbackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FeedbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Correct,
    Incorrect,
    Partial,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Correct => "correct",
            Judgment::Incorrect => "incorrect",
            Judgment::Partial => "partial",
        }
    }
}

impl FromStr for Judgment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correct" => Ok(Judgment::Correct),
            "incorrect" => Ok(Judgment::Incorrect),
            "partial" => Ok(Judgment::Partial),
            other => Err(format!("unknown judgment '{}' (expected correct|incorrect|partial)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub pattern_id: PatternId,
    pub content_id: String,
    pub judgment: Judgment,
    pub explanation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        pattern_id: PatternId,
        content_id: impl Into<String>,
        judgment: Judgment,
        explanation: Option<String>,
    ) -> Self {
        Self {
            id: FeedbackId::new(),
            pattern_id,
            content_id: content_id.into(),
            judgment,
            explanation,
            created_at: Utc::now(),
        }
    }
}
