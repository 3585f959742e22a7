// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the Cortex bounded context
//! Published on the event bus for observability and integration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constraint::ConstraintId;
use super::feedback::Judgment;
use super::pattern::PatternId;

/// Cortex domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    /// A pattern was described, composed, specialized or promoted
    PatternCreated {
        pattern_id: PatternId,
        name: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// A pattern was evaluated against the corpus
    PatternExecuted {
        pattern_id: PatternId,
        match_count: usize,
        usage_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Feedback was recorded and the success rate moved
    FeedbackRecorded {
        pattern_id: PatternId,
        content_id: String,
        judgment: Judgment,
        old_success_rate: f64,
        new_success_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// A new constraint was induced from incorrect feedback
    ConstraintLearned {
        pattern_id: PatternId,
        constraint_id: ConstraintId,
        description: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// An existing constraint's confidence changed
    ConstraintUpdated {
        pattern_id: PatternId,
        constraint_id: ConstraintId,
        old_confidence: f64,
        new_confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A discovery run finished
    DiscoveryCompleted {
        sampled_nodes: usize,
        clusters_found: usize,
        candidates: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A discovery candidate became a pattern
    CandidatePromoted {
        candidate_id: Uuid,
        pattern_id: PatternId,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::PatternCreated { timestamp, .. } => *timestamp,
            CortexEvent::PatternExecuted { timestamp, .. } => *timestamp,
            CortexEvent::FeedbackRecorded { timestamp, .. } => *timestamp,
            CortexEvent::ConstraintLearned { timestamp, .. } => *timestamp,
            CortexEvent::ConstraintUpdated { timestamp, .. } => *timestamp,
            CortexEvent::DiscoveryCompleted { timestamp, .. } => *timestamp,
            CortexEvent::CandidatePromoted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::PatternCreated { .. } => "pattern_created",
            CortexEvent::PatternExecuted { .. } => "pattern_executed",
            CortexEvent::FeedbackRecorded { .. } => "feedback_recorded",
            CortexEvent::ConstraintLearned { .. } => "constraint_learned",
            CortexEvent::ConstraintUpdated { .. } => "constraint_updated",
            CortexEvent::DiscoveryCompleted { .. } => "discovery_completed",
            CortexEvent::CandidatePromoted { .. } => "candidate_promoted",
        }
    }
}
