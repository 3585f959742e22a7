// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Learned Constraints
//!
//! A [`LearnedConstraint`] is an additive restriction a pattern acquires from
//! `incorrect` feedback. Each constraint describes a condition on a content
//! node; when the condition holds the match is penalized:
//!
//! - `confidence >= exclusion_threshold`: the match is dropped.
//! - otherwise: the score is multiplied by `1 - confidence`.
//!
//! Constraints belong to exactly one pattern and are never deleted; their
//! confidence rises with corroborating feedback and decays when a penalized
//! node is later judged `correct`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::content::ContentNode;
use crate::domain::feedback::FeedbackId;
use crate::domain::pattern::{DimensionType, PatternId};
use crate::domain::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub Uuid);

impl ConstraintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConstraintId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable node attributes a constraint can key on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeAttribute {
    AuthorRole,
    SourceType,
    HasMedia,
}

impl NodeAttribute {
    pub fn value_of(&self, node: &ContentNode) -> String {
        match self {
            NodeAttribute::AuthorRole => node.author_role.to_lowercase(),
            NodeAttribute::SourceType => node.source_type.to_lowercase(),
            NodeAttribute::HasMedia => node.has_media.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeAttribute::AuthorRole => "author role",
            NodeAttribute::SourceType => "source type",
            NodeAttribute::HasMedia => "has media",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConstraintKind {
    /// Penalize nodes whose attribute equals `value`
    #[serde(rename_all = "camelCase")]
    ExcludeAttribute { attribute: NodeAttribute, value: String },

    /// Penalize nodes whose text contains `keyword`
    #[serde(rename_all = "camelCase")]
    ExcludeKeyword { keyword: String },

    /// Penalize nodes scoring below `threshold` on one dimension
    #[serde(rename_all = "camelCase")]
    DimensionFloor {
        dimension_index: usize,
        dimension_type: DimensionType,
        threshold: f64,
    },
}

impl ConstraintKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstraintKind::ExcludeAttribute { .. } => "exclude_attribute",
            ConstraintKind::ExcludeKeyword { .. } => "exclude_keyword",
            ConstraintKind::DimensionFloor { .. } => "dimension_floor",
        }
    }

    /// Whether the condition holds for a node.
    ///
    /// `dimension_scores` are the node's raw per-dimension scores for the owning
    /// pattern; floor constraints never trigger without them.
    pub fn triggers(&self, node: &ContentNode, dimension_scores: Option<&[f64]>) -> bool {
        match self {
            ConstraintKind::ExcludeAttribute { attribute, value } => attribute.value_of(node) == *value,
            ConstraintKind::ExcludeKeyword { keyword } => text::contains_word(&node.text, keyword),
            ConstraintKind::DimensionFloor { dimension_index, threshold, .. } => dimension_scores
                .and_then(|scores| scores.get(*dimension_index))
                .map(|score| *score < *threshold)
                .unwrap_or(false),
        }
    }

    /// Equivalent constraints restrict the same feature; floors compare by dimension only
    pub fn is_equivalent(&self, other: &ConstraintKind) -> bool {
        match (self, other) {
            (
                ConstraintKind::ExcludeAttribute { attribute: a, value: v },
                ConstraintKind::ExcludeAttribute { attribute: b, value: w },
            ) => a == b && v == w,
            (ConstraintKind::ExcludeKeyword { keyword: a }, ConstraintKind::ExcludeKeyword { keyword: b }) => a == b,
            (
                ConstraintKind::DimensionFloor { dimension_index: a, .. },
                ConstraintKind::DimensionFloor { dimension_index: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    /// Fold an equivalent proposal into this condition; floors keep the higher threshold
    pub fn merged_with(&self, proposal: &ConstraintKind) -> ConstraintKind {
        match (self, proposal) {
            (
                ConstraintKind::DimensionFloor {
                    dimension_index,
                    dimension_type,
                    threshold,
                },
                ConstraintKind::DimensionFloor {
                    threshold: proposed, ..
                },
            ) => ConstraintKind::DimensionFloor {
                dimension_index: *dimension_index,
                dimension_type: *dimension_type,
                threshold: threshold.max(*proposed),
            },
            _ => self.clone(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ConstraintKind::ExcludeAttribute { attribute, value } => {
                format!("exclude matches where {} is '{}'", attribute.label(), value)
            }
            ConstraintKind::ExcludeKeyword { keyword } => {
                format!("exclude matches mentioning '{}'", keyword)
            }
            ConstraintKind::DimensionFloor { dimension_index, dimension_type, threshold } => format!(
                "exclude matches where {} dimension #{} scores below {:.3}",
                dimension_type.as_str(),
                dimension_index,
                threshold
            ),
        }
    }
}

/// Outcome of applying a pattern's constraints to one scored node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintVerdict {
    Keep(f64),
    Exclude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedConstraint {
    pub id: ConstraintId,
    pub pattern_id: PatternId,
    pub description: String,
    pub constraint: ConstraintKind,
    pub confidence: f64,
    pub source_feedback: Vec<FeedbackId>,
    pub learned_at: DateTime<Utc>,
}

impl LearnedConstraint {
    pub fn new(pattern_id: PatternId, constraint: ConstraintKind, confidence: f64, source: FeedbackId) -> Self {
        Self {
            id: ConstraintId::new(),
            pattern_id,
            description: constraint.describe(),
            constraint,
            confidence: confidence.clamp(0.0, 1.0),
            source_feedback: vec![source],
            learned_at: Utc::now(),
        }
    }

    pub fn triggers(&self, node: &ContentNode, dimension_scores: Option<&[f64]>) -> bool {
        self.constraint.triggers(node, dimension_scores)
    }
}

/// Fold every constraint into a score; exclusion wins over down-weighting
pub fn apply_constraints(
    constraints: &[LearnedConstraint],
    node: &ContentNode,
    dimension_scores: Option<&[f64]>,
    score: f64,
    exclusion_threshold: f64,
) -> ConstraintVerdict {
    let mut adjusted = score;
    for constraint in constraints {
        if !constraint.triggers(node, dimension_scores) {
            continue;
        }
        if constraint.confidence >= exclusion_threshold {
            return ConstraintVerdict::Exclude;
        }
        adjusted *= 1.0 - constraint.confidence;
    }
    ConstraintVerdict::Keep(adjusted)
}
