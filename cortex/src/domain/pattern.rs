// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern Model
//!
//! A [`Pattern`] is either **atomic** (a weighted list of [`Dimension`]s scored
//! directly against content nodes) or **composed** (an algebraic operator
//! applied to existing patterns). The definition is an explicit tagged variant
//! so composed trees can be evaluated by a plain recursive function.
//!
//! Patterns are never structurally mutated after creation. Feedback learning
//! may adjust `success_rate` and dimension weights, and execution bumps the
//! usage counters; refinement always produces a new pattern.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::PatternError;

/// Success rate assigned to freshly created patterns
pub const INITIAL_SUCCESS_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semantic category of a dimension; selects the scoring procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    /// Whole-description similarity
    Semantic,
    Tone,
    Topic,
    Structure,
    /// Matches the node's author role by name
    Role,
    /// Matches the node's source type by name
    Source,
}

impl DimensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::Semantic => "semantic",
            DimensionType::Tone => "tone",
            DimensionType::Topic => "topic",
            DimensionType::Structure => "structure",
            DimensionType::Role => "role",
            DimensionType::Source => "source",
        }
    }

    /// Whether scoring uses an embedding prototype rather than node attributes
    pub fn uses_embedding(&self) -> bool {
        !matches!(self, DimensionType::Role | DimensionType::Source)
    }
}

/// One scored axis of an atomic pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    pub description: String,
    pub weight: f64,
    /// Set once feedback has moved this dimension's weight
    #[serde(default)]
    pub learned: bool,
}

impl Dimension {
    pub fn new(dimension_type: DimensionType, description: impl Into<String>, weight: f64) -> Self {
        Self {
            dimension_type,
            description: description.into(),
            weight: weight.max(0.0),
            learned: false,
        }
    }
}

/// Algebraic operators available for composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositionOperator {
    And,
    Or,
    Not,
    Sequence { ordered: bool },
    Refine,
}

impl CompositionOperator {
    pub fn name(&self) -> &'static str {
        match self {
            CompositionOperator::And => "AND",
            CompositionOperator::Or => "OR",
            CompositionOperator::Not => "NOT",
            CompositionOperator::Sequence { .. } => "SEQUENCE",
            CompositionOperator::Refine => "REFINE",
        }
    }

    /// Check the operand-count invariant for this operator
    pub fn validate_arity(&self, operand_count: usize) -> Result<(), PatternError> {
        match self {
            CompositionOperator::Not | CompositionOperator::Refine => {
                if operand_count != 2 {
                    return Err(PatternError::InvalidComposition(format!(
                        "{} requires exactly 2 operands, got {}",
                        self.name(),
                        operand_count
                    )));
                }
            }
            CompositionOperator::And | CompositionOperator::Or | CompositionOperator::Sequence { .. } => {
                if operand_count < 2 {
                    return Err(PatternError::InvalidComposition(format!(
                        "{} requires at least 2 operands, got {}",
                        self.name(),
                        operand_count
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parse an operator name; `ordered` only applies to SEQUENCE
    pub fn parse(name: &str, ordered: bool) -> Result<Self, PatternError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(CompositionOperator::And),
            "OR" => Ok(CompositionOperator::Or),
            "NOT" => Ok(CompositionOperator::Not),
            "SEQUENCE" => Ok(CompositionOperator::Sequence { ordered }),
            "REFINE" => Ok(CompositionOperator::Refine),
            other => Err(PatternError::InvalidComposition(format!("unknown operator '{}'", other))),
        }
    }
}

impl FromStr for CompositionOperator {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, true)
    }
}

impl fmt::Display for CompositionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternDefinition {
    Atomic {
        dimensions: Vec<Dimension>,
    },
    Composed {
        operator: CompositionOperator,
        operands: Vec<PatternId>,
    },
}

impl PatternDefinition {
    /// Build a composed definition, enforcing the operator's arity
    pub fn composed(operator: CompositionOperator, operands: Vec<PatternId>) -> Result<Self, PatternError> {
        operator.validate_arity(operands.len())?;
        Ok(PatternDefinition::Composed { operator, operands })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PatternDefinition::Atomic { .. } => "atomic",
            PatternDefinition::Composed { .. } => "composed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub definition: PatternDefinition,
    pub usage_count: u64,
    pub success_rate: f64,
    #[serde(default)]
    pub builtin: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn atomic(
        name: impl Into<String>,
        description: impl Into<String>,
        tags: BTreeSet<String>,
        dimensions: Vec<Dimension>,
    ) -> Self {
        Self::with_definition(name, description, tags, PatternDefinition::Atomic { dimensions })
    }

    pub fn composed(
        name: impl Into<String>,
        description: impl Into<String>,
        tags: BTreeSet<String>,
        operator: CompositionOperator,
        operands: Vec<PatternId>,
    ) -> Result<Self, PatternError> {
        let definition = PatternDefinition::composed(operator, operands)?;
        Ok(Self::with_definition(name, description, tags, definition))
    }

    fn with_definition(
        name: impl Into<String>,
        description: impl Into<String>,
        tags: BTreeSet<String>,
        definition: PatternDefinition,
    ) -> Self {
        Self {
            id: PatternId::new(),
            name: name.into(),
            description: description.into(),
            tags,
            definition,
            usage_count: 0,
            success_rate: INITIAL_SUCCESS_RATE,
            builtin: false,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    pub fn dimensions(&self) -> Option<&[Dimension]> {
        match &self.definition {
            PatternDefinition::Atomic { dimensions } => Some(dimensions),
            PatternDefinition::Composed { .. } => None,
        }
    }

    pub fn operator(&self) -> Option<CompositionOperator> {
        match &self.definition {
            PatternDefinition::Composed { operator, .. } => Some(*operator),
            PatternDefinition::Atomic { .. } => None,
        }
    }

    pub fn operands(&self) -> &[PatternId] {
        match &self.definition {
            PatternDefinition::Composed { operands, .. } => operands,
            PatternDefinition::Atomic { .. } => &[],
        }
    }

    /// Human-facing type label: `atomic` or the operator name
    pub fn type_label(&self) -> String {
        match &self.definition {
            PatternDefinition::Atomic { .. } => "atomic".to_string(),
            PatternDefinition::Composed { operator, .. } => operator.name().to_string(),
        }
    }

    pub fn record_usage(&mut self, used_at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used_at = Some(used_at);
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.is_empty() || tags.iter().any(|t| self.tags.contains(t))
    }
}
