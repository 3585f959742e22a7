// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Executor
//!
//! Evaluates a pattern's definition tree against the content store.
//!
//! ## Atomic patterns
//!
//! Candidates are the union of vector searches for every dimension prototype
//! (the embedding of the dimension description). Each candidate is scored per
//! dimension and the scores are combined as a weighted mean. The pattern's
//! learned constraints then down-weight or exclude the candidate, and whatever
//! remains at or above `match_threshold` is a match.
//!
//! | Dimension type | Score |
//! |----------------|-------|
//! | `role` | 1.0 when the node's author role is a word of the description |
//! | `source` | 1.0 when the node's source type is a word of the description |
//! | anything else | cosine(node embedding, prototype), clamped to [0, 1] |
//!
//! ## Composed patterns
//!
//! Operands are evaluated recursively and combined per operator. Results are
//! memoized by pattern id for the duration of one `execute` call, so an operand
//! shared across the tree is evaluated once.
//!
//! | Operator | Result set | Score |
//! |----------|------------|-------|
//! | AND | intersection | minimum |
//! | OR | union | maximum |
//! | NOT | base minus exclusion | base |
//! | REFINE | base filtered by refinement | base |
//! | SEQUENCE (ordered) | nodes on a same-thread chain p1 → … → pn with non-decreasing positions | best chain product |
//! | SEQUENCE (unordered) | as AND | as AND |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::catalog::PatternCatalog;
use crate::domain::config::{ExecutionConfig, LearningConfig};
use crate::domain::constraint::{apply_constraints, ConstraintVerdict};
use crate::domain::content::{cosine_similarity, ContentNode, ContentStore, Embedder};
use crate::domain::error::PatternError;
use crate::domain::events::CortexEvent;
use crate::domain::pattern::{CompositionOperator, Dimension, DimensionType, Pattern, PatternDefinition, PatternId};
use crate::domain::text;
use crate::infrastructure::event_bus::EventBus;

/// One scored content node in an execution result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub content_id: String,
    pub score: f64,
    pub author_role: String,
    pub source_type: String,
    pub preview: String,
    pub has_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub position: u32,
}

/// Result of executing one pattern
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// The pattern with its usage counters already bumped
    pub pattern: Pattern,
    pub matches: Vec<PatternMatch>,
    /// Matches passing `min_confidence` before the limit was applied
    pub total_matches: usize,
}

type ScoreMap = HashMap<String, f64>;

/// Per-call state: memoized operand results, fetched nodes and prototypes
#[derive(Default)]
struct EvaluationContext {
    results: HashMap<PatternId, Arc<ScoreMap>>,
    nodes: HashMap<String, ContentNode>,
    prototypes: HashMap<String, Vec<f32>>,
}

/// Score of a node on one dimension
pub fn dimension_score(dimension: &Dimension, prototype: Option<&[f32]>, node: &ContentNode) -> f64 {
    match dimension.dimension_type {
        DimensionType::Role => binary(text::contains_word(&dimension.description, &node.author_role)),
        DimensionType::Source => binary(text::contains_word(&dimension.description, &node.source_type)),
        _ => match (prototype, node.embedding.as_deref()) {
            (Some(prototype), Some(embedding)) => (cosine_similarity(prototype, embedding) as f64).clamp(0.0, 1.0),
            _ => 0.0,
        },
    }
}

fn binary(hit: bool) -> f64 {
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Weighted mean of dimension scores; 0 when every weight is 0
pub fn weighted_score(dimensions: &[Dimension], scores: &[f64]) -> f64 {
    let total_weight: f64 = dimensions.iter().map(|d| d.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    dimensions.iter().zip(scores).map(|(d, s)| d.weight * s).sum::<f64>() / total_weight
}

/// Score ordering: descending score, ties by ascending content id
fn by_rank(a: (&str, f64), b: (&str, f64)) -> std::cmp::Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

pub struct PatternExecutor {
    catalog: Arc<PatternCatalog>,
    content_store: Arc<dyn ContentStore>,
    embedder: Arc<dyn Embedder>,
    config: ExecutionConfig,
    exclusion_threshold: f64,
    event_bus: EventBus,
}

impl PatternExecutor {
    pub fn new(
        catalog: Arc<PatternCatalog>,
        content_store: Arc<dyn ContentStore>,
        embedder: Arc<dyn Embedder>,
        config: ExecutionConfig,
        learning: &LearningConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            catalog,
            content_store,
            embedder,
            config,
            exclusion_threshold: learning.exclusion_threshold,
            event_bus,
        }
    }

    pub fn preview_chars(&self) -> usize {
        self.config.preview_chars
    }

    /// Evaluate a pattern, rank its matches and bump its usage counters
    pub async fn execute(
        &self,
        reference: &str,
        limit: Option<usize>,
        min_confidence: Option<f64>,
    ) -> Result<ExecutionOutcome, PatternError> {
        let pattern = self.catalog.resolve(reference).await?;
        let mut context = EvaluationContext::default();

        let scores = self.evaluate(pattern.id, &mut context).await?;

        let mut ranked: Vec<(&str, f64)> = scores.iter().map(|(id, score)| (id.as_str(), *score)).collect();
        ranked.sort_by(|a, b| by_rank(*a, *b));

        let min_confidence = min_confidence.unwrap_or(0.0);
        ranked.retain(|(_, score)| *score >= min_confidence);
        let total_matches = ranked.len();

        let matches: Vec<PatternMatch> = ranked
            .into_iter()
            .take(limit.or(self.config.default_limit).unwrap_or(usize::MAX))
            .filter_map(|(id, score)| context.nodes.get(id).map(|node| self.to_match(node, score)))
            .collect();

        let pattern = self.catalog.record_usage(pattern.id).await?;

        metrics::counter!("cortex_pattern_executions_total", "kind" => pattern.definition.kind()).increment(1);
        info!(
            pattern = %pattern.name,
            kind = %pattern.type_label(),
            matches = matches.len(),
            total_matches,
            usage_count = pattern.usage_count,
            "Executed pattern"
        );
        self.event_bus.publish(CortexEvent::PatternExecuted {
            pattern_id: pattern.id,
            match_count: matches.len(),
            usage_count: pattern.usage_count,
            timestamp: Utc::now(),
        });

        Ok(ExecutionOutcome {
            pattern,
            matches,
            total_matches,
        })
    }

    /// Raw per-dimension scores of the given nodes for an atomic pattern
    pub async fn dimension_scores(
        &self,
        dimensions: &[Dimension],
        nodes: &mut [ContentNode],
    ) -> Result<Vec<Vec<f64>>, PatternError> {
        let mut context = EvaluationContext::default();
        self.load_prototypes(dimensions, &mut context).await?;
        self.embed_missing(nodes).await?;

        Ok(nodes
            .iter()
            .map(|node| Self::score_dimensions(dimensions, &context, node))
            .collect())
    }

    fn to_match(&self, node: &ContentNode, score: f64) -> PatternMatch {
        PatternMatch {
            content_id: node.id.clone(),
            score,
            author_role: node.author_role.clone(),
            source_type: node.source_type.clone(),
            preview: node.preview(self.config.preview_chars),
            has_media: node.has_media,
            thread_id: node.thread_id.clone(),
            position: node.position,
        }
    }

    fn evaluate<'a>(
        &'a self,
        id: PatternId,
        context: &'a mut EvaluationContext,
    ) -> BoxFuture<'a, Result<Arc<ScoreMap>, PatternError>> {
        async move {
            if let Some(cached) = context.results.get(&id) {
                return Ok(cached.clone());
            }

            let pattern = self
                .catalog
                .get(id)
                .await
                .ok_or_else(|| PatternError::PatternNotFound(id.to_string()))?;

            let scores = match &pattern.definition {
                PatternDefinition::Atomic { dimensions } => self.evaluate_atomic(&pattern, dimensions, context).await?,
                PatternDefinition::Composed { operator, operands } => {
                    let mut operand_scores = Vec::with_capacity(operands.len());
                    for operand in operands {
                        operand_scores.push(self.evaluate(*operand, context).await?);
                    }
                    let combined = combine(*operator, &operand_scores, &context.nodes);
                    self.apply_pattern_constraints(&pattern, combined, &context.nodes).await
                }
            };

            debug!(pattern = %pattern.name, matches = scores.len(), "Evaluated pattern");
            let scores = Arc::new(scores);
            context.results.insert(id, scores.clone());
            Ok(scores)
        }
        .boxed()
    }

    async fn evaluate_atomic(
        &self,
        pattern: &Pattern,
        dimensions: &[Dimension],
        context: &mut EvaluationContext,
    ) -> Result<ScoreMap, PatternError> {
        self.load_prototypes(dimensions, context).await?;

        let mut candidates: BTreeMap<String, ContentNode> = BTreeMap::new();
        for dimension in dimensions {
            let Some(prototype) = context.prototypes.get(&dimension.description) else {
                continue;
            };
            for (node, _) in self.content_store.search(prototype, self.config.candidate_pool).await? {
                candidates.entry(node.id.clone()).or_insert(node);
            }
        }

        let mut nodes: Vec<ContentNode> = candidates.into_values().collect();
        self.embed_missing(&mut nodes).await?;

        let constraints = self.catalog.constraints(pattern.id).await;
        let mut scores = ScoreMap::new();
        for node in nodes {
            let dimension_scores = Self::score_dimensions(dimensions, context, &node);
            let score = weighted_score(dimensions, &dimension_scores);

            let verdict = apply_constraints(
                &constraints,
                &node,
                Some(&dimension_scores),
                score,
                self.exclusion_threshold,
            );
            if let ConstraintVerdict::Keep(adjusted) = verdict {
                if adjusted >= self.config.match_threshold {
                    scores.insert(node.id.clone(), adjusted);
                }
            }
            context.nodes.entry(node.id.clone()).or_insert(node);
        }

        Ok(scores)
    }

    async fn apply_pattern_constraints(
        &self,
        pattern: &Pattern,
        scores: ScoreMap,
        nodes: &HashMap<String, ContentNode>,
    ) -> ScoreMap {
        let constraints = self.catalog.constraints(pattern.id).await;
        if constraints.is_empty() {
            return scores;
        }

        scores
            .into_iter()
            .filter_map(|(id, score)| {
                let node = nodes.get(&id)?;
                match apply_constraints(&constraints, node, None, score, self.exclusion_threshold) {
                    ConstraintVerdict::Keep(adjusted) => Some((id, adjusted)),
                    ConstraintVerdict::Exclude => None,
                }
            })
            .collect()
    }

    fn score_dimensions(dimensions: &[Dimension], context: &EvaluationContext, node: &ContentNode) -> Vec<f64> {
        dimensions
            .iter()
            .map(|d| dimension_score(d, context.prototypes.get(&d.description).map(Vec::as_slice), node))
            .collect()
    }

    /// Embed every dimension description not yet in the context
    async fn load_prototypes(&self, dimensions: &[Dimension], context: &mut EvaluationContext) -> Result<(), PatternError> {
        let mut pending: Vec<String> = dimensions
            .iter()
            .map(|d| d.description.clone())
            .filter(|description| !context.prototypes.contains_key(description))
            .collect();
        pending.sort();
        pending.dedup();

        if pending.is_empty() {
            return Ok(());
        }

        let vectors = self.embedder.embed_batch(&pending).await?;
        for (description, vector) in pending.into_iter().zip(vectors) {
            context.prototypes.insert(description, vector);
        }
        Ok(())
    }

    async fn embed_missing(&self, nodes: &mut [ContentNode]) -> Result<(), PatternError> {
        let missing: Vec<usize> = (0..nodes.len()).filter(|&i| nodes[i].embedding.is_none()).collect();
        if missing.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = missing.iter().map(|&i| nodes[i].text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (&i, vector) in missing.iter().zip(vectors) {
            nodes[i].embedding = Some(vector);
        }
        Ok(())
    }
}

fn combine(operator: CompositionOperator, operands: &[Arc<ScoreMap>], nodes: &HashMap<String, ContentNode>) -> ScoreMap {
    match operator {
        CompositionOperator::And | CompositionOperator::Sequence { ordered: false } => intersect_min(operands),
        CompositionOperator::Or => {
            let mut union = ScoreMap::new();
            for operand in operands {
                for (id, score) in operand.iter() {
                    let entry = union.entry(id.clone()).or_insert(*score);
                    *entry = entry.max(*score);
                }
            }
            union
        }
        CompositionOperator::Not => match operands {
            [base, exclusion] => base
                .iter()
                .filter(|(id, _)| !exclusion.contains_key(*id))
                .map(|(id, score)| (id.clone(), *score))
                .collect(),
            _ => ScoreMap::new(),
        },
        CompositionOperator::Refine => match operands {
            [base, refinement] => base
                .iter()
                .filter(|(id, _)| refinement.contains_key(*id))
                .map(|(id, score)| (id.clone(), *score))
                .collect(),
            _ => ScoreMap::new(),
        },
        CompositionOperator::Sequence { ordered: true } => ordered_sequence(operands, nodes),
    }
}

fn intersect_min(operands: &[Arc<ScoreMap>]) -> ScoreMap {
    let Some((first, rest)) = operands.split_first() else {
        return ScoreMap::new();
    };

    first
        .iter()
        .filter_map(|(id, score)| {
            rest.iter()
                .try_fold(*score, |min, operand| operand.get(id).map(|s| min.min(*s)))
                .map(|min| (id.clone(), min))
        })
        .collect()
}

/// One candidate occurrence of a sequence step
struct Step<'a> {
    id: &'a str,
    position: u32,
    score: f64,
}

/// Per-thread forward/backward chain search over the operand results.
///
/// `forward[i][j]` is the best product of a chain p1 → … → pi ending at
/// occurrence j of step i; `backward[i][j]` the best product of a chain
/// pi → … → pn starting there. A node's score is the best complete chain it
/// sits on, at any step.
fn ordered_sequence(operands: &[Arc<ScoreMap>], nodes: &HashMap<String, ContentNode>) -> ScoreMap {
    let mut threads: BTreeMap<&str, Vec<Vec<Step>>> = BTreeMap::new();
    for (step, operand) in operands.iter().enumerate() {
        for (id, score) in operand.iter() {
            let Some(node) = nodes.get(id) else { continue };
            let Some(thread) = node.thread_id.as_deref() else { continue };
            let steps = threads.entry(thread).or_insert_with(|| (0..operands.len()).map(|_| Vec::new()).collect());
            steps[step].push(Step {
                id: id.as_str(),
                position: node.position,
                score: *score,
            });
        }
    }

    let mut result = ScoreMap::new();
    for steps in threads.values() {
        if steps.iter().any(Vec::is_empty) {
            continue;
        }
        let last = steps.len() - 1;

        let mut forward: Vec<Vec<Option<f64>>> = Vec::with_capacity(steps.len());
        forward.push(steps[0].iter().map(|s| Some(s.score)).collect());
        for i in 1..=last {
            let row: Vec<Option<f64>> = steps[i]
                .iter()
                .map(|current| {
                    steps[i - 1]
                        .iter()
                        .zip(&forward[i - 1])
                        .filter(|(previous, _)| previous.position <= current.position)
                        .filter_map(|(_, value)| *value)
                        .reduce(f64::max)
                        .map(|best| best * current.score)
                })
                .collect();
            forward.push(row);
        }

        let mut backward: Vec<Vec<Option<f64>>> = vec![Vec::new(); steps.len()];
        backward[last] = steps[last].iter().map(|s| Some(s.score)).collect();
        for i in (0..last).rev() {
            let row: Vec<Option<f64>> = steps[i]
                .iter()
                .map(|current| {
                    best_successor(&steps[i + 1], &backward[i + 1], current.position).map(|best| best * current.score)
                })
                .collect();
            backward[i] = row;
        }

        for (i, occurrences) in steps.iter().enumerate() {
            for (j, occurrence) in occurrences.iter().enumerate() {
                let Some(prefix) = forward[i][j] else { continue };
                let chain = if i == last {
                    Some(prefix)
                } else {
                    best_successor(&steps[i + 1], &backward[i + 1], occurrence.position).map(|suffix| prefix * suffix)
                };
                if let Some(chain) = chain {
                    let entry = result.entry(occurrence.id.to_string()).or_insert(chain);
                    *entry = entry.max(chain);
                }
            }
        }
    }

    result
}

fn best_successor(next: &[Step], values: &[Option<f64>], position: u32) -> Option<f64> {
    next.iter()
        .zip(values)
        .filter(|(step, _)| step.position >= position)
        .filter_map(|(_, value)| *value)
        .reduce(f64::max)
}
