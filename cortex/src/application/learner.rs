// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Learner
//!
//! Turns correctness feedback on individual matches into pattern state:
//!
//! - **correct**: raise the success rate; reinforce constraints that kept the
//!   node and contradict the ones that would have penalized it; shift atomic
//!   dimension weights toward the dimensions the node scored well on.
//! - **partial**: half a success-rate step, nothing else.
//! - **incorrect**: lower the success rate, shift weights away, and induce a
//!   constraint from the feature that best separates the pattern's incorrect
//!   nodes from its correct ones.
//!
//! Feedback on one pattern is serialized through the catalog's per-pattern
//! lock: induction reads the whole feedback history, and two concurrent
//! inductions would otherwise both miss each other's record. Every change of
//! one call is computed first and written in a single repository call.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::application::catalog::PatternCatalog;
use crate::application::executor::PatternExecutor;
use crate::domain::config::LearningConfig;
use crate::domain::constraint::{ConstraintId, ConstraintKind, LearnedConstraint, NodeAttribute};
use crate::domain::content::{ContentNode, ContentStore};
use crate::domain::error::PatternError;
use crate::domain::events::CortexEvent;
use crate::domain::feedback::{FeedbackRecord, Judgment};
use crate::domain::learning::LearningRule;
use crate::domain::pattern::{Pattern, PatternDefinition};
use crate::domain::repository::FeedbackOutcome;
use crate::domain::text;
use crate::infrastructure::event_bus::EventBus;

/// What one feedback call changed
#[derive(Debug, Clone)]
pub struct FeedbackResult {
    pub record: FeedbackRecord,
    pub pattern: Pattern,
    pub old_success_rate: f64,
    /// Constraints created or updated by this call
    pub changed_constraints: Vec<LearnedConstraint>,
    /// All constraints of the pattern after the call, most recent first
    pub constraints: Vec<LearnedConstraint>,
}

/// A node judged earlier (or now), with its dimension scores
struct Judged {
    node: ContentNode,
    scores: Option<Vec<f64>>,
}

impl Judged {
    fn triggers(&self, kind: &ConstraintKind) -> bool {
        kind.triggers(&self.node, self.scores.as_deref())
    }
}

/// A feature of the offending node, scored against the history
struct Proposal {
    kind: ConstraintKind,
    separation: f64,
    support: usize,
}

fn kind_rank(kind: &ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::ExcludeAttribute { .. } => 0,
        ConstraintKind::ExcludeKeyword { .. } => 1,
        ConstraintKind::DimensionFloor { .. } => 2,
    }
}

pub struct Learner {
    catalog: Arc<PatternCatalog>,
    content_store: Arc<dyn ContentStore>,
    executor: Arc<PatternExecutor>,
    config: LearningConfig,
    rule: LearningRule,
    event_bus: EventBus,
}

impl Learner {
    pub fn new(
        catalog: Arc<PatternCatalog>,
        content_store: Arc<dyn ContentStore>,
        executor: Arc<PatternExecutor>,
        config: LearningConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            rule: config.rule(),
            catalog,
            content_store,
            executor,
            config,
            event_bus,
        }
    }

    pub fn rule(&self) -> LearningRule {
        self.rule
    }

    pub async fn feedback(
        &self,
        reference: &str,
        content_id: &str,
        judgment: Judgment,
        explanation: Option<String>,
    ) -> Result<FeedbackResult, PatternError> {
        let resolved = self.catalog.resolve(reference).await?;

        let lock = self.catalog.lock_for(resolved.id);
        let _guard = lock.lock().await;

        let mut pattern = self
            .catalog
            .get(resolved.id)
            .await
            .ok_or_else(|| PatternError::PatternNotFound(reference.to_string()))?;
        let node = self
            .content_store
            .get(content_id)
            .await?
            .ok_or_else(|| PatternError::ContentNotFound(content_id.to_string()))?;

        let record = FeedbackRecord::new(pattern.id, content_id, judgment, explanation);
        let old_success_rate = pattern.success_rate;
        pattern.success_rate = self.rule.update_success_rate(pattern.success_rate, judgment);

        let judged = self.judge(&pattern, vec![node]).await?.remove(0);
        if let (PatternDefinition::Atomic { dimensions }, Some(scores)) = (&mut pattern.definition, &judged.scores) {
            if self.rule.adjust_weights(dimensions, scores, judgment) {
                debug!(pattern = %pattern.name, "Adjusted dimension weights");
            }
        }

        let existing = self.catalog.constraints(pattern.id).await;
        let mut changed = Vec::new();
        let mut updates = Vec::new();

        match judgment {
            Judgment::Correct => {
                for constraint in &existing {
                    let old = constraint.confidence;
                    let new = if judged.triggers(&constraint.constraint) {
                        self.rule.contradict(old)
                    } else {
                        self.rule.reinforce(old)
                    };
                    if (new - old).abs() > f64::EPSILON {
                        let mut updated = constraint.clone();
                        updated.confidence = new;
                        updated.source_feedback.push(record.id);
                        updates.push((updated.id, old, new));
                        changed.push(updated);
                    }
                }
            }
            Judgment::Incorrect => {
                if let Some(proposal) = self.induce(&pattern, &record, judged).await? {
                    let confidence = self.rule.induction_confidence(proposal.separation, proposal.support);
                    match existing.iter().find(|c| c.constraint.is_equivalent(&proposal.kind)) {
                        Some(current) => {
                            let mut updated = current.clone();
                            updated.constraint = current.constraint.merged_with(&proposal.kind);
                            updated.description = updated.constraint.describe();
                            updated.confidence = current.confidence.max(confidence);
                            updated.source_feedback.push(record.id);
                            updates.push((updated.id, current.confidence, updated.confidence));
                            changed.push(updated);
                        }
                        None => changed.push(LearnedConstraint::new(pattern.id, proposal.kind, confidence, record.id)),
                    }
                }
            }
            Judgment::Partial => {}
        }

        let outcome = FeedbackOutcome {
            record: record.clone(),
            pattern: pattern.clone(),
            constraints: changed.clone(),
        };
        self.catalog.commit_feedback(&outcome).await?;

        self.publish(&outcome, old_success_rate, &updates);
        metrics::counter!("cortex_feedback_total", "judgment" => judgment.as_str()).increment(1);
        info!(
            pattern = %pattern.name,
            content_id,
            judgment = judgment.as_str(),
            success_rate = pattern.success_rate,
            constraints_changed = changed.len(),
            "Recorded feedback"
        );

        Ok(FeedbackResult {
            record,
            constraints: self.catalog.constraints(pattern.id).await,
            pattern,
            old_success_rate,
            changed_constraints: changed,
        })
    }

    /// Attach dimension scores (atomic patterns only)
    async fn judge(&self, pattern: &Pattern, mut nodes: Vec<ContentNode>) -> Result<Vec<Judged>, PatternError> {
        let scores = match pattern.dimensions() {
            Some(dimensions) if !nodes.is_empty() => {
                let scores = self.executor.dimension_scores(dimensions, &mut nodes).await?;
                scores.into_iter().map(Some).collect()
            }
            _ => vec![None; nodes.len()],
        };

        Ok(nodes
            .into_iter()
            .zip(scores)
            .map(|(node, scores)| Judged { node, scores })
            .collect())
    }

    /// Pick the feature of `offender` that best separates incorrect from correct history
    async fn induce(
        &self,
        pattern: &Pattern,
        record: &FeedbackRecord,
        offender: Judged,
    ) -> Result<Option<Proposal>, PatternError> {
        let history = self.catalog.feedback_history(pattern.id).await?;

        let mut correct_ids = Vec::new();
        let mut incorrect_ids = Vec::new();
        let mut seen = HashSet::from([record.content_id.clone()]);
        for past in &history {
            match past.judgment {
                Judgment::Correct if !correct_ids.contains(&past.content_id) => correct_ids.push(past.content_id.clone()),
                Judgment::Incorrect if seen.insert(past.content_id.clone()) => incorrect_ids.push(past.content_id.clone()),
                _ => {}
            }
        }
        // a node later judged incorrect no longer counts as correct
        correct_ids.retain(|id| !seen.contains(id));

        let correct = self.judge(pattern, self.fetch(&correct_ids).await?).await?;
        let mut incorrect = self.judge(pattern, self.fetch(&incorrect_ids).await?).await?;
        incorrect.insert(0, offender);

        let candidates = self.candidate_features(pattern, &incorrect[0], &correct);
        let best = candidates
            .into_iter()
            .filter(|kind| !correct.iter().any(|c| c.triggers(kind)))
            .map(|kind| {
                let support = incorrect.iter().filter(|j| j.triggers(&kind)).count();
                let separation = support as f64 / incorrect.len() as f64;
                Proposal {
                    kind,
                    separation,
                    support,
                }
            })
            .filter(|p| p.support > 0)
            .reduce(|best, next| {
                let better = next
                    .separation
                    .total_cmp(&best.separation)
                    .then_with(|| next.support.cmp(&best.support))
                    .then_with(|| kind_rank(&best.kind).cmp(&kind_rank(&next.kind)));
                if better.is_gt() {
                    next
                } else {
                    best
                }
            });

        match &best {
            Some(p) => debug!(
                pattern = %pattern.name,
                feature = %p.kind.describe(),
                separation = p.separation,
                support = p.support,
                "Induced constraint candidate"
            ),
            None => debug!(pattern = %pattern.name, "No discriminating feature found"),
        }
        Ok(best)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<ContentNode>, PatternError> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.content_store.get(id).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn candidate_features(&self, pattern: &Pattern, offender: &Judged, correct: &[Judged]) -> Vec<ConstraintKind> {
        let node = &offender.node;
        let mut features = vec![
            ConstraintKind::ExcludeAttribute {
                attribute: NodeAttribute::AuthorRole,
                value: NodeAttribute::AuthorRole.value_of(node),
            },
            ConstraintKind::ExcludeAttribute {
                attribute: NodeAttribute::SourceType,
                value: NodeAttribute::SourceType.value_of(node),
            },
        ];
        if node.has_media {
            features.push(ConstraintKind::ExcludeAttribute {
                attribute: NodeAttribute::HasMedia,
                value: NodeAttribute::HasMedia.value_of(node),
            });
        }

        for keyword in text::top_keywords(&node.text, self.config.induction_keywords) {
            features.push(ConstraintKind::ExcludeKeyword { keyword });
        }

        if let (Some(dimensions), Some(scores)) = (pattern.dimensions(), offender.scores.as_ref()) {
            if !correct.is_empty() {
                for (index, (dimension, offender_score)) in dimensions.iter().zip(scores).enumerate() {
                    let lowest_correct = correct
                        .iter()
                        .filter_map(|c| c.scores.as_ref().and_then(|s| s.get(index)).copied())
                        .reduce(f64::min);
                    if let Some(lowest) = lowest_correct {
                        if lowest > *offender_score {
                            features.push(ConstraintKind::DimensionFloor {
                                dimension_index: index,
                                dimension_type: dimension.dimension_type,
                                threshold: (lowest + offender_score) / 2.0,
                            });
                        }
                    }
                }
            }
        }

        features
    }

    fn publish(&self, outcome: &FeedbackOutcome, old_success_rate: f64, updates: &[(ConstraintId, f64, f64)]) {
        let now = Utc::now();
        self.event_bus.publish(CortexEvent::FeedbackRecorded {
            pattern_id: outcome.pattern.id,
            content_id: outcome.record.content_id.clone(),
            judgment: outcome.record.judgment,
            old_success_rate,
            new_success_rate: outcome.pattern.success_rate,
            timestamp: now,
        });

        for constraint in &outcome.constraints {
            match updates.iter().find(|(id, _, _)| *id == constraint.id) {
                Some((id, old, new)) => self.event_bus.publish(CortexEvent::ConstraintUpdated {
                    pattern_id: outcome.pattern.id,
                    constraint_id: *id,
                    old_confidence: *old,
                    new_confidence: *new,
                    timestamp: now,
                }),
                None => {
                    metrics::counter!("cortex_constraints_learned_total").increment(1);
                    info!(
                        pattern_id = %outcome.pattern.id,
                        constraint = %constraint.description,
                        confidence = constraint.confidence,
                        "Learned constraint"
                    );
                    self.event_bus.publish(CortexEvent::ConstraintLearned {
                        pattern_id: outcome.pattern.id,
                        constraint_id: constraint.id,
                        description: constraint.description.clone(),
                        confidence: constraint.confidence,
                        timestamp: now,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ExecutionConfig;
    use crate::domain::pattern::{Dimension, DimensionType};
    use crate::infrastructure::content_store::InMemoryContentStore;
    use crate::infrastructure::embedding_client::HashingEmbedder;
    use crate::infrastructure::memory_repository::InMemoryPatternRepository;
    use std::collections::BTreeSet;

    struct Fixture {
        catalog: Arc<PatternCatalog>,
        learner: Learner,
        pattern: Pattern,
    }

    async fn fixture() -> Fixture {
        let catalog = Arc::new(PatternCatalog::new(Arc::new(InMemoryPatternRepository::new())));
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::with_nodes(vec![
            ContentNode::new("c1", "what is consciousness really", "user", "chat"),
            ContentNode::new("e1", "invoice overdue payment", "user", "email"),
            ContentNode::new("e2", "newsletter subscription renewal", "user", "email"),
            ContentNode::new("e3", "shipping confirmation receipt", "user", "email"),
        ]));
        let embedder = Arc::new(HashingEmbedder::default());
        let bus = EventBus::new(64);
        let learning = LearningConfig::default();
        let executor = Arc::new(PatternExecutor::new(
            catalog.clone(),
            store.clone(),
            embedder,
            ExecutionConfig::default(),
            &learning,
            bus.clone(),
        ));
        let pattern = catalog
            .insert(Pattern::atomic(
                "questions",
                "questions about consciousness",
                BTreeSet::new(),
                vec![Dimension::new(DimensionType::Topic, "consciousness", 1.0)],
            ))
            .await
            .unwrap();

        Fixture {
            learner: Learner::new(catalog.clone(), store, executor, learning, bus),
            catalog,
            pattern,
        }
    }

    #[tokio::test]
    async fn test_correct_feedback_raises_success_rate() {
        let f = fixture().await;
        let result = f.learner.feedback("questions", "c1", Judgment::Correct, None).await.unwrap();
        assert!((result.pattern.success_rate - 0.55).abs() < 1e-9);
        assert!(result.changed_constraints.is_empty());
        assert_eq!(f.catalog.feedback_history(f.pattern.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_feedback_half_step() {
        let f = fixture().await;
        let result = f.learner.feedback("questions", "c1", Judgment::Partial, None).await.unwrap();
        assert!((result.pattern.success_rate - 0.525).abs() < 1e-9);
        assert!(result.constraints.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_writes_nothing() {
        let f = fixture().await;
        let result = f.learner.feedback("questions", "nope", Judgment::Incorrect, None).await;
        assert!(matches!(result, Err(PatternError::ContentNotFound(_))));
        assert!(f.catalog.feedback_history(f.pattern.id).await.unwrap().is_empty());
        assert_eq!(f.catalog.get(f.pattern.id).await.unwrap().success_rate, 0.5);
    }

    #[tokio::test]
    async fn test_repeated_incorrect_source_builds_confidence() {
        let f = fixture().await;
        f.learner.feedback("questions", "c1", Judgment::Correct, None).await.unwrap();

        let mut confidences = Vec::new();
        for id in ["e1", "e2", "e3"] {
            let result = f.learner.feedback("questions", id, Judgment::Incorrect, None).await.unwrap();
            assert_eq!(result.constraints.len(), 1);
            let constraint = &result.constraints[0];
            assert_eq!(
                constraint.constraint,
                ConstraintKind::ExcludeAttribute {
                    attribute: NodeAttribute::SourceType,
                    value: "email".to_string(),
                }
            );
            confidences.push(constraint.confidence);
        }

        assert!((confidences[0] - 0.5).abs() < 1e-9);
        assert!((confidences[1] - 2.0 / 3.0).abs() < 1e-9);
        assert!((confidences[2] - 0.75).abs() < 1e-9);
        assert_eq!(f.catalog.constraints(f.pattern.id).await[0].source_feedback.len(), 3);
    }

    #[tokio::test]
    async fn test_correct_feedback_contradicts_triggering_constraint() {
        let f = fixture().await;
        f.learner.feedback("questions", "c1", Judgment::Correct, None).await.unwrap();
        f.learner.feedback("questions", "e1", Judgment::Incorrect, None).await.unwrap();

        let result = f.learner.feedback("questions", "e2", Judgment::Correct, None).await.unwrap();
        assert_eq!(result.changed_constraints.len(), 1);
        assert!((result.constraints[0].confidence - 0.25).abs() < 1e-9);
    }
}
