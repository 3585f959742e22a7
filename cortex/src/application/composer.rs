// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Composer
//!
//! Creates patterns. Atomic patterns come from natural-language descriptions
//! (`describe`) or promoted discovery candidates; composed patterns come from
//! the algebra (`compose`) and its `specialize` shorthand. Every pattern is
//! fully built and validated before it is persisted through the catalog.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::application::catalog::PatternCatalog;
use crate::domain::discovery::DiscoveredPatternCandidate;
use crate::domain::error::PatternError;
use crate::domain::events::CortexEvent;
use crate::domain::pattern::{CompositionOperator, Dimension, DimensionType, Pattern, PatternId};
use crate::domain::text;
use crate::infrastructure::event_bus::EventBus;

pub const SPECIALIZATION_TAG: &str = "specialization";
pub const DISCOVERED_TAG: &str = "discovered";
pub const BUILTIN_TAG: &str = "builtin";

/// Derives scoring dimensions from a pattern description
pub trait DimensionExtractor: Send + Sync {
    fn extract(&self, description: &str) -> Vec<Dimension>;
}

const ROLE_WORDS: &[&str] = &[
    "user", "assistant", "author", "authored", "written", "speaker", "system", "role", "human",
];
const SOURCE_WORDS: &[&str] = &[
    "email", "emails", "chat", "chats", "document", "documents", "note", "notes", "transcript", "transcripts",
    "forum", "post", "posts", "source", "sources", "archive",
];
const TONE_WORDS: &[&str] = &[
    "tone", "emotional", "emotion", "emotions", "feeling", "feelings", "anxious", "happy", "sad", "angry",
    "frustrated", "frustration", "uncertain", "uncertainty", "confident", "hesitant", "vulnerable", "excited",
    "worried", "calm", "sarcastic", "playful", "formal", "informal", "expressing", "mood", "doubt", "doubtful",
];
const STRUCTURE_WORDS: &[&str] = &[
    "question", "questions", "list", "lists", "step", "steps", "structure", "structured", "format", "bullet",
    "bullets", "sequence", "dialogue", "long", "short", "paragraph", "paragraphs", "code", "asking",
];
const CLAUSE_JOINERS: &[&str] = &["and", "but", "while"];

/// Clause splitting plus a small lexicon per dimension type
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDimensionExtractor;

impl HeuristicDimensionExtractor {
    fn clauses(description: &str) -> Vec<String> {
        let mut clauses = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for word in description.split_whitespace() {
            if CLAUSE_JOINERS.contains(&word.to_lowercase().as_str()) {
                clauses.push(current.join(" "));
                current.clear();
                continue;
            }

            let stripped = word.trim_end_matches([',', ';']);
            if stripped.len() != word.len() {
                if !stripped.is_empty() {
                    current.push(stripped);
                }
                clauses.push(current.join(" "));
                current.clear();
            } else {
                current.push(word);
            }
        }
        clauses.push(current.join(" "));

        clauses
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !text::content_words(c).is_empty())
            .collect()
    }

    fn classify(clause: &str) -> DimensionType {
        let tokens = text::tokenize(clause);
        let mentions = |lexicon: &[&str]| tokens.iter().any(|t| lexicon.contains(&t.as_str()));

        if mentions(ROLE_WORDS) {
            DimensionType::Role
        } else if mentions(SOURCE_WORDS) {
            DimensionType::Source
        } else if mentions(TONE_WORDS) {
            DimensionType::Tone
        } else if mentions(STRUCTURE_WORDS) {
            DimensionType::Structure
        } else {
            DimensionType::Topic
        }
    }
}

impl DimensionExtractor for HeuristicDimensionExtractor {
    fn extract(&self, description: &str) -> Vec<Dimension> {
        let clauses = Self::clauses(description);
        if clauses.len() <= 1 {
            return vec![Dimension::new(DimensionType::Semantic, description.trim(), 1.0)];
        }

        clauses
            .into_iter()
            .map(|clause| Dimension::new(Self::classify(&clause), clause, 1.0))
            .collect()
    }
}

/// `slug-of-first-words-1a2b3c`
fn generated_name(seed: &str, id: PatternId) -> String {
    let suffix: String = id.0.simple().to_string().chars().take(6).collect();
    format!("{}-{}", text::slugify(seed, 4), suffix)
}

fn tag_set(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn supplied(name: Option<&str>) -> Option<String> {
    name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

pub struct Composer {
    catalog: Arc<PatternCatalog>,
    extractor: Arc<dyn DimensionExtractor>,
    event_bus: EventBus,
}

impl Composer {
    pub fn new(catalog: Arc<PatternCatalog>, extractor: Arc<dyn DimensionExtractor>, event_bus: EventBus) -> Self {
        Self {
            catalog,
            extractor,
            event_bus,
        }
    }

    /// Create an atomic pattern from a description
    pub async fn describe(
        &self,
        description: &str,
        name: Option<&str>,
        tags: &[String],
    ) -> Result<Pattern, PatternError> {
        let pattern = self.atomic(description, name, tags)?;
        self.persist(pattern).await
    }

    fn atomic(&self, description: &str, name: Option<&str>, tags: &[String]) -> Result<Pattern, PatternError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(PatternError::EmptyDescription);
        }

        let mut dimensions = self.extractor.extract(description);
        if dimensions.is_empty() {
            dimensions.push(Dimension::new(DimensionType::Semantic, description, 1.0));
        }

        let mut pattern = Pattern::atomic(String::new(), description, tag_set(tags), dimensions);
        pattern.name = supplied(name).unwrap_or_else(|| generated_name(description, pattern.id));
        Ok(pattern)
    }

    /// Combine existing patterns with an algebraic operator
    pub async fn compose(
        &self,
        name: &str,
        description: &str,
        operator: CompositionOperator,
        operands: &[String],
        tags: &[String],
    ) -> Result<Pattern, PatternError> {
        operator.validate_arity(operands.len())?;

        let mut operand_ids = Vec::with_capacity(operands.len());
        let mut operand_names = Vec::with_capacity(operands.len());
        for reference in operands {
            let operand = self.catalog.resolve(reference).await?;
            operand_ids.push(operand.id);
            operand_names.push(operand.name);
        }

        let description = match description.trim() {
            "" => format!("{} of {}", operator.name(), operand_names.join(", ")),
            given => given.to_string(),
        };

        let mut pattern = Pattern::composed(String::new(), description, tag_set(tags), operator, operand_ids)?;
        pattern.name = supplied(Some(name)).unwrap_or_else(|| {
            generated_name(&format!("{} {}", operator.name(), operand_names.join(" ")), pattern.id)
        });

        self.persist(pattern).await
    }

    /// `describe(specialization)` as a filter, then `REFINE(base, filter)`.
    /// Both patterns are built before either is written.
    pub async fn specialize(
        &self,
        name: &str,
        description: &str,
        base: &str,
        specialization: &str,
    ) -> Result<Pattern, PatternError> {
        if specialization.trim().is_empty() {
            return Err(PatternError::EmptyDescription);
        }

        let base = self.catalog.resolve(base).await?;
        let name = match supplied(Some(name)) {
            Some(name) => name,
            None => generated_name(&format!("{} {}", base.name, specialization), PatternId::new()),
        };
        let filter_name = format!("{}-filter", name);

        for taken in [&name, &filter_name] {
            if self.catalog.contains_name(taken).await {
                return Err(PatternError::DuplicateName(taken.clone()));
            }
        }

        let tags = [SPECIALIZATION_TAG.to_string()];
        let filter = self.atomic(specialization, Some(&filter_name), &tags)?;
        let description = match description.trim() {
            "" => format!("{} of {}, {}", CompositionOperator::Refine.name(), base.name, filter_name),
            given => given.to_string(),
        };
        let mut refined = Pattern::composed(
            String::new(),
            description,
            tag_set(&tags),
            CompositionOperator::Refine,
            vec![base.id, filter.id],
        )?;
        refined.name = name;

        self.persist(filter).await?;
        self.persist(refined).await
    }

    /// Turn a discovery candidate into a persisted atomic pattern
    pub async fn promote(
        &self,
        candidate: &DiscoveredPatternCandidate,
        name: Option<&str>,
        tags: &[String],
    ) -> Result<Pattern, PatternError> {
        let mut dimensions = candidate.dimensions.clone();
        if dimensions.is_empty() {
            dimensions.push(Dimension::new(DimensionType::Semantic, candidate.observation.clone(), 1.0));
        }

        let mut tags = tag_set(tags);
        tags.insert(DISCOVERED_TAG.to_string());

        let mut pattern = Pattern::atomic(String::new(), candidate.observation.clone(), tags, dimensions);
        let seed = if candidate.keywords.is_empty() {
            candidate.observation.clone()
        } else {
            candidate.keywords.join(" ")
        };
        pattern.name = supplied(name).unwrap_or_else(|| generated_name(&seed, pattern.id));

        let pattern = self.persist(pattern).await?;
        self.event_bus.publish(CortexEvent::CandidatePromoted {
            candidate_id: candidate.id,
            pattern_id: pattern.id,
            timestamp: Utc::now(),
        });
        Ok(pattern)
    }

    /// Insert the built-in patterns that are not in the catalog yet
    pub async fn seed_builtins(&self) -> Result<usize, PatternError> {
        let mut seeded = 0;
        for mut pattern in builtin_patterns() {
            if self.catalog.contains_name(&pattern.name).await {
                continue;
            }
            pattern.builtin = true;
            pattern.tags.insert(BUILTIN_TAG.to_string());
            self.persist(pattern).await?;
            seeded += 1;
        }

        if seeded > 0 {
            info!(seeded, "Seeded built-in patterns");
        }
        Ok(seeded)
    }

    async fn persist(&self, pattern: Pattern) -> Result<Pattern, PatternError> {
        let pattern = self.catalog.insert(pattern).await?;
        debug!(
            pattern_id = %pattern.id,
            name = %pattern.name,
            kind = %pattern.type_label(),
            "Created pattern"
        );

        self.event_bus.publish(CortexEvent::PatternCreated {
            pattern_id: pattern.id,
            name: pattern.name.clone(),
            kind: pattern.type_label(),
            timestamp: Utc::now(),
        });
        Ok(pattern)
    }
}

fn builtin(name: &str, description: &str, tags: &[&str], dimensions: Vec<Dimension>) -> Pattern {
    Pattern::atomic(
        name,
        description,
        tags.iter().map(|t| t.to_string()).collect(),
        dimensions,
    )
}

fn builtin_patterns() -> Vec<Pattern> {
    vec![
        builtin(
            "philosophical-uncertainty",
            "Conversations expressing philosophical uncertainty",
            &["philosophy"],
            vec![
                Dimension::new(DimensionType::Tone, "uncertain, doubtful, hesitant, questioning", 1.0),
                Dimension::new(
                    DimensionType::Topic,
                    "philosophy, philosophical meaning, consciousness, existence, free will",
                    1.0,
                ),
            ],
        ),
        builtin(
            "technical-explanation",
            "Step-by-step explanations of technical concepts",
            &["technical"],
            vec![
                Dimension::new(DimensionType::Topic, "technical systems, software, code, algorithms", 1.0),
                Dimension::new(DimensionType::Structure, "step by step explanation, first, then, finally", 0.5),
            ],
        ),
        builtin(
            "emotional-disclosure",
            "Personal disclosures of feelings by the user",
            &["emotion"],
            vec![
                Dimension::new(DimensionType::Tone, "emotional, vulnerable, personal feelings, afraid, hurt", 1.0),
                Dimension::new(DimensionType::Role, "written by the user", 0.5),
            ],
        ),
        builtin(
            "open-questions",
            "Open-ended questions that wonder why or how",
            &["inquiry"],
            vec![Dimension::new(
                DimensionType::Structure,
                "open questions, wondering why, wondering how, curious",
                1.0,
            )],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constraint::LearnedConstraint;
    use crate::domain::feedback::FeedbackRecord;
    use crate::domain::repository::{FeedbackOutcome, PatternRepository, RepositoryError};
    use crate::infrastructure::memory_repository::InMemoryPatternRepository;
    use async_trait::async_trait;
    use chrono::DateTime;

    fn composer() -> Composer {
        composer_over(Arc::new(InMemoryPatternRepository::new()))
    }

    fn composer_over(repository: Arc<dyn PatternRepository>) -> Composer {
        let catalog = Arc::new(PatternCatalog::new(repository));
        Composer::new(catalog, Arc::new(HeuristicDimensionExtractor), EventBus::new(16))
    }

    /// Fails every save whose name ends with the given suffix
    struct RefusingRepository {
        inner: InMemoryPatternRepository,
        suffix: &'static str,
    }

    #[async_trait]
    impl PatternRepository for RefusingRepository {
        async fn save_pattern(&self, pattern: &Pattern) -> Result<(), RepositoryError> {
            if pattern.name.ends_with(self.suffix) {
                return Err(RepositoryError::Database("disk full".to_string()));
            }
            self.inner.save_pattern(pattern).await
        }

        async fn find_by_id(&self, id: PatternId) -> Result<Option<Pattern>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Pattern>, RepositoryError> {
            self.inner.find_by_name(name).await
        }

        async fn list_patterns(&self) -> Result<Vec<Pattern>, RepositoryError> {
            self.inner.list_patterns().await
        }

        async fn record_usage(&self, id: PatternId, used_at: DateTime<Utc>) -> Result<Pattern, RepositoryError> {
            self.inner.record_usage(id, used_at).await
        }

        async fn constraints_for(&self, id: PatternId) -> Result<Vec<LearnedConstraint>, RepositoryError> {
            self.inner.constraints_for(id).await
        }

        async fn feedback_for(&self, id: PatternId) -> Result<Vec<FeedbackRecord>, RepositoryError> {
            self.inner.feedback_for(id).await
        }

        async fn apply_feedback(&self, outcome: &FeedbackOutcome) -> Result<(), RepositoryError> {
            self.inner.apply_feedback(outcome).await
        }
    }

    #[test]
    fn test_single_clause_is_semantic() {
        let dims = HeuristicDimensionExtractor.extract("conversations expressing philosophical uncertainty");
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].dimension_type, DimensionType::Semantic);
        assert_eq!(dims[0].weight, 1.0);
    }

    #[test]
    fn test_clauses_are_classified() {
        let dims = HeuristicDimensionExtractor
            .extract("anxious tone, written by the user; about career changes but with a list of steps");
        let types: Vec<DimensionType> = dims.iter().map(|d| d.dimension_type).collect();
        assert_eq!(
            types,
            vec![
                DimensionType::Tone,
                DimensionType::Role,
                DimensionType::Topic,
                DimensionType::Structure,
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_rejects_blank() {
        let composer = composer();
        assert!(matches!(
            composer.describe("   ", None, &[]).await,
            Err(PatternError::EmptyDescription)
        ));
    }

    #[tokio::test]
    async fn test_describe_generates_name() {
        let composer = composer();
        let pattern = composer
            .describe("conversations expressing philosophical uncertainty", None, &[])
            .await
            .unwrap();
        assert!(pattern.name.starts_with("conversations-expressing-philosophical-uncertainty-"));
        assert!(pattern.dimensions().unwrap().len() >= 1);
    }

    #[tokio::test]
    async fn test_compose_checks_arity_before_resolution() {
        let composer = composer();
        let result = composer
            .compose("x", "", CompositionOperator::Not, &["missing".to_string()], &[])
            .await;
        assert!(matches!(result, Err(PatternError::InvalidComposition(_))));

        let result = composer
            .compose("x", "", CompositionOperator::And, &["a".to_string(), "b".to_string()], &[])
            .await;
        assert!(matches!(result, Err(PatternError::PatternNotFound(_))));
    }

    #[tokio::test]
    async fn test_specialize_creates_filter_and_refine() {
        let composer = composer();
        composer.describe("questions about consciousness", Some("base"), &[]).await.unwrap();

        let refined = composer
            .specialize("narrow", "", "base", "asked by the user")
            .await
            .unwrap();
        assert_eq!(refined.operator(), Some(CompositionOperator::Refine));
        assert_eq!(refined.description, "REFINE of base, narrow-filter");
        assert!(refined.tags.contains(SPECIALIZATION_TAG));

        let base = composer.catalog.resolve("base").await.unwrap();
        let filter = composer.catalog.resolve("narrow-filter").await.unwrap();
        assert_eq!(refined.operands(), &[base.id, filter.id][..]);
        assert_eq!(filter.description, "asked by the user");
        assert!(filter.tags.contains(SPECIALIZATION_TAG));
    }

    #[tokio::test]
    async fn test_failed_specialize_writes_nothing() {
        let composer = composer_over(Arc::new(RefusingRepository {
            inner: InMemoryPatternRepository::new(),
            suffix: "-filter",
        }));
        composer.describe("questions about consciousness", Some("base"), &[]).await.unwrap();

        assert!(matches!(
            composer.specialize("narrow", "", "base", "asked by the user").await,
            Err(PatternError::StoreUnavailable(_))
        ));
        assert!(!composer.catalog.contains_name("narrow").await);
        assert!(!composer.catalog.contains_name("narrow-filter").await);
        assert_eq!(composer.catalog.list().await.len(), 1);

        // a blank specialization fails before the base is even resolved
        assert!(matches!(
            composer.specialize("narrow", "", "missing", "  ").await,
            Err(PatternError::EmptyDescription)
        ));
    }

    #[tokio::test]
    async fn test_seed_builtins_is_idempotent() {
        let composer = composer();
        assert_eq!(composer.seed_builtins().await.unwrap(), 4);
        assert_eq!(composer.seed_builtins().await.unwrap(), 0);

        let builtin = composer.catalog.resolve("philosophical-uncertainty").await.unwrap();
        assert!(builtin.builtin);
        assert!(builtin.tags.contains(BUILTIN_TAG));
    }
}
