// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern API
//!
//! Transport-independent request/response payloads for the pattern
//! operations. Requests are JSON objects tagged by `operation`:
//!
//! ```json
//! { "operation": "execute", "patternName": "open-questions", "limit": 10 }
//! ```
//!
//! Every call is answered with an envelope, never an error value:
//!
//! ```json
//! { "success": true, "totalMatches": 3, "matches": [...] }
//! { "success": false, "error": { "code": "pattern_not_found", "message": "..." } }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::executor::PatternMatch;
use crate::application::pattern_system::PatternSystem;
use crate::domain::constraint::LearnedConstraint;
use crate::domain::discovery::{CandidateStatus, DiscoveredPatternCandidate, DiscoveryMethod, DiscoveryRequest};
use crate::domain::error::PatternError;
use crate::domain::feedback::Judgment;
use crate::domain::pattern::{CompositionOperator, Dimension, Pattern};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PatternRequest {
    Discover(DiscoverRequest),
    Describe(DescribeRequest),
    Execute(ExecuteRequest),
    List(ListRequest),
    Get(PatternRef),
    Feedback(FeedbackRequest),
    GetConstraints(PatternRef),
    Compose(ComposeRequest),
    Specialize(SpecializeRequest),
    Promote(PromoteRequest),
}

impl PatternRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            PatternRequest::Discover(_) => "discover",
            PatternRequest::Describe(_) => "describe",
            PatternRequest::Execute(_) => "execute",
            PatternRequest::List(_) => "list",
            PatternRequest::Get(_) => "get",
            PatternRequest::Feedback(_) => "feedback",
            PatternRequest::GetConstraints(_) => "get_constraints",
            PatternRequest::Compose(_) => "compose",
            PatternRequest::Specialize(_) => "specialize",
            PatternRequest::Promote(_) => "promote",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    #[serde(default)]
    pub source_types: Vec<String>,
    pub min_instances: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRequest {
    pub description: String,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub pattern_name: String,
    pub limit: Option<usize>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            include_builtin: default_include_builtin(),
            tags: Vec::new(),
        }
    }
}

fn default_include_builtin() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRef {
    pub pattern_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub pattern_name: String,
    pub content_id: String,
    pub judgment: Judgment,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub operator: String,
    pub patterns: Vec<String>,
    /// SEQUENCE only; defaults to ordered
    #[serde(default = "default_ordered")]
    pub ordered: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_ordered() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecializeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_pattern: String,
    pub specialization: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub candidate_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub id: Uuid,
    pub observation: String,
    pub confidence: f64,
    pub instance_count: usize,
    pub discovery_method: DiscoveryMethod,
    pub status: CandidateStatus,
    pub dimensions: Vec<Dimension>,
    pub keywords: Vec<String>,
    pub member_ids: Vec<String>,
}

impl From<DiscoveredPatternCandidate> for CandidateView {
    fn from(c: DiscoveredPatternCandidate) -> Self {
        Self {
            id: c.id,
            observation: c.observation,
            confidence: c.confidence,
            instance_count: c.instance_count,
            discovery_method: c.discovery_method,
            status: c.status,
            dimensions: c.dimensions,
            keywords: c.keywords,
            member_ids: c.member_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub patterns_found: usize,
    pub sampled_nodes: usize,
    pub patterns: Vec<CandidateView>,
}

/// Short pattern summary returned by the creating operations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPattern {
    pub name: String,
    pub id: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl From<&Pattern> for CreatedPattern {
    fn from(p: &Pattern) -> Self {
        Self {
            name: p.name.clone(),
            id: p.id.to_string(),
            description: p.description.clone(),
            tags: p.tags.iter().cloned().collect(),
            pattern_type: p.type_label(),
            dimension_count: p.dimensions().map(<[Dimension]>::len),
            operator: p.operator().map(|op| op.name().to_string()),
            operands: p.operands().iter().map(ToString::to_string).collect(),
            base_pattern: None,
            specialization: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResponse {
    pub pattern: CreatedPattern,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub pattern_name: String,
    pub total_matches: usize,
    pub matches: Vec<MatchView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: String,
    pub score: f64,
    pub author_role: String,
    pub source_type: String,
    pub preview: String,
    pub has_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl From<PatternMatch> for MatchView {
    fn from(m: PatternMatch) -> Self {
        Self {
            id: m.content_id,
            score: m.score,
            author_role: m.author_role,
            source_type: m.source_type,
            preview: m.preview,
            has_media: m.has_media,
            thread_id: m.thread_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub description: String,
    pub tags: Vec<String>,
    pub usage_count: u64,
    pub success_rate: f64,
    pub builtin: bool,
}

impl From<&Pattern> for PatternSummary {
    fn from(p: &Pattern) -> Self {
        Self {
            name: p.name.clone(),
            pattern_type: p.type_label(),
            description: p.description.clone(),
            tags: p.tags.iter().cloned().collect(),
            usage_count: p.usage_count,
            success_rate: p.success_rate,
            builtin: p.builtin,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub pattern_count: usize,
    pub patterns: Vec<PatternSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<Dimension>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<CompositionOperator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<String>,
    pub usage_count: u64,
    pub success_rate: f64,
    pub builtin: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&Pattern> for PatternView {
    fn from(p: &Pattern) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            tags: p.tags.iter().cloned().collect(),
            pattern_type: p.type_label(),
            dimensions: p.dimensions().map(<[Dimension]>::to_vec),
            operator: p.operator(),
            operands: p.operands().iter().map(ToString::to_string).collect(),
            usage_count: p.usage_count,
            success_rate: p.success_rate,
            builtin: p.builtin,
            created_at: p.created_at,
            last_used_at: p.last_used_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintView {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub constraint_type: String,
    pub confidence: f64,
    pub source_feedback_count: usize,
    pub learned_at: DateTime<Utc>,
}

impl From<&LearnedConstraint> for ConstraintView {
    fn from(c: &LearnedConstraint) -> Self {
        Self {
            id: c.id.to_string(),
            description: c.description.clone(),
            constraint_type: c.constraint.type_name().to_string(),
            confidence: c.confidence,
            source_feedback_count: c.source_feedback.len(),
            learned_at: c.learned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponse {
    pub pattern: PatternView,
    pub learned_constraints: Vec<ConstraintView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub message: String,
    pub success_rate: f64,
    pub learned_constraints_count: usize,
    pub learned_constraints: Vec<ConstraintView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsResponse {
    pub pattern_name: String,
    pub constraint_count: usize,
    pub constraints: Vec<ConstraintView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Discover(DiscoverResponse),
    Pattern(PatternResponse),
    Execute(ExecuteResponse),
    List(ListResponse),
    Get(GetResponse),
    Feedback(FeedbackResponse),
    Constraints(ConstraintsResponse),
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: "invalid_request".to_string(),
            message: message.into(),
        }
    }
}

impl From<PatternError> for ApiError {
    fn from(err: PatternError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Success {
        success: bool,
        #[serde(flatten)]
        data: ResponseData,
    },
    Failure {
        success: bool,
        error: ApiError,
    },
}

impl ApiResponse {
    pub fn ok(data: ResponseData) -> Self {
        ApiResponse::Success { success: true, data }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse::Failure { success: false, error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": { "code": "internal", "message": e.to_string() }
            })
        })
    }
}

/// Dispatches requests to the pattern system and wraps every outcome
#[derive(Clone)]
pub struct PatternApi {
    system: Arc<PatternSystem>,
}

impl PatternApi {
    pub fn new(system: Arc<PatternSystem>) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &Arc<PatternSystem> {
        &self.system
    }

    /// Parse and handle a raw JSON request
    pub async fn handle_json(&self, raw: &str) -> serde_json::Value {
        match serde_json::from_str::<PatternRequest>(raw) {
            Ok(request) => self.handle(request).await.to_json(),
            Err(e) => ApiResponse::err(ApiError::invalid_request(e.to_string())).to_json(),
        }
    }

    pub async fn handle(&self, request: PatternRequest) -> ApiResponse {
        let operation = request.operation();
        debug!(operation, "Handling pattern request");

        match self.dispatch(request).await {
            Ok(data) => ApiResponse::ok(data),
            Err(error) => {
                warn!(operation, code = %error.code, message = %error.message, "Pattern request failed");
                ApiResponse::err(error)
            }
        }
    }

    async fn dispatch(&self, request: PatternRequest) -> Result<ResponseData, ApiError> {
        let system = &self.system;
        let data = match request {
            PatternRequest::Discover(req) => {
                let run = system
                    .discover(&DiscoveryRequest {
                        source_types: req.source_types,
                        min_instances: req.min_instances,
                        limit: req.limit,
                    })
                    .await?;
                ResponseData::Discover(DiscoverResponse {
                    patterns_found: run.candidates.len(),
                    sampled_nodes: run.sampled_nodes,
                    patterns: run.candidates.into_iter().map(CandidateView::from).collect(),
                })
            }
            PatternRequest::Describe(req) => {
                let pattern = system.describe(&req.description, req.name.as_deref(), &req.tags).await?;
                ResponseData::Pattern(PatternResponse {
                    pattern: CreatedPattern::from(&pattern),
                })
            }
            PatternRequest::Execute(req) => {
                let outcome = system.execute(&req.pattern_name, req.limit, req.min_confidence).await?;
                ResponseData::Execute(ExecuteResponse {
                    pattern_name: outcome.pattern.name,
                    total_matches: outcome.total_matches,
                    matches: outcome.matches.into_iter().map(MatchView::from).collect(),
                })
            }
            PatternRequest::List(req) => {
                let patterns = system.list(req.include_builtin, &req.tags).await?;
                ResponseData::List(ListResponse {
                    pattern_count: patterns.len(),
                    patterns: patterns.iter().map(PatternSummary::from).collect(),
                })
            }
            PatternRequest::Get(req) => {
                let details = system.get(&req.pattern_name).await?;
                ResponseData::Get(GetResponse {
                    pattern: PatternView::from(&details.pattern),
                    learned_constraints: details.constraints.iter().map(ConstraintView::from).collect(),
                })
            }
            PatternRequest::Feedback(req) => {
                let result = system
                    .feedback(&req.pattern_name, &req.content_id, req.judgment, req.explanation)
                    .await?;
                ResponseData::Feedback(FeedbackResponse {
                    message: format!(
                        "Recorded {} feedback for '{}' on {}",
                        result.record.judgment.as_str(),
                        result.pattern.name,
                        result.record.content_id
                    ),
                    success_rate: result.pattern.success_rate,
                    learned_constraints_count: result.changed_constraints.len(),
                    learned_constraints: result.changed_constraints.iter().map(ConstraintView::from).collect(),
                })
            }
            PatternRequest::GetConstraints(req) => {
                let constraints = system.get_constraints(&req.pattern_name).await?;
                ResponseData::Constraints(ConstraintsResponse {
                    pattern_name: req.pattern_name,
                    constraint_count: constraints.len(),
                    constraints: constraints.iter().map(ConstraintView::from).collect(),
                })
            }
            PatternRequest::Compose(req) => {
                let operator = CompositionOperator::parse(&req.operator, req.ordered)?;
                let pattern = system
                    .compose(&req.name, &req.description, operator, &req.patterns, &req.tags)
                    .await?;
                ResponseData::Pattern(PatternResponse {
                    pattern: CreatedPattern::from(&pattern),
                })
            }
            PatternRequest::Specialize(req) => {
                let pattern = system
                    .specialize(&req.name, &req.description, &req.base_pattern, &req.specialization)
                    .await?;
                let mut created = CreatedPattern::from(&pattern);
                created.base_pattern = Some(req.base_pattern);
                created.specialization = Some(req.specialization);
                ResponseData::Pattern(PatternResponse { pattern: created })
            }
            PatternRequest::Promote(req) => {
                let candidate_id = Uuid::parse_str(&req.candidate_id)
                    .map_err(|_| PatternError::CandidateNotFound(req.candidate_id.clone()))?;
                let pattern = system.promote(candidate_id, req.name.as_deref(), &req.tags).await?;
                ResponseData::Pattern(PatternResponse {
                    pattern: CreatedPattern::from(&pattern),
                })
            }
        };
        Ok(data)
    }
}
