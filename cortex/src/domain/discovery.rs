// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transient pattern proposals produced by a discovery run. Candidates are
//! advisory and are only persisted once promoted to a [`Pattern`].
//!
//! [`Pattern`]: crate::domain::pattern::Pattern

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pattern::Dimension;

/// Namespace for deterministic candidate ids (UUIDv5 of the member ids)
const CANDIDATE_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_0c3e_94d2_4b7a_8f15_2c9e_71b3_d048);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Clustering,
    CoOccurrence,
    Outlier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Candidate,
    Promoted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPatternCandidate {
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

impl DiscoveredPatternCandidate {
    /// Stable id derived from the (sorted) member set
    pub fn id_for_members(member_ids: &[String]) -> Uuid {
        let mut sorted: Vec<&str> = member_ids.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        Uuid::new_v5(&CANDIDATE_NAMESPACE, sorted.join("\u{1f}").as_bytes())
    }
}

/// Parameters of one discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    pub source_types: Vec<String>,
    pub min_instances: Option<usize>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_id_ignores_member_order() {
        let a = DiscoveredPatternCandidate::id_for_members(&["n2".to_string(), "n1".to_string()]);
        let b = DiscoveredPatternCandidate::id_for_members(&["n1".to_string(), "n2".to_string()]);
        let c = DiscoveredPatternCandidate::id_for_members(&["n1".to_string(), "n3".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
