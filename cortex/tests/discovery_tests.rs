//! Integration tests for discovery runs and candidate promotion

mod common;

use std::sync::Arc;

use aegis_cortex::application::{HeuristicDimensionExtractor, PatternSystem};
use aegis_cortex::domain::discovery::{CandidateStatus, DiscoveryMethod, DiscoveryRequest};
use aegis_cortex::domain::error::PatternError;
use aegis_cortex::domain::pattern::DimensionType;
use aegis_cortex::infrastructure::{InMemoryContentStore, InMemoryPatternRepository};
use common::{config, corpus, system, OfflineEmbedder};

fn membership(run: &aegis_cortex::application::DiscoveryRun) -> Vec<Vec<String>> {
    run.candidates
        .iter()
        .map(|c| {
            let mut members = c.member_ids.clone();
            members.sort();
            members
        })
        .collect()
}

#[tokio::test]
async fn test_discovery_is_deterministic() {
    let first_system = system().await;
    let request = DiscoveryRequest::default();

    let first = first_system.discover(&request).await.unwrap();
    let second = first_system.discover(&request).await.unwrap();
    let fresh = system().await.discover(&request).await.unwrap();

    assert!(!first.candidates.is_empty());
    assert_eq!(membership(&first), membership(&second));
    assert_eq!(membership(&first), membership(&fresh));

    let ids: Vec<_> = first.candidates.iter().map(|c| c.id).collect();
    let fresh_ids: Vec<_> = fresh.candidates.iter().map(|c| c.id).collect();
    assert_eq!(ids, fresh_ids);
}

#[tokio::test]
async fn test_candidates_are_ranked_and_well_formed() {
    let system = system().await;
    let run = system.discover(&DiscoveryRequest::default()).await.unwrap();

    assert_eq!(run.sampled_nodes, corpus().len());
    for pair in run.candidates.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
    for candidate in &run.candidates {
        assert!(candidate.instance_count >= 2);
        assert_eq!(candidate.instance_count, candidate.member_ids.len());
        assert!((0.0..=1.0).contains(&candidate.confidence));
        assert_eq!(candidate.discovery_method, DiscoveryMethod::Clustering);
        assert_eq!(candidate.status, CandidateStatus::Candidate);
        assert!(!candidate.observation.is_empty());
    }
}

#[tokio::test]
async fn test_source_filter_and_dominant_attribute() {
    let system = system().await;
    let run = system
        .discover(&DiscoveryRequest {
            source_types: vec!["EMAIL".to_string()],
            min_instances: Some(3),
            limit: None,
        })
        .await
        .unwrap();

    assert_eq!(run.sampled_nodes, 3);
    assert_eq!(run.candidates.len(), 1);
    let candidate = &run.candidates[0];
    assert!(candidate
        .dimensions
        .iter()
        .any(|d| d.dimension_type == DimensionType::Source && d.description == "from email"));
    assert!(candidate
        .dimensions
        .iter()
        .any(|d| d.dimension_type == DimensionType::Role && d.description == "written by user"));
}

#[tokio::test]
async fn test_min_instances_and_limit() {
    let system = system().await;

    let strict = system
        .discover(&DiscoveryRequest {
            min_instances: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(strict.candidates.is_empty());

    let limited = system
        .discover(&DiscoveryRequest {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.candidates.len(), 1);
}

#[tokio::test]
async fn test_promoted_candidate_executes() {
    let system = system().await;
    let run = system.discover(&DiscoveryRequest::default()).await.unwrap();
    let candidate = run.candidates[0].clone();

    let pattern = system
        .promote(candidate.id, Some("discovered-topic"), &["mined".to_string()])
        .await
        .unwrap();
    assert!(pattern.tags.contains("mined"));
    assert_eq!(pattern.description, candidate.observation);

    let outcome = system.execute("discovered-topic", Some(100), None).await.unwrap();
    assert!(!outcome.matches.is_empty());

    // the run's candidate set is replaced by the next discovery
    system
        .discover(&DiscoveryRequest {
            min_instances: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    let next = run.candidates.get(1).map(|c| c.id).unwrap_or(candidate.id);
    assert!(matches!(
        system.promote(next, None, &[]).await,
        Err(PatternError::CandidateNotFound(_))
    ));
}

#[tokio::test]
async fn test_unreachable_embedder() {
    let system = PatternSystem::new(
        Arc::new(InMemoryPatternRepository::new()),
        Arc::new(InMemoryContentStore::with_nodes(corpus())),
        Arc::new(OfflineEmbedder),
        Arc::new(HeuristicDimensionExtractor),
        &config(),
    );

    assert!(matches!(
        system.discover(&DiscoveryRequest::default()).await,
        Err(PatternError::EmbedderUnavailable(_))
    ));

    // previously stored patterns are untouched by the failed run
    assert_eq!(system.list(true, &[]).await.unwrap().len(), 4);
}
