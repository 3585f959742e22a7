//! Integration tests for pattern execution and the composition algebra
//!
//! Runs the facade end to end over an in-memory store with an axis embedder,
//! so every expected match set can be read straight off the corpus.

mod common;

use std::collections::BTreeSet;

use std::sync::Arc;

use aegis_cortex::domain::content::ContentNode;
use aegis_cortex::domain::error::PatternError;
use aegis_cortex::domain::pattern::CompositionOperator;
use aegis_cortex::infrastructure::InMemoryPatternRepository;
use common::{ids, system_with, system_with_topics};

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_execute_results_sorted_by_score_then_id() {
    let system = system_with_topics().await;

    for pattern in system.list(true, &[]).await.unwrap() {
        let outcome = system.execute(&pattern.name, None, None).await.unwrap();
        for pair in outcome.matches.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.score > b.score || (a.score == b.score && a.content_id < b.content_id),
                "{} not sorted: {:?} before {:?}",
                pattern.name,
                (a.score, &a.content_id),
                (b.score, &b.content_id)
            );
        }
    }
}

#[tokio::test]
async fn test_atomic_execution_matches_topic() {
    let system = system_with_topics().await;

    let cooking = system.execute("cooking", None, None).await.unwrap();
    assert_eq!(
        ids(&cooking.matches),
        ["c1", "c2", "e1", "e2", "e3", "m1"].map(String::from).into_iter().collect::<BTreeSet<_>>()
    );
    assert_eq!(cooking.pattern.usage_count, 1);
    assert!(cooking.pattern.last_used_at.is_some());

    let travel = system.execute("travel", None, None).await.unwrap();
    assert_eq!(
        ids(&travel.matches),
        ["m1", "t1", "t2"].map(String::from).into_iter().collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn test_limit_and_min_confidence() {
    let system = system_with_topics().await;

    let limited = system.execute("cooking", Some(2), None).await.unwrap();
    assert_eq!(limited.matches.len(), 2);

    let confident = system.execute("cooking", None, Some(0.95)).await.unwrap();
    assert!(confident.matches.iter().all(|m| m.score >= 0.95));
    assert!(!confident.matches.iter().any(|m| m.content_id == "m1"));
}

#[tokio::test]
async fn test_operand_count_invariants() {
    let system = system_with_topics().await;

    for operator in [CompositionOperator::Not, CompositionOperator::Refine] {
        for operands in [vec!["cooking"], vec!["cooking", "travel", "cooking"]] {
            let result = system.compose("", "", operator, &names(&operands), &[]).await;
            assert!(
                matches!(result, Err(PatternError::InvalidComposition(_))),
                "{} with {} operands",
                operator,
                operands.len()
            );
        }
    }

    for operator in [
        CompositionOperator::And,
        CompositionOperator::Or,
        CompositionOperator::Sequence { ordered: true },
    ] {
        for operands in [vec![], vec!["cooking"]] {
            let result = system.compose("", "", operator, &names(&operands), &[]).await;
            assert!(matches!(result, Err(PatternError::InvalidComposition(_))));
        }
    }

    // unknown operands resolve after arity passes
    let result = system
        .compose("x", "", CompositionOperator::Or, &names(&["cooking", "missing"]), &[])
        .await;
    assert!(matches!(result, Err(PatternError::PatternNotFound(_))));
}

#[tokio::test]
async fn test_and_or_not_set_properties() {
    let system = system_with_topics().await;
    let patterns = ["cooking", "travel", "open-questions", "technical-explanation"];

    for a in patterns {
        for b in patterns {
            if a == b {
                continue;
            }
            let set_a = ids(&system.execute(a, None, None).await.unwrap().matches);
            let set_b = ids(&system.execute(b, None, None).await.unwrap().matches);

            let and = system
                .compose(&format!("{a}-and-{b}"), "", CompositionOperator::And, &names(&[a, b]), &[])
                .await
                .unwrap();
            let and_set = ids(&system.execute(&and.name, None, None).await.unwrap().matches);
            let intersection: BTreeSet<String> = set_a.intersection(&set_b).cloned().collect();
            assert!(and_set.is_subset(&intersection), "AND({a},{b})");

            let or = system
                .compose(&format!("{a}-or-{b}"), "", CompositionOperator::Or, &names(&[a, b]), &[])
                .await
                .unwrap();
            let or_set = ids(&system.execute(&or.name, None, None).await.unwrap().matches);
            let union: BTreeSet<String> = set_a.union(&set_b).cloned().collect();
            assert!(or_set.is_superset(&union), "OR({a},{b})");

            let not = system
                .compose(&format!("{a}-not-{b}"), "", CompositionOperator::Not, &names(&[a, b]), &[])
                .await
                .unwrap();
            let not_set = ids(&system.execute(&not.name, None, None).await.unwrap().matches);
            let difference: BTreeSet<String> = set_a.difference(&set_b).cloned().collect();
            assert_eq!(not_set, difference, "NOT({a},{b})");
        }
    }
}

#[tokio::test]
async fn test_default_execution_returns_every_match() {
    let mut nodes: Vec<ContentNode> = (0..55)
        .map(|i| ContentNode::new(format!("bake-{i:02}"), "bake", "user", "chat"))
        .collect();
    nodes.push(ContentNode::new("mix", "bake on the flight", "user", "chat"));
    let system = system_with(Arc::new(InMemoryPatternRepository::new()), nodes).await;
    system
        .describe("bake bread with flour in the oven", Some("cooking"), &[])
        .await
        .unwrap();
    system
        .describe("a trip with a flight and a hotel", Some("travel"), &[])
        .await
        .unwrap();

    let cooking = system.execute("cooking", None, None).await.unwrap();
    assert_eq!(cooking.matches.len(), 56);
    assert_eq!(cooking.total_matches, 56);
    let set_a = ids(&cooking.matches);
    let set_b = ids(&system.execute("travel", None, None).await.unwrap().matches);
    assert!(set_a.contains("mix"));

    system
        .compose("both", "", CompositionOperator::And, &names(&["cooking", "travel"]), &[])
        .await
        .unwrap();
    let both = ids(&system.execute("both", None, None).await.unwrap().matches);
    let intersection: BTreeSet<String> = set_a.intersection(&set_b).cloned().collect();
    assert!(both.is_subset(&intersection));
    assert!(both.contains("mix"));

    // an explicit limit truncates the list but not the reported total
    let limited = system.execute("cooking", Some(10), None).await.unwrap();
    assert_eq!(limited.matches.len(), 10);
    assert_eq!(limited.total_matches, 56);
}

#[tokio::test]
async fn test_or_keeps_max_score() {
    let system = system_with_topics().await;
    let cooking = system.execute("cooking", None, None).await.unwrap();
    let travel = system.execute("travel", None, None).await.unwrap();

    system
        .compose("either", "", CompositionOperator::Or, &names(&["cooking", "travel"]), &[])
        .await
        .unwrap();
    let either = system.execute("either", None, None).await.unwrap();

    let m1 = |matches: &[aegis_cortex::application::PatternMatch]| {
        matches.iter().find(|m| m.content_id == "m1").map(|m| m.score).unwrap()
    };
    assert_eq!(m1(&either.matches), m1(&cooking.matches).max(m1(&travel.matches)));
}

#[tokio::test]
async fn test_and_scenario() {
    let system = system_with_topics().await;

    let a = ids(&system.execute("cooking", None, None).await.unwrap().matches);
    let b = ids(&system.execute("travel", None, None).await.unwrap().matches);

    let composed = system
        .compose("A_and_B", "", CompositionOperator::And, &names(&["cooking", "travel"]), &[])
        .await
        .unwrap();
    assert_eq!(composed.operator(), Some(CompositionOperator::And));
    assert!(composed.description.contains("cooking"));

    let both = ids(&system.execute("A_and_B", None, None).await.unwrap().matches);
    assert_eq!(both, ["m1".to_string()].into_iter().collect());
    assert!(both.iter().all(|id| a.contains(id) && b.contains(id)));
}

#[tokio::test]
async fn test_refine_and_specialize() {
    let system = system_with_topics().await;

    let refined = system
        .specialize("travel-baking", "", "travel", "bake bread")
        .await
        .unwrap();
    assert_eq!(refined.operator(), Some(CompositionOperator::Refine));

    let matches = system.execute("travel-baking", None, None).await.unwrap().matches;
    assert_eq!(ids(&matches), ["m1".to_string()].into_iter().collect());

    assert!(matches!(
        system.specialize("again", "", "travel", "   ").await,
        Err(PatternError::EmptyDescription)
    ));
    assert!(matches!(
        system.specialize("travel-baking", "", "travel", "oven").await,
        Err(PatternError::DuplicateName(_))
    ));
}

#[tokio::test]
async fn test_nested_composition_with_shared_operand() {
    let system = system_with_topics().await;
    system
        .compose("cooking-or-travel", "", CompositionOperator::Or, &names(&["cooking", "travel"]), &[])
        .await
        .unwrap();
    system
        .compose(
            "only-cooking",
            "",
            CompositionOperator::Not,
            &names(&["cooking-or-travel", "travel"]),
            &[],
        )
        .await
        .unwrap();

    let matches = system.execute("only-cooking", None, None).await.unwrap().matches;
    assert_eq!(
        ids(&matches),
        ["c1", "c2", "e1", "e2", "e3"].map(String::from).into_iter().collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn test_execute_unknown_pattern() {
    let system = system_with_topics().await;
    assert!(matches!(
        system.execute("nope", None, None).await,
        Err(PatternError::PatternNotFound(name)) if name == "nope"
    ));
}
