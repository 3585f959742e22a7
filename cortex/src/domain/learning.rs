// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Feedback Learning Rule
//!
//! Every numeric adjustment the Learner makes goes through [`LearningRule`], a
//! pure value parameterized by a single learning rate `α`:
//!
//! | Signal | Update |
//! |--------|--------|
//! | `correct` | `success_rate += α·(1 − success_rate)` |
//! | `partial` | `success_rate += (α/2)·(1 − success_rate)` |
//! | `incorrect` | `success_rate −= α·success_rate` |
//! | constraint retained a `correct` node | `confidence += α·(1 − confidence)` |
//! | constraint penalized a `correct` node | `confidence *= 1 − contradiction_decay` |
//! | new constraint | `confidence = separation · support / (support + 1)` |
//!
//! Dimension weights of atomic patterns move by `±α·(score − mean)` and never
//! fall below [`MIN_DIMENSION_WEIGHT`].

use crate::domain::feedback::Judgment;
use crate::domain::pattern::Dimension;

pub const MIN_DIMENSION_WEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRule {
    pub learning_rate: f64,
    pub contradiction_decay: f64,
}

impl Default for LearningRule {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            contradiction_decay: 0.5,
        }
    }
}

impl LearningRule {
    pub fn new(learning_rate: f64, contradiction_decay: f64) -> Self {
        Self {
            learning_rate: learning_rate.clamp(0.0, 1.0),
            contradiction_decay: contradiction_decay.clamp(0.0, 1.0),
        }
    }

    pub fn update_success_rate(&self, success_rate: f64, judgment: Judgment) -> f64 {
        let updated = match judgment {
            Judgment::Correct => success_rate + self.learning_rate * (1.0 - success_rate),
            Judgment::Partial => success_rate + (self.learning_rate / 2.0) * (1.0 - success_rate),
            Judgment::Incorrect => success_rate - self.learning_rate * success_rate,
        };
        updated.clamp(0.0, 1.0)
    }

    /// A constraint kept a node that was then confirmed correct
    pub fn reinforce(&self, confidence: f64) -> f64 {
        (confidence + self.learning_rate * (1.0 - confidence)).clamp(0.0, 1.0)
    }

    /// A constraint penalized a node that was then confirmed correct
    pub fn contradict(&self, confidence: f64) -> f64 {
        (confidence * (1.0 - self.contradiction_decay)).clamp(0.0, 1.0)
    }

    /// Initial confidence for an induced constraint
    pub fn induction_confidence(&self, separation: f64, support: usize) -> f64 {
        let support = support as f64;
        (separation.clamp(0.0, 1.0) * support / (support + 1.0)).clamp(0.0, 1.0)
    }

    /// Move atomic dimension weights toward (correct) or away from (incorrect)
    /// the dimensions this node scored highest on.
    ///
    /// Returns whether any weight changed. Partial feedback leaves weights alone.
    pub fn adjust_weights(&self, dimensions: &mut [Dimension], scores: &[f64], judgment: Judgment) -> bool {
        if dimensions.len() < 2 || dimensions.len() != scores.len() {
            return false;
        }

        let direction = match judgment {
            Judgment::Correct => 1.0,
            Judgment::Incorrect => -1.0,
            Judgment::Partial => return false,
        };

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let mut changed = false;

        for (dimension, score) in dimensions.iter_mut().zip(scores) {
            let delta = direction * self.learning_rate * (score - mean);
            if delta.abs() < f64::EPSILON {
                continue;
            }
            dimension.weight = (dimension.weight + delta).max(MIN_DIMENSION_WEIGHT);
            dimension.learned = true;
            changed = true;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::DimensionType;

    #[test]
    fn test_success_rate_steps() {
        let rule = LearningRule::new(0.1, 0.5);
        assert!((rule.update_success_rate(0.5, Judgment::Correct) - 0.55).abs() < 1e-9);
        assert!((rule.update_success_rate(0.5, Judgment::Partial) - 0.525).abs() < 1e-9);
        assert!((rule.update_success_rate(0.5, Judgment::Incorrect) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_converges_toward_one() {
        let rule = LearningRule::default();
        let mut rate = 0.0;
        for _ in 0..200 {
            rate = rule.update_success_rate(rate, Judgment::Correct);
        }
        assert!(rate > 0.99 && rate <= 1.0);
    }

    #[test]
    fn test_constraint_confidence_updates() {
        let rule = LearningRule::new(0.2, 0.5);
        assert!((rule.reinforce(0.5) - 0.6).abs() < 1e-9);
        assert!((rule.contradict(0.8) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_induction_confidence_grows_with_support() {
        let rule = LearningRule::default();
        assert!((rule.induction_confidence(1.0, 1) - 0.5).abs() < 1e-9);
        assert!((rule.induction_confidence(1.0, 3) - 0.75).abs() < 1e-9);
        assert_eq!(rule.induction_confidence(0.0, 10), 0.0);
    }

    #[test]
    fn test_adjust_weights() {
        let rule = LearningRule::new(0.5, 0.5);
        let mut dims = vec![
            Dimension::new(DimensionType::Tone, "doubt", 1.0),
            Dimension::new(DimensionType::Topic, "philosophy", 1.0),
        ];

        assert!(rule.adjust_weights(&mut dims, &[0.9, 0.1], Judgment::Correct));
        assert!(dims[0].weight > 1.0);
        assert!(dims[1].weight < 1.0);
        assert!(dims.iter().all(|d| d.learned));

        let mut single = vec![Dimension::new(DimensionType::Semantic, "x", 1.0)];
        assert!(!rule.adjust_weights(&mut single, &[0.9], Judgment::Correct));
    }

    #[test]
    fn test_weights_have_floor() {
        let rule = LearningRule::new(1.0, 0.5);
        let mut dims = vec![
            Dimension::new(DimensionType::Tone, "a", 0.1),
            Dimension::new(DimensionType::Topic, "b", 0.1),
        ];
        rule.adjust_weights(&mut dims, &[1.0, 0.0], Judgment::Incorrect);
        assert_eq!(dims[0].weight, MIN_DIMENSION_WEIGHT);
    }
}
