// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer for the Cortex bounded context
//!
//! Services that implement the pattern lifecycle on top of the domain model:
//! discovery, composition, execution and feedback learning, wired together
//! by the [`PatternSystem`] facade.

pub mod catalog;
pub mod composer;
pub mod discovery;
pub mod executor;
pub mod learner;
pub mod pattern_system;
pub mod repository_factory;

pub use catalog::PatternCatalog;
pub use composer::{Composer, DimensionExtractor, HeuristicDimensionExtractor};
pub use discovery::{DiscoveryEngine, DiscoveryRun};
pub use executor::{ExecutionOutcome, PatternExecutor, PatternMatch};
pub use learner::{FeedbackResult, Learner};
pub use pattern_system::{PatternDetails, PatternSystem};
