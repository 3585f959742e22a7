// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cortex
//!
//! Pattern discovery and composition engine. Mines recurring patterns from an
//! embedded content corpus, lets operators define patterns from plain-language
//! descriptions, composes them with a small algebra (`AND`, `OR`, `NOT`,
//! `SEQUENCE`, `REFINE`), executes them into ranked matches and learns
//! constraints from correctness feedback.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Pattern lifecycle over an external content graph
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Pattern model, collaborator traits, learning rule, config |
//! | [`application`] | Discovery, composer, executor, learner, [`PatternSystem`] facade |
//! | [`infrastructure`] | Pattern store backends, embedders, content store, event bus |
//! | [`presentation`] | Request/response payloads and envelopes |

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::PatternSystem;
pub use domain::*;
pub use infrastructure::*;
