// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pattern model, collaborator contracts and the pure learning rule.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and invariants shared by every Cortex service

pub mod config;
pub mod constraint;
pub mod content;
pub mod discovery;
pub mod error;
pub mod events;
pub mod feedback;
pub mod learning;
pub mod pattern;
pub mod repository;
pub mod text;

pub use constraint::*;
pub use content::*;
pub use discovery::*;
pub use error::*;
pub use events::*;
pub use feedback::*;
pub use learning::*;
pub use pattern::*;
