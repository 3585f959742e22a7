// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Cortex CLI

pub mod config;
pub mod pattern;
pub mod update;

pub use self::config::ConfigCommand;
pub use self::pattern::PatternCommand;
pub use self::update::UpdateCommand;
