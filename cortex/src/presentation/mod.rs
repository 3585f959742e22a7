// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`aegis-cortex`)
//!
//! Boundary payloads that translate external requests into
//! [`PatternSystem`](crate::application::PatternSystem) calls. No business
//! logic lives here; transports (the `cortex` CLI, an RPC layer) serialize
//! these types.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Typed requests, response views and the `{success, ...}` envelope |

pub mod api;
