// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the Cortex bounded context
//!
//! Adapters for the domain's collaborator traits: pattern store backends,
//! embedding clients, a reference content store and the event bus.

pub mod content_store;
pub mod embedding_client;
pub mod event_bus;
pub mod memory_repository;
pub mod postgres_repository;
pub mod sled_repository;

pub use content_store::InMemoryContentStore;
pub use embedding_client::{HashingEmbedder, OllamaEmbeddingClient};
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use memory_repository::InMemoryPatternRepository;
pub use postgres_repository::PostgresPatternRepository;
pub use sled_repository::SledPatternRepository;
