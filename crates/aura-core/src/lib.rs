//! aura-core - Core library for Aura
//!
//! Shared building blocks for the SDK and CLI:
//!
//! - **error**: Error taxonomy and retry classification
//! - **hashing**: SHA-256 content hashes
//! - **types**: Knowledge, retrieval and snapshot data model
//! - **resilience**: Retry with exponential backoff and full jitter
//! - **packing**: Token-budgeted context packing
//! - **auth**: Project access-control oracle
//! - **store**: Knowledge store interface
//! - **db**: SQLite knowledge store and access oracle
//! - **client**: Completion backend interface and HTTP client

pub mod auth;
pub mod client;
#[cfg(feature = "db")]
pub mod db;
pub mod error;
pub mod hashing;
pub mod packing;
pub mod resilience;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use auth::{AccessControl, Action, Role};
pub use client::{CompletionBackend, CompletionRequest};
#[cfg(feature = "db")]
pub use db::Database;
pub use error::{Error, Result};
pub use hashing::content_hash;
pub use resilience::{invoke, RetryPolicy};
pub use store::{KnowledgeOrder, KnowledgeQuery, KnowledgeStore};
