//! Aura SDK - project-scoped retrieval and verified generation
//!
//! Builds on `aura-core` with the pieces that talk to models:
//!
//! - **embeddings** - Embedder interface, cosine similarity, TTL cache
//! - **retrieval** - Access-checked search, semantic search, context building and snapshots
//! - **structured** - Schema-validated JSON output with regeneration on failure
//! - **verification** - Draft, plan, verify, revise answering
//! - **config** - TOML and environment configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use aura_sdk::{Aura, AuraConfig, ContextOptions};
//!
//! async fn example() -> aura_core::Result<()> {
//!     let aura = Aura::new(AuraConfig::load()?)?;
//!
//!     let context = aura
//!         .retrieval()
//!         .build_context("project-1", "user-1", &ContextOptions::full(None).max_tokens(2000))
//!         .await?;
//!     println!("{}", context.render());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embeddings;
pub mod retrieval;
pub mod structured;
pub mod utils;
pub mod verification;

mod sdk;

#[cfg(test)]
mod testing;

// Re-export main SDK types
pub use config::{AuraConfig, ConfigValidationError};
pub use embeddings::{cosine_similarity, CachedEmbedder, Embedder, HashEmbedder};
pub use retrieval::{ContextOptions, ProjectScopedRetrieval, SearchOptions};
pub use sdk::{Aura, AuraParts};
pub use structured::{Schema, SerdeSchema, StructuredGenerator};
pub use verification::{Finding, VerificationPipeline, VerificationReport};

#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;
