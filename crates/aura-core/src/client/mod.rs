//! Text-completion backends.
//!
//! [`CompletionBackend`] is the seam every model call goes through. The
//! `client` feature adds [`HttpCompletionClient`], which talks to a chat
//! endpoint over HTTP.
//!
//! # Usage
//!
//! ```rust,no_run
//! use aura_core::client::{CompletionBackend, CompletionRequest, HttpCompletionClient};
//!
//! # async fn demo() -> aura_core::Result<()> {
//! let client = HttpCompletionClient::new("http://localhost:3000")?;
//! let text = client.complete(&CompletionRequest::new("Name three serif typefaces")).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "client")]
mod http;

#[cfg(feature = "client")]
pub use http::HttpCompletionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single completion call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Language-model text completion.
///
/// Implementations must surface HTTP-like status codes through
/// [`Error::Backend`](crate::Error::Backend) so the retry classifier can tell
/// transient failures from permanent ones, and must fail with
/// [`Error::EmptyResponse`](crate::Error::EmptyResponse) when the payload has no text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
