//! HTTP completion client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionBackend, CompletionRequest};
use crate::error::{Error, Result};

/// Default chat endpoint path
pub const DEFAULT_ENDPOINT: &str = "/api/ai/chat";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Completion backend over a JSON chat endpoint
#[derive(Clone)]
pub struct HttpCompletionClient {
    base_url: String,
    endpoint: String,
    api_key: Option<String>,
    default_model: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    /// JSON-encoded `{"systemInstruction": ...}`
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: Option<String>,
}

impl HttpCompletionClient {
    /// Create a client for `base_url` with the default endpoint and timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            default_model: None,
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Model used when a request names none
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model;
        self
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    fn map_send_error(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::backend(408, format!("Request timed out: {}", e))
        } else if let Some(status) = e.status() {
            Error::backend(status.as_u16(), e.to_string())
        } else {
            Error::network(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let context = serde_json::to_string(&ChatContext {
            system_instruction: request.system_instruction.as_deref(),
        })?;
        let body = ChatRequest {
            message: &request.prompt,
            context,
            model: request.model.as_deref().or(self.default_model.as_deref()),
        };

        let url = self.url();
        debug!(url = %url, model = ?body.model, "POST completion");

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(Self::map_send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::backend(status.as_u16(), format!("{}: {}", status, text)));
        }

        let data: ChatResponse = resp.json().await.map_err(Self::map_send_error)?;
        match data.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(Error::EmptyResponse),
        }
    }
}
