//! Typed output from a free-text model.
//!
//! [`StructuredGenerator::generate`] runs the whole cycle (completion, fence
//! stripping, JSON parse, schema check) inside one resilient invocation, so a
//! malformed answer triggers a fresh completion rather than a re-parse of the
//! same text. When every attempt fails validation the terminal
//! [`Error::RetryExhausted`] reports
//! [`is_validation_failure`](Error::is_validation_failure).
//!
//! ```rust,no_run
//! use aura_sdk::structured::{SerdeSchema, StructuredGenerator};
//!
//! #[derive(serde::Deserialize)]
//! struct Palette {
//!     name: String,
//!     colors: Vec<String>,
//! }
//!
//! # async fn demo(generator: StructuredGenerator) -> aura_core::Result<()> {
//! let schema = SerdeSchema::<Palette>::new().with_rule(|p| {
//!     if p.colors.is_empty() {
//!         return Err("palette has no colors".into());
//!     }
//!     Ok(())
//! });
//! let palette = generator.generate("Suggest a palette for a jazz festival", &schema).await?;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use aura_core::client::{CompletionBackend, CompletionRequest};
use aura_core::resilience::{invoke, RetryPolicy};
use aura_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::utils::parse_model_json;

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single valid JSON value only. Do not add explanations or markdown.";

/// Parses a typed value out of untyped JSON, rejecting mismatches with a message.
pub trait Schema: Send + Sync {
    type Output;

    fn parse(&self, value: Value) -> std::result::Result<Self::Output, String>;
}

type Rule<T> = Box<dyn Fn(&T) -> std::result::Result<(), String> + Send + Sync>;

/// Schema backed by `serde` deserialization plus an optional semantic rule.
pub struct SerdeSchema<T> {
    rule: Option<Rule<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self {
            rule: None,
            _marker: PhantomData,
        }
    }
}

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additional check run after deserialization succeeds
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.rule = Some(Box::new(rule));
        self
    }
}

impl<T: DeserializeOwned> Schema for SerdeSchema<T> {
    type Output = T;

    fn parse(&self, value: Value) -> std::result::Result<T, String> {
        let parsed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if let Some(rule) = &self.rule {
            rule(&parsed)?;
        }
        Ok(parsed)
    }
}

/// Generates schema-conforming values from a completion backend
#[derive(Clone)]
pub struct StructuredGenerator {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    model: Option<String>,
}

impl StructuredGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub async fn generate<S: Schema>(&self, prompt: &str, schema: &S) -> Result<S::Output> {
        let request = CompletionRequest::new(prompt)
            .with_system(JSON_ONLY_INSTRUCTION)
            .with_model(self.model.clone());

        invoke(&self.policy, || async {
            let raw = self.backend.complete(&request).await?;
            let value = parse_model_json(&raw)
                .map_err(|e| Error::validation(format!("model output is not JSON: {e}")))?;
            schema.parse(value).map_err(|e| {
                debug!(error = %e, "model output rejected by schema");
                Error::validation(format!("model output does not match schema: {e}"))
            })
        })
        .await
    }
}
