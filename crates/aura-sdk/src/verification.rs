//! Chain-of-verification answering.
//!
//! Four phases, each wrapped in its own resilient invocation:
//!
//! 1. **Draft** a baseline answer.
//! 2. **Plan** 3-5 verification questions about the draft's factual claims.
//!    An unparseable plan is not retried; it degrades to "skip verification"
//!    and the draft is returned as is.
//! 3. **Verify** each question independently and concurrently, without the
//!    draft in context. Fan-out is bounded by a semaphore. The first question
//!    to fail aborts the phase.
//! 4. **Revise** the draft against the findings.

use std::sync::Arc;

use aura_core::client::{CompletionBackend, CompletionRequest};
use aura_core::resilience::{invoke, RetryPolicy};
use aura_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::VerificationConfig;
use crate::utils::parse_model_json;

/// A verification question paired with its independent answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub question: String,
    pub answer: String,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub query: String,
    pub draft: String,
    pub questions: Vec<String>,
    pub findings: Vec<Finding>,
    /// Revised answer, or the draft when verification was skipped
    pub answer: String,
    pub skipped: bool,
}

pub struct VerificationPipeline {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    model: Option<String>,
    plan_model: Option<String>,
    fact_checker_instruction: String,
    max_concurrency: usize,
}

impl VerificationPipeline {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self::with_config(backend, policy, &VerificationConfig::default())
    }

    pub fn with_config(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy, config: &VerificationConfig) -> Self {
        Self {
            backend,
            policy,
            model: None,
            plan_model: config.plan_model.clone(),
            fact_checker_instruction: config.fact_checker_instruction.clone(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Model for the draft, verify and revise phases
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Final answer text only
    pub async fn generate_verified_content(&self, query: &str) -> Result<String> {
        Ok(self.run(query).await?.answer)
    }

    pub async fn run(&self, query: &str) -> Result<VerificationReport> {
        self.run_with_context(query, None).await
    }

    /// Run the pipeline with optional grounding text shown to the draft and
    /// revise phases. Verification questions never see it.
    pub async fn run_with_context(&self, query: &str, context: Option<&str>) -> Result<VerificationReport> {
        info!(phase = "draft", "verification started");
        let draft = self.draft(query, context).await?;

        info!(phase = "plan", "planning verification questions");
        let questions = self.plan(&draft).await?;

        if questions.is_empty() {
            info!("no verification questions, returning draft");
            return Ok(VerificationReport {
                query: query.to_string(),
                answer: draft.clone(),
                draft,
                questions,
                findings: Vec::new(),
                skipped: true,
            });
        }

        info!(phase = "verify", questions = questions.len(), "answering verification questions");
        let findings = self.verify(&questions).await?;

        info!(phase = "revise", "revising draft");
        let answer = self.revise(query, context, &draft, &findings).await?;

        Ok(VerificationReport {
            query: query.to_string(),
            draft,
            questions,
            findings,
            answer,
            skipped: false,
        })
    }

    async fn draft(&self, query: &str, context: Option<&str>) -> Result<String> {
        let prompt = match context {
            Some(context) => format!(
                "Use the project context below where it is relevant.\n\n{context}\n\nAnswer the following question in detail:\nQuestion: {query}"
            ),
            None => format!("Answer the following question in detail:\nQuestion: {query}"),
        };
        self.complete(CompletionRequest::new(prompt).with_model(self.model.clone()))
            .await
    }

    async fn plan(&self, draft: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Context: {draft}\n\n\
             Task: Identify 3-5 distinct factual claims in the text above that could be incorrect. \
             Generate verification questions to check these claims.\n\n\
             Output strictly a JSON list of strings, e.g.:\n\
             [\"What represents the X in Y?\", \"Is Z a valid parameter?\"]"
        );
        let request = CompletionRequest::new(prompt)
            .with_system(self.fact_checker_instruction.clone())
            .with_model(self.plan_model.clone().or_else(|| self.model.clone()));

        let raw = self.complete(request).await?;
        Ok(parse_questions(&raw))
    }

    async fn verify(&self, questions: &[String]) -> Result<Vec<Finding>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (index, question) in questions.iter().enumerate() {
            let backend = self.backend.clone();
            let policy = self.policy.clone();
            let semaphore = semaphore.clone();
            let request = CompletionRequest::new(format!(
                "Answer this question concisely and accurately based on general knowledge.\nQuestion: {question}"
            ))
            .with_model(self.model.clone());

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(format!("verification semaphore closed: {e}")))?;
                let answer = invoke(&policy, || backend.complete(&request)).await?;
                Ok::<_, Error>((index, answer))
            });
        }

        let mut answers: Vec<Option<String>> = vec![None; questions.len()];
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined.map_err(|e| Error::Other(format!("verification task failed: {e}")))?;
            match outcome {
                Ok((index, answer)) => {
                    debug!(index, "verification question answered");
                    answers[index] = Some(answer);
                }
                Err(err) => {
                    warn!(error = %err, "verification question failed, aborting verify phase");
                    join_set.abort_all();
                    return Err(err);
                }
            }
        }

        questions
            .iter()
            .zip(answers)
            .map(|(question, answer)| {
                let answer = answer.ok_or_else(|| Error::Other(format!("no answer for question: {question}")))?;
                Ok(Finding {
                    question: question.clone(),
                    answer,
                })
            })
            .collect()
    }

    async fn revise(&self, query: &str, context: Option<&str>, draft: &str, findings: &[Finding]) -> Result<String> {
        let evidence = findings
            .iter()
            .map(|f| format!("Q: {}\nA: {}", f.question, f.answer))
            .collect::<Vec<_>>()
            .join("\n");
        let context = context.map(|c| format!("Project Context:\n{c}\n\n")).unwrap_or_default();
        let prompt = format!(
            "{context}Original Question: {query}\n\n\
             Draft Answer: {draft}\n\n\
             Verification Findings:\n{evidence}\n\n\
             Task: Rewrite the Draft Answer to be fully accurate based ONLY on the Verification Findings.\n\
             - If the Draft had errors, correct them.\n\
             - If the Draft was correct, refine the clarity.\n\
             - Do not mention \"Verification Findings\" in the final output."
        );
        self.complete(CompletionRequest::new(prompt).with_model(self.model.clone()))
            .await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        invoke(&self.policy, || self.backend.complete(&request)).await
    }
}

/// Questions from a plan response; anything unusable yields an empty list.
fn parse_questions(raw: &str) -> Vec<String> {
    match parse_model_json(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Ok(other) => {
            warn!(kind = json_kind(&other), "verification plan is not a list, skipping verification");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "failed to parse verification plan, skipping verification");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
