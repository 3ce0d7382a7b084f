//! Main SDK Entry Point
//!
//! [`Aura`] owns one instance of each collaborator and hands the same ones to
//! retrieval, structured output and verification. Nothing is global.

use std::sync::Arc;

use aura_core::auth::AccessControl;
use aura_core::client::CompletionBackend;
use aura_core::store::KnowledgeStore;
use aura_core::Result;
use tracing::debug;

use crate::config::AuraConfig;
use crate::embeddings::Embedder;
use crate::retrieval::{ContextOptions, ProjectScopedRetrieval};
use crate::structured::{Schema, StructuredGenerator};
use crate::verification::{VerificationPipeline, VerificationReport};

#[cfg(feature = "db")]
use aura_core::db::Database;

/// Caller-supplied collaborators for [`Aura::from_parts`]
pub struct AuraParts {
    pub store: Arc<dyn KnowledgeStore>,
    pub access: Arc<dyn AccessControl>,
    pub backend: Arc<dyn CompletionBackend>,
    pub embedder: Arc<dyn Embedder>,
}

/// Aura SDK - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use aura_sdk::{Aura, AuraConfig, SearchOptions};
///
/// async fn example() -> aura_core::Result<()> {
///     let aura = Aura::new(AuraConfig::load()?)?;
///
///     let hits = aura
///         .retrieval()
///         .search("project-1", "user-1", "kinetic typography", &SearchOptions::default())
///         .await?;
///
///     let answer = aura.verification().generate_verified_content("Who designed Futura?").await?;
///     Ok(())
/// }
/// ```
pub struct Aura {
    config: AuraConfig,

    #[cfg(feature = "db")]
    database: Option<Arc<Database>>,

    retrieval: ProjectScopedRetrieval,
    structured: StructuredGenerator,
    verification: VerificationPipeline,
}

impl Aura {
    /// Open the configured database and completion backend.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The database cannot be opened or migrated
    /// - The HTTP client cannot be built
    #[cfg(feature = "db")]
    pub fn new(config: AuraConfig) -> Result<Self> {
        use aura_core::client::HttpCompletionClient;
        use std::time::Duration;

        config.validate()?;

        let database = Arc::new(Database::open_path(&config.database_path)?);
        let backend = HttpCompletionClient::with_timeout(
            config.completion.base_url.clone(),
            Duration::from_secs(config.completion.timeout_seconds),
        )?
        .with_endpoint(config.completion.endpoint.clone())
        .with_api_key(config.completion.api_key.clone())
        .with_default_model(config.completion.model.clone());

        debug!(database = %config.database_path.display(), base_url = %config.completion.base_url, "opening aura");

        let parts = AuraParts {
            store: database.clone(),
            access: database.clone(),
            backend: Arc::new(backend),
            embedder: default_embedder(&config),
        };

        let mut aura = Self::from_parts(config, parts)?;
        aura.database = Some(database);
        Ok(aura)
    }

    /// Wire the SDK around caller-supplied collaborators
    pub fn from_parts(config: AuraConfig, parts: AuraParts) -> Result<Self> {
        config.validate()?;

        let policy = config.retry.policy();
        let retrieval = ProjectScopedRetrieval::new(parts.store, parts.access, parts.embedder, config.retrieval.clone());
        let structured =
            StructuredGenerator::new(parts.backend.clone(), policy.clone()).with_model(config.completion.model.clone());
        let verification = VerificationPipeline::with_config(parts.backend, policy, &config.verification)
            .with_model(config.completion.model.clone());

        Ok(Self {
            config,
            #[cfg(feature = "db")]
            database: None,
            retrieval,
            structured,
            verification,
        })
    }

    pub fn config(&self) -> &AuraConfig {
        &self.config
    }

    /// The SQLite store, when opened by [`Aura::new`]
    #[cfg(feature = "db")]
    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    pub fn retrieval(&self) -> &ProjectScopedRetrieval {
        &self.retrieval
    }

    pub fn structured(&self) -> &StructuredGenerator {
        &self.structured
    }

    pub fn verification(&self) -> &VerificationPipeline {
        &self.verification
    }

    /// Shorthand for [`StructuredGenerator::generate`]
    pub async fn generate_structured<S: Schema>(&self, prompt: &str, schema: &S) -> Result<S::Output> {
        self.structured.generate(prompt, schema).await
    }

    /// Shorthand for [`VerificationPipeline::generate_verified_content`]
    pub async fn generate_verified_content(&self, query: &str) -> Result<String> {
        self.verification.generate_verified_content(query).await
    }

    /// Verified answer grounded in the project's brief and knowledge.
    pub async fn generate_grounded(
        &self,
        project_id: &str,
        user_id: &str,
        query: &str,
        max_tokens: Option<usize>,
    ) -> Result<VerificationReport> {
        let mut options = ContextOptions::full(None);
        options.max_tokens = max_tokens;

        let context = self.retrieval.build_context(project_id, user_id, &options).await?;
        let rendered = context.render();
        let grounding = (!rendered.is_empty()).then_some(rendered.as_str());

        debug!(project_id, token_count = context.token_count, "grounding verification");
        self.verification.run_with_context(query, grounding).await
    }
}

#[cfg(feature = "db")]
fn default_embedder(config: &AuraConfig) -> Arc<dyn Embedder> {
    use crate::embeddings::CachedEmbedder;
    use std::time::Duration;

    let ttl = Duration::from_secs(config.embeddings.cache_ttl_seconds);
    let capacity = config.embeddings.cache_capacity as u64;

    #[cfg(feature = "embeddings")]
    {
        Arc::new(CachedEmbedder::with_limits(
            crate::embeddings::FastEmbedder::new(),
            ttl,
            capacity,
        ))
    }

    #[cfg(not(feature = "embeddings"))]
    {
        Arc::new(CachedEmbedder::with_limits(
            crate::embeddings::HashEmbedder::new(config.embeddings.dimensions),
            ttl,
            capacity,
        ))
    }
}

#[cfg(all(test, feature = "db"))]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::structured::SerdeSchema;
    use crate::testing::FnBackend;
    use aura_core::db::NewProject;
    use aura_core::types::NewKnowledgeSource;
    use tempfile::TempDir;

    fn parts(db: &Arc<Database>, backend: &Arc<FnBackend>) -> AuraParts {
        AuraParts {
            store: db.clone(),
            access: db.clone(),
            backend: backend.clone(),
            embedder: Arc::new(HashEmbedder::default()),
        }
    }

    #[test]
    fn test_new_opens_database() {
        let dir = TempDir::new().unwrap();
        let config = AuraConfig::new(dir.path().join("nested").join("aura.db"));

        let aura = Aura::new(config).unwrap();

        aura.database().unwrap().ping().unwrap();
        assert!(dir.path().join("nested").join("aura.db").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let backend = Arc::new(FnBackend::fixed(""));
        let mut config = AuraConfig::default();
        config.retry.max_attempts = 0;

        let err = Aura::from_parts(config, parts(&db, &backend)).err().unwrap();
        assert!(matches!(err, aura_core::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_generate_structured_uses_shared_backend() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let backend = Arc::new(FnBackend::fixed("[\"serif\", \"grotesk\"]"));
        let mut config = AuraConfig::default();
        config.completion.model = Some("gemini-2.0-flash".into());
        let aura = Aura::from_parts(config, parts(&db, &backend)).unwrap();

        let styles: Vec<String> = aura
            .generate_structured("List type styles", &SerdeSchema::new())
            .await
            .unwrap();

        assert_eq!(styles, vec!["serif", "grotesk"]);
        assert_eq!(backend.requests()[0].model.as_deref(), Some("gemini-2.0-flash"));
    }

    #[tokio::test]
    async fn test_generate_grounded() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let project_id = db
            .create_project(&NewProject {
                owner_id: "owner".into(),
                title: Some("Nova Rebrand".into()),
                ..Default::default()
            })
            .unwrap();
        let backend = Arc::new(FnBackend::new(|request, _| {
            if request.prompt.contains("Identify 3-5") {
                Ok("[]".into())
            } else {
                Ok("Use the ultramarine palette.".into())
            }
        }));
        let aura = Aura::from_parts(AuraConfig::default(), parts(&db, &backend)).unwrap();
        aura.retrieval()
            .ingest(&project_id, "owner", &NewKnowledgeSource::new("Palette", "Ultramarine and bone", "note"))
            .await
            .unwrap();

        let report = aura
            .generate_grounded(&project_id, "owner", "Which palette?", None)
            .await
            .unwrap();

        assert!(report.skipped);
        assert_eq!(report.answer, "Use the ultramarine palette.");
        let draft = &backend.requests()[0].prompt;
        assert!(draft.contains("Project: Nova Rebrand"));
        assert!(draft.contains("Ultramarine and bone"));

        let err = aura
            .generate_grounded(&project_id, "stranger", "Which palette?", None)
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(backend.calls(), 2);
    }
}
