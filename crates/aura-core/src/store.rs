//! Knowledge store interface.
//!
//! Retrieval reads through this trait so the SQLite [`Database`](crate::db::Database)
//! can be swapped for any other record store keyed by project.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::*;

/// Sort order for knowledge listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KnowledgeOrder {
    #[default]
    CreatedDesc,
    UpdatedDesc,
}

/// Filtered listing of a project's knowledge sources
#[derive(Debug, Clone)]
pub struct KnowledgeQuery {
    pub project_id: String,
    pub status: Option<KnowledgeStatus>,
    pub source_types: Option<Vec<String>>,
    pub order: KnowledgeOrder,
    pub limit: Option<usize>,
}

impl KnowledgeQuery {
    /// Indexed sources of a project, newest first
    pub fn indexed(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            status: Some(KnowledgeStatus::Indexed),
            source_types: None,
            order: KnowledgeOrder::CreatedDesc,
            limit: None,
        }
    }

    pub fn source_types(mut self, source_types: Option<Vec<String>>) -> Self {
        self.source_types = source_types.filter(|t| !t.is_empty());
        self
    }

    pub fn order(mut self, order: KnowledgeOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Project-keyed record store
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn list_knowledge(&self, query: &KnowledgeQuery) -> Result<Vec<KnowledgeRecord>>;

    /// Records among `ids` that belong to `project_id`
    async fn knowledge_by_ids(&self, project_id: &str, ids: &[String]) -> Result<Vec<KnowledgeRecord>>;

    async fn project_embeddings(&self, project_id: &str) -> Result<Vec<ProjectEmbeddingRecord>>;

    async fn project_brief(&self, project_id: &str) -> Result<Option<ProjectBrief>>;

    async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// The `limit` most recent messages, oldest first
    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Store an indexed source together with the project embedding that
    /// points at it, atomically. Content already present in the project is
    /// rejected with [`Error::AlreadyExists`](crate::Error::AlreadyExists).
    async fn insert_indexed_knowledge(
        &self,
        project_id: &str,
        source: &NewKnowledgeSource,
        embedding: &[f32],
    ) -> Result<String>;

    /// Append-only
    async fn insert_snapshot(&self, snapshot: &NewContextSnapshot) -> Result<String>;

    async fn context_snapshot(&self, snapshot_id: &str) -> Result<Option<ContextSnapshot>>;
}
