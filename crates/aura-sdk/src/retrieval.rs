//! Project-scoped retrieval.
//!
//! Every operation asks the access oracle first and touches no project data
//! when it refuses. Records coming back from the store are filtered by project
//! again before use, so a store that ignores the project filter still cannot
//! leak another project's knowledge.

use std::sync::Arc;

use aura_core::auth::{authorize, AccessControl, Action};
use aura_core::packing::{pack, ContextBlock};
use aura_core::store::{KnowledgeOrder, KnowledgeQuery, KnowledgeStore};
use aura_core::types::*;
use aura_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embeddings::{cosine_similarity, Embedder};

const BRIEF_PRIORITY: i32 = 30;
const MESSAGES_PRIORITY: i32 = 20;
const KNOWLEDGE_PRIORITY: i32 = 10;

/// Options for [`ProjectScopedRetrieval::search`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub source_types: Option<Vec<String>>,
    pub include_metadata: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.5,
            source_types: None,
            include_metadata: false,
        }
    }
}

impl SearchOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn source_types(mut self, source_types: Vec<String>) -> Self {
        self.source_types = Some(source_types);
        self
    }

    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// Options for [`ProjectScopedRetrieval::build_context`]
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub conversation_id: Option<String>,
    pub max_tokens: Option<usize>,
    pub include_project_brief: bool,
    pub include_recent_messages: bool,
    pub include_knowledge_sources: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            conversation_id: None,
            max_tokens: None,
            include_project_brief: false,
            include_recent_messages: false,
            include_knowledge_sources: true,
        }
    }
}

impl ContextOptions {
    /// Brief, dialogue (when a conversation is given) and knowledge
    pub fn full(conversation_id: Option<String>) -> Self {
        Self {
            include_project_brief: true,
            include_recent_messages: conversation_id.is_some(),
            conversation_id,
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Source of each packed block
enum Slot {
    Brief,
    Messages(Vec<ChatMessage>),
    Knowledge(KnowledgeRecord),
}

/// Retrieval over a knowledge store, gated by an access oracle.
pub struct ProjectScopedRetrieval {
    store: Arc<dyn KnowledgeStore>,
    access: Arc<dyn AccessControl>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl ProjectScopedRetrieval {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        access: Arc<dyn AccessControl>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            access,
            embedder,
            config,
        }
    }

    /// Search options seeded from configuration
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.config.default_limit,
            threshold: self.config.default_threshold,
            ..Default::default()
        }
    }

    /// Rank a project's indexed knowledge against `query`.
    ///
    /// The newest `limit` candidates are scored; a missing embedding scores 0.
    /// Hits at or above the threshold are returned best first, ties keeping
    /// recency order.
    pub async fn search(
        &self,
        project_id: &str,
        user_id: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        authorize(self.access.as_ref(), project_id, user_id, Action::Read).await?;

        let knowledge_query = KnowledgeQuery::indexed(project_id)
            .source_types(options.source_types.clone())
            .limit(options.limit);

        let (mut records, query_embedding) = tokio::try_join!(
            self.store.list_knowledge(&knowledge_query),
            self.embedder.embed(query),
        )?;
        retain_project(&mut records, project_id);

        let mut results: Vec<SearchResult> = records
            .iter()
            .map(|record| {
                let score = record
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(&query_embedding, e))
                    .unwrap_or(0.0);
                SearchResult::from_record(record, score, options.include_metadata)
            })
            .filter(|r| r.score >= options.threshold)
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(options.limit);

        debug!(project_id, candidates = records.len(), hits = results.len(), "search complete");
        Ok(results)
    }

    /// Assemble brief, recent dialogue and knowledge into a token-bounded context.
    pub async fn build_context(
        &self,
        project_id: &str,
        user_id: &str,
        options: &ContextOptions,
    ) -> Result<RetrievalContext> {
        authorize(self.access.as_ref(), project_id, user_id, Action::Read).await?;

        let max_tokens = options.max_tokens.unwrap_or(self.config.default_max_tokens);
        let mut blocks = Vec::new();
        let mut slots = Vec::new();

        if options.include_project_brief {
            if let Some(brief) = self.store.project_brief(project_id).await? {
                blocks.push(ContextBlock::new("brief", brief.to_context_text(), BRIEF_PRIORITY));
                slots.push(Slot::Brief);
            }
        }

        if options.include_recent_messages {
            if let Some(conversation_id) = options.conversation_id.as_deref() {
                if let Some(messages) = self.conversation_messages(project_id, conversation_id).await? {
                    let text = messages
                        .iter()
                        .map(|m| format!("{}: {}", m.role, m.content))
                        .collect::<Vec<_>>()
                        .join("\n");
                    blocks.push(ContextBlock::new("messages", text, MESSAGES_PRIORITY).atomic());
                    slots.push(Slot::Messages(messages));
                }
            }
        }

        if options.include_knowledge_sources {
            let query = KnowledgeQuery::indexed(project_id)
                .order(KnowledgeOrder::UpdatedDesc)
                .limit(self.config.context_sources);
            let mut records = self.store.list_knowledge(&query).await?;
            retain_project(&mut records, project_id);

            for record in records {
                blocks.push(ContextBlock::new(
                    format!("knowledge:{}", record.id),
                    record.content.clone(),
                    KNOWLEDGE_PRIORITY,
                ));
                slots.push(Slot::Knowledge(record));
            }
        }

        let packed = pack(&blocks, max_tokens);
        let mut context = RetrievalContext {
            project_id: project_id.to_string(),
            token_count: packed.token_count,
            ..Default::default()
        };

        for block in packed.blocks {
            match &slots[block.index] {
                Slot::Brief => context.project_brief = Some(block.content),
                Slot::Messages(messages) => context.recent_messages = Some(messages.clone()),
                Slot::Knowledge(record) => {
                    let mut result = SearchResult::from_record(record, 1.0, false);
                    result.content = block.content;
                    context.knowledge_sources.push(result);
                }
            }
        }

        debug!(
            project_id,
            max_tokens,
            token_count = context.token_count,
            knowledge = context.knowledge_sources.len(),
            "context built"
        );
        Ok(context)
    }

    async fn conversation_messages(&self, project_id: &str, conversation_id: &str) -> Result<Option<Vec<ChatMessage>>> {
        let Some(conversation) = self.store.conversation(conversation_id).await? else {
            return Ok(None);
        };
        if conversation.project_id.as_deref() != Some(project_id) {
            warn!(project_id, conversation_id, "conversation belongs to another project, messages skipped");
            return Ok(None);
        }

        let messages = self
            .store
            .recent_messages(conversation_id, self.config.recent_messages)
            .await?;
        Ok((!messages.is_empty()).then_some(messages))
    }

    /// Rank a project's precomputed embeddings and resolve them to knowledge.
    ///
    /// Only scores strictly above the semantic threshold survive. Hits whose
    /// knowledge source is missing, unindexed or in another project are
    /// dropped.
    pub async fn semantic_search(
        &self,
        project_id: &str,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        authorize(self.access.as_ref(), project_id, user_id, Action::Read).await?;

        let (query_embedding, embeddings) = tokio::try_join!(
            self.embedder.embed(query),
            self.store.project_embeddings(project_id),
        )?;

        let mut scored: Vec<(String, f32)> = embeddings
            .iter()
            .filter(|e| e.project_id == project_id)
            .filter_map(|e| {
                let source_id = e.metadata.knowledge_source_id.clone()?;
                Some((source_id, cosine_similarity(&query_embedding, &e.embedding)))
            })
            .filter(|(_, score)| *score > self.config.semantic_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = scored.iter().map(|(id, _)| id.clone()).collect();
        let mut records = self.store.knowledge_by_ids(project_id, &ids).await?;
        retain_project(&mut records, project_id);

        let results: Vec<SearchResult> = scored
            .iter()
            .filter_map(|(id, score)| {
                let record = records.iter().find(|r| &r.id == id);
                if record.is_none() {
                    warn!(project_id, knowledge_source_id = %id, "embedding does not resolve to project knowledge, dropped");
                }
                record.map(|r| SearchResult::from_record(r, *score, true))
            })
            .collect();

        debug!(project_id, hits = results.len(), "semantic search complete");
        Ok(results)
    }

    /// Persist an immutable record of the project's current brief and indexed sources.
    pub async fn create_context_snapshot(
        &self,
        conversation_id: &str,
        project_id: &str,
        user_id: &str,
    ) -> Result<String> {
        authorize(self.access.as_ref(), project_id, user_id, Action::Write).await?;

        let indexed = KnowledgeQuery::indexed(project_id);
        let (brief, mut records) = tokio::try_join!(
            self.store.project_brief(project_id),
            self.store.list_knowledge(&indexed),
        )?;
        retain_project(&mut records, project_id);

        let snapshot = NewContextSnapshot {
            conversation_id: conversation_id.to_string(),
            project_id: project_id.to_string(),
            brief: brief.map(|b| SnapshotBrief {
                title: b.title,
                description: b.description,
                status: b.status,
            }),
            knowledge_source_ids: records.into_iter().map(|r| r.id).collect(),
        };

        let id = self.store.insert_snapshot(&snapshot).await?;
        info!(
            snapshot_id = %id,
            project_id,
            conversation_id,
            sources = snapshot.knowledge_source_ids.len(),
            "context snapshot created"
        );
        Ok(id)
    }

    /// Read a snapshot; requires read access to its project.
    ///
    /// A snapshot the user may not read is reported as not found, so ids of
    /// other projects' snapshots cannot be probed.
    pub async fn context_snapshot(&self, snapshot_id: &str, user_id: &str) -> Result<ContextSnapshot> {
        let not_found = || Error::not_found("Context snapshot", snapshot_id);
        let snapshot = self.store.context_snapshot(snapshot_id).await?.ok_or_else(not_found)?;

        if !self
            .access
            .has_permission(&snapshot.project_id, user_id, Action::Read)
            .await?
        {
            warn!(snapshot_id, user_id, "snapshot read denied");
            return Err(not_found());
        }
        Ok(snapshot)
    }

    /// Embed and store a new knowledge source, returning its id.
    ///
    /// The source and its project embedding are written in one store call, so
    /// a failure leaves nothing searchable behind. Content already in the
    /// project fails with `AlreadyExists`.
    pub async fn ingest(&self, project_id: &str, user_id: &str, source: &NewKnowledgeSource) -> Result<String> {
        authorize(self.access.as_ref(), project_id, user_id, Action::Write).await?;

        let embedding = self.embedder.embed(&source.content).await?;
        let id = self
            .store
            .insert_indexed_knowledge(project_id, source, &embedding)
            .await?;

        info!(knowledge_source_id = %id, project_id, source_type = %source.source_type, "knowledge source indexed");
        Ok(id)
    }
}

/// Keep only indexed records of `project_id`
fn retain_project(records: &mut Vec<KnowledgeRecord>, project_id: &str) {
    let before = records.len();
    records.retain(|r| r.project_id == project_id && r.status == KnowledgeStatus::Indexed);
    if records.len() != before {
        warn!(project_id, dropped = before - records.len(), "store returned out-of-scope records");
    }
}
