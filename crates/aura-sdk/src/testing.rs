//! In-memory fakes shared by unit tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use aura_core::auth::{AccessControl, Action};
use aura_core::client::{CompletionBackend, CompletionRequest};
use aura_core::store::{KnowledgeQuery, KnowledgeStore};
use aura_core::types::*;
use aura_core::{Error, Result};

pub struct AllowAll;

#[async_trait]
impl AccessControl for AllowAll {
    async fn has_permission(&self, _project_id: &str, _user_id: &str, _action: Action) -> Result<bool> {
        Ok(true)
    }
}

pub struct DenyAll;

#[async_trait]
impl AccessControl for DenyAll {
    async fn has_permission(&self, _project_id: &str, _user_id: &str, _action: Action) -> Result<bool> {
        Ok(false)
    }
}

/// Vector-backed store. A leaky store ignores project filters, standing in
/// for a misbehaving backend. `touches` counts every call.
#[derive(Default)]
pub struct MemoryStore {
    leaky: bool,
    records: Mutex<Vec<KnowledgeRecord>>,
    embeddings: Mutex<Vec<ProjectEmbeddingRecord>>,
    snapshots: Mutex<Vec<ContextSnapshot>>,
    pub touches: AtomicUsize,
}

impl MemoryStore {
    pub fn leaky() -> Self {
        Self {
            leaky: true,
            ..Default::default()
        }
    }

    pub fn add_record(&self, project_id: &str, id: &str, content: &str, embedding: Option<Vec<f32>>) {
        let mut records = self.records.lock().unwrap();
        let now = records.len() as i64;
        records.insert(
            0,
            KnowledgeRecord {
                id: id.to_string(),
                project_id: project_id.to_string(),
                title: id.to_string(),
                content: content.to_string(),
                source_type: "document".to_string(),
                source_id: None,
                metadata: None,
                embedding,
                status: KnowledgeStatus::Indexed,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn add_embedding(&self, project_id: &str, embedding: Vec<f32>, knowledge_source_id: &str) {
        let mut embeddings = self.embeddings.lock().unwrap();
        let id = format!("emb-{}", embeddings.len());
        embeddings.push(ProjectEmbeddingRecord {
            id,
            project_id: project_id.to_string(),
            embedding,
            metadata: EmbeddingMetadata {
                knowledge_source_id: Some(knowledge_source_id.to_string()),
            },
            created_at: 0,
        });
    }

    fn touch(&self) {
        self.touches.fetch_add(1, Ordering::SeqCst);
    }

    fn in_scope(&self, record_project: &str, project_id: &str) -> bool {
        self.leaky || record_project == project_id
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn list_knowledge(&self, query: &KnowledgeQuery) -> Result<Vec<KnowledgeRecord>> {
        self.touch();
        let records = self.records.lock().unwrap();
        let mut out: Vec<KnowledgeRecord> = records
            .iter()
            .filter(|r| self.in_scope(&r.project_id, &query.project_id))
            .filter(|r| query.status.is_none_or(|s| s == r.status))
            .filter(|r| {
                query
                    .source_types
                    .as_ref()
                    .is_none_or(|types| types.contains(&r.source_type))
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn knowledge_by_ids(&self, project_id: &str, ids: &[String]) -> Result<Vec<KnowledgeRecord>> {
        self.touch();
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| ids.contains(&r.id) && self.in_scope(&r.project_id, project_id))
            .cloned()
            .collect())
    }

    async fn project_embeddings(&self, project_id: &str) -> Result<Vec<ProjectEmbeddingRecord>> {
        self.touch();
        let embeddings = self.embeddings.lock().unwrap();
        Ok(embeddings
            .iter()
            .filter(|e| self.in_scope(&e.project_id, project_id))
            .cloned()
            .collect())
    }

    async fn project_brief(&self, _project_id: &str) -> Result<Option<ProjectBrief>> {
        self.touch();
        Ok(None)
    }

    async fn conversation(&self, _conversation_id: &str) -> Result<Option<Conversation>> {
        self.touch();
        Ok(None)
    }

    async fn recent_messages(&self, _conversation_id: &str, _limit: usize) -> Result<Vec<ChatMessage>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn insert_indexed_knowledge(
        &self,
        project_id: &str,
        source: &NewKnowledgeSource,
        embedding: &[f32],
    ) -> Result<String> {
        self.touch();
        let existing = self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.project_id == project_id && r.content == source.content)
            .map(|r| r.id.clone());
        if let Some(id) = existing {
            return Err(Error::already_exists("Knowledge source", id));
        }

        let id = format!("ks-{}", self.records.lock().unwrap().len());
        self.add_record(project_id, &id, &source.content, Some(embedding.to_vec()));
        self.add_embedding(project_id, embedding.to_vec(), &id);
        Ok(id)
    }

    async fn insert_snapshot(&self, snapshot: &NewContextSnapshot) -> Result<String> {
        self.touch();
        let mut snapshots = self.snapshots.lock().unwrap();
        let id = format!("snap-{}", snapshots.len());
        snapshots.push(ContextSnapshot {
            id: id.clone(),
            conversation_id: snapshot.conversation_id.clone(),
            project_id: snapshot.project_id.clone(),
            brief: snapshot.brief.clone(),
            knowledge_source_ids: snapshot.knowledge_source_ids.clone(),
            captured_at: 0,
        });
        Ok(id)
    }

    async fn context_snapshot(&self, snapshot_id: &str) -> Result<Option<ContextSnapshot>> {
        self.touch();
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots.iter().find(|s| s.id == snapshot_id).cloned())
    }
}

type Responder = Box<dyn Fn(&CompletionRequest, u32) -> Result<String> + Send + Sync>;

/// Completion backend driven by a closure of (request, zero-based call number).
pub struct FnBackend {
    responder: Responder,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FnBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest, u32) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Answer without recording the call
    pub fn respond(&self, request: &CompletionRequest, call: u32) -> Result<String> {
        (self.responder)(request, call)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for FnBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request, call)
    }
}
