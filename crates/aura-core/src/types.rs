//! Shared data model for project-scoped retrieval.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge
// ─────────────────────────────────────────────────────────────────────────────

/// Indexing status of a knowledge source. Only `Indexed` sources are retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeStatus {
    Pending,
    Indexed,
}

impl KnowledgeStatus {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "indexed" => Some(Self::Indexed),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexed => "indexed",
        }
    }
}

impl std::fmt::Display for KnowledgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of retrievable project knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub status: KnowledgeStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Typed sidecar carried by a project embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub knowledge_source_id: Option<String>,
}

/// A precomputed embedding attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEmbeddingRecord {
    pub id: String,
    pub project_id: String,
    pub embedding: Vec<f32>,
    pub metadata: EmbeddingMetadata,
    pub created_at: i64,
}

/// Input for storing a new knowledge source
#[derive(Debug, Clone)]
pub struct NewKnowledgeSource {
    pub title: String,
    pub content: String,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewKnowledgeSource {
    pub fn new(title: impl Into<String>, content: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_type: source_type.into(),
            source_id: None,
            metadata: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retrieval output
// ─────────────────────────────────────────────────────────────────────────────

/// A ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
}

impl SearchResult {
    /// Build a result from a stored record with the given score
    pub fn from_record(record: &KnowledgeRecord, score: f32, include_metadata: bool) -> Self {
        Self {
            id: record.id.clone(),
            content: record.content.clone(),
            score,
            source_type: record.source_type.clone(),
            source_id: record.source_id.clone(),
            title: Some(record.title.clone()),
            metadata: if include_metadata { record.metadata.clone() } else { None },
            created_at: record.created_at,
        }
    }
}

/// A single dialogue turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Bounded context assembled for a model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub project_id: String,
    pub project_brief: Option<String>,
    pub recent_messages: Option<Vec<ChatMessage>>,
    pub knowledge_sources: Vec<SearchResult>,
    pub token_count: usize,
}

impl RetrievalContext {
    /// Render the context as prompt text.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if let Some(brief) = &self.project_brief {
            sections.push(format!("## Project Brief\n{}", brief));
        }

        if let Some(messages) = &self.recent_messages {
            let dialogue = messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("## Recent Conversation\n{}", dialogue));
        }

        if !self.knowledge_sources.is_empty() {
            let knowledge = self
                .knowledge_sources
                .iter()
                .map(|k| match &k.title {
                    Some(title) => format!("### {}\n{}", title, k.content),
                    None => k.content.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n\n");
            sections.push(format!("## Knowledge\n{}", knowledge));
        }

        sections.join("\n\n")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects, conversations, snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Summary fields of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBrief {
    pub id: String,
    pub title: Option<String>,
    pub client: Option<String>,
    pub status: String,
    pub description: Option<String>,
}

impl ProjectBrief {
    /// Text block used in packed context
    pub fn to_context_text(&self) -> String {
        format!(
            "Project: {}\nClient: {}\nStatus: {}\nDescription: {}",
            self.title.as_deref().unwrap_or("Untitled"),
            self.client.as_deref().unwrap_or("N/A"),
            self.status,
            self.description.as_deref().unwrap_or("No description"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub project_id: Option<String>,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: i64,
}

/// Project fields captured at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBrief {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: String,
}

/// Immutable audit record of the context available to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: String,
    pub conversation_id: String,
    pub project_id: String,
    pub brief: Option<SnapshotBrief>,
    pub knowledge_source_ids: Vec<String>,
    pub captured_at: i64,
}

/// Input for appending a context snapshot
#[derive(Debug, Clone)]
pub struct NewContextSnapshot {
    pub conversation_id: String,
    pub project_id: String,
    pub brief: Option<SnapshotBrief>,
    pub knowledge_source_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief_text_defaults() {
        let brief = ProjectBrief {
            id: "p1".into(),
            title: None,
            client: None,
            status: "active".into(),
            description: None,
        };
        assert_eq!(
            brief.to_context_text(),
            "Project: Untitled\nClient: N/A\nStatus: active\nDescription: No description"
        );
    }

    #[test]
    fn test_render_sections() {
        let ctx = RetrievalContext {
            project_id: "p1".into(),
            project_brief: Some("Project: Nova".into()),
            recent_messages: Some(vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }]),
            knowledge_sources: vec![],
            token_count: 0,
        };
        let text = ctx.render();
        assert!(text.starts_with("## Project Brief\nProject: Nova"));
        assert!(text.contains("## Recent Conversation\nuser: hi"));
        assert!(!text.contains("## Knowledge"));
    }

    #[test]
    fn test_metadata_sidecar_shape() {
        let meta: EmbeddingMetadata = serde_json::from_str(r#"{"knowledge_source_id":"ks-1"}"#).unwrap();
        assert_eq!(meta.knowledge_source_id.as_deref(), Some("ks-1"));

        let empty: EmbeddingMetadata = serde_json::from_str("{}").unwrap();
        assert!(empty.knowledge_source_id.is_none());
    }
}
