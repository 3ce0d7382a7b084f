//! SQLite knowledge store and access oracle.
//!
//! [`Database`] implements both [`KnowledgeStore`] and [`AccessControl`] over a
//! single connection. Schema migrations are embedded and run on open.
//!
//! Access semantics: the project owner holds every permission; otherwise the
//! user's access entry must list the action (or `admin`); with no entry a
//! `public` project grants `read` only; an unknown project grants nothing.

pub mod types;

pub use types::*;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use crate::auth::{AccessControl, Action, Role};
use crate::error::{Error, Result};
use crate::hashing::content_hash;
use crate::store::{KnowledgeOrder, KnowledgeQuery, KnowledgeStore};
use crate::types::*;

/// Knowledge tables SQL (001)
const KNOWLEDGE_TABLES_SQL: &str = include_str!("migrations/001_knowledge_tables.sql");

const KNOWLEDGE_COLUMNS: &str = "id, project_id, title, content, source_type, source_id, metadata_json,
     embedding_json, status, created_at, updated_at";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run migrations
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    /// Run embedded migrations
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch(KNOWLEDGE_TABLES_SQL)?;
        Ok(())
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Project Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a project, returning its id
    pub fn create_project(&self, project: &NewProject) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO project
             (id, owner_id, title, client, status, description, access_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?7)",
            params![
                id,
                project.owner_id,
                project.title,
                project.client,
                project.description,
                project.access_level.as_str(),
                now,
            ],
        )?;

        Ok(id)
    }

    /// Get the project summary
    pub fn get_project_brief(&self, project_id: &str) -> Result<Option<ProjectBrief>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(conn
            .query_row(
                "SELECT id, title, client, status, description FROM project WHERE id = ?1",
                params![project_id],
                |row| {
                    Ok(ProjectBrief {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        client: row.get(2)?,
                        status: row.get(3)?,
                        description: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// Grant (or replace) a collaborator's access. Without explicit
    /// permissions the role's defaults apply.
    pub fn grant_access(
        &self,
        project_id: &str,
        user_id: &str,
        role: Role,
        permissions: Option<Vec<Action>>,
        granted_by: Option<&str>,
    ) -> Result<()> {
        let permissions = permissions.unwrap_or_else(|| role.default_permissions().to_vec());
        let permissions_json = serde_json::to_string(&permissions)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO project_access_control
             (project_id, user_id, role, permissions_json, granted_by, granted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_id, user_id) DO UPDATE SET
                role = excluded.role,
                permissions_json = excluded.permissions_json,
                granted_by = excluded.granted_by,
                granted_at = excluded.granted_at",
            params![project_id, user_id, role.as_str(), permissions_json, granted_by, now],
        )?;

        Ok(())
    }

    /// List a project's access entries
    pub fn list_access(&self, project_id: &str) -> Result<Vec<AccessGrant>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT project_id, user_id, role, permissions_json, granted_by, granted_at
             FROM project_access_control WHERE project_id = ?1 ORDER BY granted_at",
        )?;

        let grants = stmt
            .query_map(params![project_id], |row| {
                let role: String = row.get(2)?;
                Ok(AccessGrant {
                    project_id: row.get(0)?,
                    user_id: row.get(1)?,
                    role: Role::from_str(&role).ok_or_else(|| invalid_text(2, format!("unknown role {role}")))?,
                    permissions: json_column(row, 3)?.unwrap_or_default(),
                    granted_by: row.get(4)?,
                    granted_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(grants)
    }

    /// Evaluate the access rules for one action
    pub fn check_permission(&self, project_id: &str, user_id: &str, action: Action) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;

        let project: Option<(String, String)> = conn
            .query_row(
                "SELECT owner_id, access_level FROM project WHERE id = ?1",
                params![project_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((owner_id, access_level)) = project else {
            return Ok(false);
        };
        if owner_id == user_id {
            return Ok(true);
        }

        let entry: Option<String> = conn
            .query_row(
                "SELECT permissions_json FROM project_access_control
                 WHERE project_id = ?1 AND user_id = ?2",
                params![project_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(json) = entry {
            let permissions: Vec<Action> = serde_json::from_str(&json)?;
            return Ok(permissions.contains(&action) || permissions.contains(&Action::Admin));
        }

        Ok(action == Action::Read && AccessLevel::from_str(&access_level) == Some(AccessLevel::Public))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Knowledge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// List a project's knowledge sources
    pub fn query_knowledge(&self, query: &KnowledgeQuery) -> Result<Vec<KnowledgeRecord>> {
        let mut sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge_source WHERE project_id = ?");
        let mut values = vec![Value::Text(query.project_id.clone())];

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(types) = query.source_types.as_ref().filter(|t| !t.is_empty()) {
            sql.push_str(&format!(" AND source_type IN ({})", placeholders(types.len())));
            values.extend(types.iter().cloned().map(Value::Text));
        }
        sql.push_str(match query.order {
            KnowledgeOrder::CreatedDesc => " ORDER BY created_at DESC, rowid DESC",
            KnowledgeOrder::UpdatedDesc => " ORDER BY updated_at DESC, rowid DESC",
        });
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), Self::map_knowledge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Point lookup restricted to one project
    pub fn get_knowledge_by_ids(&self, project_id: &str, ids: &[String]) -> Result<Vec<KnowledgeRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {KNOWLEDGE_COLUMNS} FROM knowledge_source WHERE project_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let mut values = vec![Value::Text(project_id.to_string())];
        values.extend(ids.iter().cloned().map(Value::Text));

        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), Self::map_knowledge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn map_knowledge(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeRecord> {
        let status: String = row.get(8)?;
        Ok(KnowledgeRecord {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            source_type: row.get(4)?,
            source_id: row.get(5)?,
            metadata: json_column(row, 6)?,
            embedding: json_column(row, 7)?,
            status: KnowledgeStatus::from_str(&status)
                .ok_or_else(|| invalid_text(8, format!("unknown status {status}")))?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    /// Store a knowledge source as pending
    pub fn create_knowledge_source(&self, project_id: &str, source: &NewKnowledgeSource) -> Result<String> {
        let metadata_json = source.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let hash = content_hash(&source.content);
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        ensure_new_content(&conn, project_id, &hash)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        insert_knowledge_row(&conn, &id, project_id, source, &hash, metadata_json, None, now)?;

        Ok(id)
    }

    /// Store an indexed knowledge source and its project embedding in one
    /// transaction. Content already present in the project is rejected.
    pub fn create_indexed_knowledge(
        &self,
        project_id: &str,
        source: &NewKnowledgeSource,
        embedding: &[f32],
    ) -> Result<String> {
        let metadata_json = source.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let embedding_json = serde_json::to_string(embedding)?;
        let hash = content_hash(&source.content);
        let id = uuid::Uuid::new_v4().to_string();
        let link_json = serde_json::to_string(&EmbeddingMetadata {
            knowledge_source_id: Some(id.clone()),
        })?;
        let now = chrono::Utc::now().timestamp_millis();

        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        ensure_new_content(&tx, project_id, &hash)?;

        insert_knowledge_row(&tx, &id, project_id, source, &hash, metadata_json, Some(&embedding_json), now)?;
        tx.execute(
            "INSERT INTO project_embedding (id, project_id, embedding_json, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uuid::Uuid::new_v4().to_string(), project_id, embedding_json, link_json, now],
        )?;
        tx.commit()?;

        Ok(id)
    }

    /// Attach an embedding and mark the source indexed
    pub fn set_knowledge_indexed(&self, knowledge_id: &str, embedding: &[f32]) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = chrono::Utc::now().timestamp_millis();

        let updated = conn.execute(
            "UPDATE knowledge_source SET status = 'indexed', embedding_json = ?1, updated_at = ?2
             WHERE id = ?3",
            params![embedding_json, now, knowledge_id],
        )?;
        if updated == 0 {
            return Err(Error::not_found("Knowledge source", knowledge_id));
        }

        Ok(())
    }

    /// Record a project embedding
    pub fn create_project_embedding(
        &self,
        project_id: &str,
        embedding: &[f32],
        metadata: &EmbeddingMetadata,
    ) -> Result<String> {
        let embedding_json = serde_json::to_string(embedding)?;
        let metadata_json = serde_json::to_string(metadata)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO project_embedding (id, project_id, embedding_json, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, project_id, embedding_json, metadata_json, now],
        )?;

        Ok(id)
    }

    /// All embeddings recorded for a project
    pub fn list_project_embeddings(&self, project_id: &str) -> Result<Vec<ProjectEmbeddingRecord>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, embedding_json, metadata_json, created_at
             FROM project_embedding WHERE project_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let records = stmt
            .query_map(params![project_id], |row| {
                Ok(ProjectEmbeddingRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    embedding: json_column(row, 2)?.unwrap_or_default(),
                    metadata: json_column(row, 3)?.unwrap_or_default(),
                    created_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Conversation Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a conversation, optionally attached to a project
    pub fn create_conversation(&self, project_id: Option<&str>, user_id: &str, title: Option<&str>) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO conversation (id, project_id, user_id, title, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, project_id, user_id, title, now],
        )?;

        Ok(id)
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(conn
            .query_row(
                "SELECT id, project_id, user_id, title, created_at FROM conversation WHERE id = ?1",
                params![conversation_id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        user_id: row.get(2)?,
                        title: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// Append a message to a conversation
    pub fn append_message(&self, conversation_id: &str, role: &str, content: &str) -> Result<String> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO conversation_message (id, conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, conversation_id, role, content, now],
        )?;

        Ok(id)
    }

    /// The most recent `limit` messages, oldest first
    pub fn get_recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT role, content FROM conversation_message
             WHERE conversation_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let mut messages = stmt
            .query_map(params![conversation_id, limit as i64], |row| {
                Ok(ChatMessage {
                    role: row.get(0)?,
                    content: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        messages.reverse();

        Ok(messages)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a context snapshot
    pub fn create_snapshot(&self, snapshot: &NewContextSnapshot) -> Result<String> {
        let brief_json = snapshot.brief.as_ref().map(serde_json::to_string).transpose()?;
        let ids_json = serde_json::to_string(&snapshot.knowledge_source_ids)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO context_snapshot
             (id, conversation_id, project_id, brief_json, knowledge_source_ids_json, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, snapshot.conversation_id, snapshot.project_id, brief_json, ids_json, now],
        )?;

        Ok(id)
    }

    pub fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<ContextSnapshot>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(conn
            .query_row(
                "SELECT id, conversation_id, project_id, brief_json, knowledge_source_ids_json, captured_at
                 FROM context_snapshot WHERE id = ?1",
                params![snapshot_id],
                |row| {
                    Ok(ContextSnapshot {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        project_id: row.get(2)?,
                        brief: json_column(row, 3)?,
                        knowledge_source_ids: json_column(row, 4)?.unwrap_or_default(),
                        captured_at: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait implementations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AccessControl for Database {
    async fn has_permission(&self, project_id: &str, user_id: &str, action: Action) -> Result<bool> {
        self.check_permission(project_id, user_id, action)
    }
}

#[async_trait]
impl KnowledgeStore for Database {
    async fn list_knowledge(&self, query: &KnowledgeQuery) -> Result<Vec<KnowledgeRecord>> {
        self.query_knowledge(query)
    }

    async fn knowledge_by_ids(&self, project_id: &str, ids: &[String]) -> Result<Vec<KnowledgeRecord>> {
        self.get_knowledge_by_ids(project_id, ids)
    }

    async fn project_embeddings(&self, project_id: &str) -> Result<Vec<ProjectEmbeddingRecord>> {
        self.list_project_embeddings(project_id)
    }

    async fn project_brief(&self, project_id: &str) -> Result<Option<ProjectBrief>> {
        self.get_project_brief(project_id)
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.get_conversation(conversation_id)
    }

    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        self.get_recent_messages(conversation_id, limit)
    }

    async fn insert_indexed_knowledge(
        &self,
        project_id: &str,
        source: &NewKnowledgeSource,
        embedding: &[f32],
    ) -> Result<String> {
        self.create_indexed_knowledge(project_id, source, embedding)
    }

    async fn insert_snapshot(&self, snapshot: &NewContextSnapshot) -> Result<String> {
        self.create_snapshot(snapshot)
    }

    async fn context_snapshot(&self, snapshot_id: &str) -> Result<Option<ContextSnapshot>> {
        self.get_snapshot(snapshot_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Private helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Reject content whose hash is already stored for the project
fn ensure_new_content(conn: &Connection, project_id: &str, hash: &str) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM knowledge_source WHERE project_id = ?1 AND content_hash = ?2",
            params![project_id, hash],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => Err(Error::already_exists("Knowledge source", id)),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn insert_knowledge_row(
    conn: &Connection,
    id: &str,
    project_id: &str,
    source: &NewKnowledgeSource,
    hash: &str,
    metadata_json: Option<String>,
    embedding_json: Option<&str>,
    now: i64,
) -> Result<()> {
    let status = if embedding_json.is_some() {
        KnowledgeStatus::Indexed
    } else {
        KnowledgeStatus::Pending
    };

    conn.execute(
        "INSERT INTO knowledge_source
         (id, project_id, title, content, content_hash, source_type, source_id,
          metadata_json, embedding_json, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            project_id,
            source.title,
            source.content,
            hash,
            source.source_type,
            source.source_id,
            metadata_json,
            embedding_json,
            status.as_str(),
            now,
        ],
    )?;

    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn invalid_text(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

/// Decode a nullable JSON text column
fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let project_id = db
            .create_project(&NewProject {
                owner_id: "owner".into(),
                title: Some("Nova Rebrand".into()),
                client: Some("Acme".into()),
                ..Default::default()
            })
            .unwrap();
        (db, project_id)
    }

    fn add_indexed(db: &Database, project_id: &str, title: &str, source_type: &str) -> String {
        let id = db
            .create_knowledge_source(project_id, &NewKnowledgeSource::new(title, format!("{title} body"), source_type))
            .unwrap();
        db.set_knowledge_indexed(&id, &[1.0, 0.0]).unwrap();
        id
    }

    #[test]
    fn test_owner_and_unknown_project() {
        let (db, project_id) = setup();
        assert!(db.check_permission(&project_id, "owner", Action::Delete).unwrap());
        assert!(!db.check_permission(&project_id, "stranger", Action::Read).unwrap());
        assert!(!db.check_permission("missing", "owner", Action::Read).unwrap());
    }

    #[test]
    fn test_role_grants() {
        let (db, project_id) = setup();
        db.grant_access(&project_id, "viewer", Role::Viewer, None, Some("owner")).unwrap();
        db.grant_access(&project_id, "editor", Role::Editor, None, Some("owner")).unwrap();
        db.grant_access(&project_id, "ops", Role::Viewer, Some(vec![Action::Admin]), None).unwrap();

        assert!(db.check_permission(&project_id, "viewer", Action::Read).unwrap());
        assert!(!db.check_permission(&project_id, "viewer", Action::Write).unwrap());
        assert!(db.check_permission(&project_id, "editor", Action::Write).unwrap());
        assert!(!db.check_permission(&project_id, "editor", Action::Delete).unwrap());
        assert!(db.check_permission(&project_id, "ops", Action::Archive).unwrap());

        // regrant replaces the entry
        db.grant_access(&project_id, "viewer", Role::Editor, None, None).unwrap();
        assert!(db.check_permission(&project_id, "viewer", Action::Write).unwrap());
        assert_eq!(db.list_access(&project_id).unwrap().len(), 3);
    }

    #[test]
    fn test_public_project_is_read_only() {
        let db = Database::open_in_memory().unwrap();
        let project_id = db
            .create_project(&NewProject {
                owner_id: "owner".into(),
                access_level: AccessLevel::Public,
                ..Default::default()
            })
            .unwrap();

        assert!(db.check_permission(&project_id, "anyone", Action::Read).unwrap());
        assert!(!db.check_permission(&project_id, "anyone", Action::Write).unwrap());
    }

    #[test]
    fn test_query_knowledge_filters_and_order() {
        let (db, project_id) = setup();
        let first = add_indexed(&db, &project_id, "Palette", "document");
        let second = add_indexed(&db, &project_id, "Kickoff call", "transcript");
        db.create_knowledge_source(&project_id, &NewKnowledgeSource::new("Draft", "wip", "document"))
            .unwrap();

        let all = db.query_knowledge(&KnowledgeQuery::indexed(&project_id)).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![second.clone(), first.clone()]);
        assert!(all.iter().all(|r| r.status == KnowledgeStatus::Indexed));
        assert_eq!(all[0].embedding.as_deref(), Some(&[1.0, 0.0][..]));

        let docs = db
            .query_knowledge(&KnowledgeQuery::indexed(&project_id).source_types(Some(vec!["document".into()])))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, first);

        let limited = db.query_knowledge(&KnowledgeQuery::indexed(&project_id).limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_knowledge_by_ids_stays_in_project() {
        let (db, project_a) = setup();
        let project_b = db
            .create_project(&NewProject {
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        let in_a = add_indexed(&db, &project_a, "A", "document");
        let in_b = add_indexed(&db, &project_b, "B", "document");

        let found = db.get_knowledge_by_ids(&project_a, &[in_a.clone(), in_b]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, in_a);
        assert!(db.get_knowledge_by_ids(&project_a, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_recent_messages_oldest_first() {
        let (db, project_id) = setup();
        let conv = db.create_conversation(Some(project_id.as_str()), "owner", None).unwrap();
        for i in 0..12 {
            db.append_message(&conv, "user", &format!("m{i}")).unwrap();
        }

        let messages = db.get_recent_messages(&conv, 10).unwrap();
        assert_eq!(messages.len(), 10);
        assert_eq!(messages.first().unwrap().content, "m2");
        assert_eq!(messages.last().unwrap().content, "m11");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (db, project_id) = setup();
        let id = db
            .create_snapshot(&NewContextSnapshot {
                conversation_id: "c1".into(),
                project_id: project_id.clone(),
                brief: Some(SnapshotBrief {
                    title: Some("Nova Rebrand".into()),
                    description: None,
                    status: "active".into(),
                }),
                knowledge_source_ids: vec!["k1".into(), "k2".into()],
            })
            .unwrap();

        let snapshot = db.get_snapshot(&id).unwrap().unwrap();
        assert_eq!(snapshot.project_id, project_id);
        assert_eq!(snapshot.knowledge_source_ids, vec!["k1", "k2"]);
        assert_eq!(snapshot.brief.unwrap().title.as_deref(), Some("Nova Rebrand"));
        assert!(db.get_snapshot("missing").unwrap().is_none());
    }

    #[test]
    fn test_mark_indexed_missing_source() {
        let (db, _) = setup();
        let err = db.set_knowledge_indexed("missing", &[0.5]).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_indexed_knowledge_links_embedding() {
        let (db, project_id) = setup();
        let id = db
            .create_indexed_knowledge(&project_id, &NewKnowledgeSource::new("Tone", "warm, precise", "note"), &[0.5, 0.5])
            .unwrap();

        let records = db.get_knowledge_by_ids(&project_id, &[id.clone()]).unwrap();
        assert_eq!(records[0].status, KnowledgeStatus::Indexed);
        assert_eq!(records[0].embedding.as_deref(), Some(&[0.5, 0.5][..]));

        let embeddings = db.list_project_embeddings(&project_id).unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].metadata.knowledge_source_id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_duplicate_content_rejected_per_project() {
        let (db, project_id) = setup();
        let source = NewKnowledgeSource::new("Palette", "Ultramarine and bone", "document");
        let first = db.create_indexed_knowledge(&project_id, &source, &[1.0]).unwrap();

        let err = db.create_indexed_knowledge(&project_id, &source, &[1.0]).unwrap_err();
        assert!(err.is_already_exists());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains(&first));
        let err = db.create_knowledge_source(&project_id, &source).unwrap_err();
        assert!(err.is_already_exists());

        assert_eq!(db.query_knowledge(&KnowledgeQuery::indexed(&project_id)).unwrap().len(), 1);
        assert_eq!(db.list_project_embeddings(&project_id).unwrap().len(), 1);

        // same content is fine in another project
        let other = db
            .create_project(&NewProject {
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        db.create_indexed_knowledge(&other, &source, &[1.0]).unwrap();
    }

    #[test]
    fn test_indexed_knowledge_rolls_back_on_failure() {
        let (db, project_id) = setup();
        db.conn.lock().unwrap().execute_batch("DROP TABLE project_embedding").unwrap();

        let result = db.create_indexed_knowledge(&project_id, &NewKnowledgeSource::new("Tone", "warm", "note"), &[1.0]);
        assert!(matches!(result, Err(Error::Database(_))));

        let all = KnowledgeQuery {
            status: None,
            ..KnowledgeQuery::indexed(&project_id)
        };
        assert!(db.query_knowledge(&all).unwrap().is_empty());
    }

    #[test]
    fn test_open_path_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/aura.db");
        let db = Database::open_path(&path).unwrap();
        db.ping().unwrap();
        assert!(path.exists());
    }
}
