use super::traits::{
    AgentConfig, Document, LogRecord, StatusSnapshot, Store, DEFAULT_SYSTEM_INSTRUCTIONS,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

/// SQLite-backed store holding everything the agent persists:
///
/// - **agent_config**: single identity row (admitted channels,
///   instructions, rolling summary)
/// - **documents / document_chunks**: ingested knowledge, chunk rows
///   searched by substring at answer time
/// - **bot_status**: single liveness row the heartbeat rewrites
/// - **bot_logs**: append-only log rows that outlive the process
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("SQLite failed to open database: {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    /// In-memory store. Vanishes with the connection; tests only.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("SQLite failed to open in-memory")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        // WAL + normal sync: fast writes that survive a crash.
        // mmap / cache keep hot chunk reads off the disk.
        // foreign_keys ON so deleting a document drops its chunks.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA mmap_size    = 8388608;
             PRAGMA cache_size   = -2000;
             PRAGMA temp_store   = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize all tables: `agent_config`, documents + chunks, `bot_status`, `bot_logs`
    fn init_schema(conn: &Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "-- Single agent identity row (id = 1)
            CREATE TABLE IF NOT EXISTS agent_config (
                id                   INTEGER PRIMARY KEY,
                allowed_channel_ids  TEXT NOT NULL DEFAULT '[]',
                system_instructions  TEXT NOT NULL,
                conversation_summary TEXT,
                updated_at           TEXT NOT NULL
            );

            -- Ingested knowledge
            CREATE TABLE IF NOT EXISTS documents (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS document_chunks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON document_chunks(document_id);

            -- Single liveness row (id = 1), rewritten by the heartbeat
            CREATE TABLE IF NOT EXISTS bot_status (
                id         INTEGER PRIMARY KEY CHECK (id = 1),
                status     TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );

            -- Append-only durable log
            CREATE TABLE IF NOT EXISTS bot_logs (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                level      TEXT NOT NULL,
                message    TEXT NOT NULL,
                details    TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_logs_created ON bot_logs(created_at);",
        )?;

        Ok(())
    }

    /// Insert the agent row with defaults if it does not exist yet.
    /// Operator edits (allow/deny/instructions) seed through here.
    fn ensure_config_row(conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO agent_config
                 (id, allowed_channel_ids, system_instructions, conversation_summary, updated_at)
             VALUES (1, '[]', ?1, NULL, ?2)",
            params![DEFAULT_SYSTEM_INSTRUCTIONS, now],
        )?;
        Ok(())
    }

    fn read_allowed(conn: &Connection) -> rusqlite::Result<Vec<String>> {
        let raw: String = conn.query_row(
            "SELECT allowed_channel_ids FROM agent_config WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn write_allowed(conn: &Connection, allowed: &[String], now: &str) -> anyhow::Result<()> {
        let raw = serde_json::to_string(allowed)?;
        conn.execute(
            "UPDATE agent_config SET allowed_channel_ids = ?1, updated_at = ?2 WHERE id = 1",
            params![raw, now],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load_agent_config(&self) -> anyhow::Result<Option<AgentConfig>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<AgentConfig>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, allowed_channel_ids, system_instructions, conversation_summary
                 FROM agent_config WHERE id = 1",
            )?;
            let row = stmt
                .query_row([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            Ok(row.map(|(id, allowed_raw, instructions, summary)| AgentConfig {
                id,
                allowed_channel_ids: serde_json::from_str(&allowed_raw).unwrap_or_default(),
                system_instructions: instructions,
                conversation_summary: summary,
            }))
        })
        .await?
    }

    async fn save_summary(&self, config_id: i64, summary: &str) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let summary = summary.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE agent_config SET conversation_summary = ?1, updated_at = ?2 WHERE id = ?3",
                params![summary, now, config_id],
            )?;
            Ok(())
        })
        .await?
    }

    async fn allow_channel(&self, channel_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let channel_id = channel_id.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            Self::ensure_config_row(&conn, &now)?;
            let mut allowed = Self::read_allowed(&conn)?;
            if !allowed.contains(&channel_id) {
                allowed.push(channel_id);
                Self::write_allowed(&conn, &allowed, &now)?;
            }
            Ok(())
        })
        .await?
    }

    async fn deny_channel(&self, channel_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let channel_id = channel_id.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            Self::ensure_config_row(&conn, &now)?;
            let mut allowed = Self::read_allowed(&conn)?;
            allowed.retain(|id| id != &channel_id);
            Self::write_allowed(&conn, &allowed, &now)?;
            Ok(())
        })
        .await?
    }

    async fn set_instructions(&self, instructions: &str) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let instructions = instructions.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            Self::ensure_config_row(&conn, &now)?;
            conn.execute(
                "UPDATE agent_config SET system_instructions = ?1, updated_at = ?2 WHERE id = 1",
                params![instructions, now],
            )?;
            Ok(())
        })
        .await?
    }

    async fn reset_summary(&self) -> anyhow::Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            Self::ensure_config_row(&conn, &now)?;
            conn.execute(
                "UPDATE agent_config SET conversation_summary = NULL, updated_at = ?1 WHERE id = 1",
                params![now],
            )?;
            Ok(())
        })
        .await?
    }

    async fn insert_document(&self, title: &str) -> anyhow::Result<Document> {
        let conn = self.conn.clone();
        let title = title.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Document> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO documents (title, created_at) VALUES (?1, ?2)",
                params![title, now],
            )?;
            Ok(Document {
                id: conn.last_insert_rowid(),
                title,
                created_at: now,
            })
        })
        .await?
    }

    async fn insert_chunks(&self, document_id: i64, chunks: &[String]) -> anyhow::Result<usize> {
        let conn = self.conn.clone();
        let chunks = chunks.to_vec();

        tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO document_chunks (document_id, chunk_index, content)
                     VALUES (?1, ?2, ?3)",
                )?;
                for (index, chunk) in chunks.iter().enumerate() {
                    let index = i64::try_from(index).unwrap_or(i64::MAX);
                    stmt.execute(params![document_id, index, chunk])?;
                }
            }
            tx.commit()?;
            Ok(chunks.len())
        })
        .await?
    }

    async fn delete_document(&self, document_id: i64) -> anyhow::Result<bool> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let conn = conn.lock();
            let affected =
                conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
            Ok(affected > 0)
        })
        .await?
    }

    async fn list_documents(&self) -> anyhow::Result<Vec<Document>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Document>> {
            let conn = conn.lock();
            let mut stmt =
                conn.prepare("SELECT id, title, created_at FROM documents ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Document {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            Ok(rows.filter_map(std::result::Result::ok).collect())
        })
        .await?
    }

    async fn search_chunks(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>> {
        let conn = self.conn.clone();
        let query = query.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<String>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT content FROM document_chunks
                 WHERE lower(content) LIKE '%' || lower(?1) || '%'
                 ORDER BY id
                 LIMIT ?2",
            )?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt.query_map(params![query, limit], |row| row.get::<_, String>(0))?;
            Ok(rows.filter_map(std::result::Result::ok).collect())
        })
        .await?
    }

    async fn count_chunks(&self) -> anyhow::Result<usize> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let conn = conn.lock();
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM document_chunks", [], |row| row.get(0))?;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Ok(count as usize)
        })
        .await?
    }

    async fn write_status(
        &self,
        status: &str,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let status = status.to_string();
        let metadata = serde_json::to_string(metadata)?;

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO bot_status (id, status, metadata, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at",
                params![status, metadata, now],
            )?;
            Ok(())
        })
        .await?
    }

    async fn latest_status(&self) -> anyhow::Result<Option<StatusSnapshot>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<StatusSnapshot>> {
            let conn = conn.lock();
            let row = conn
                .query_row(
                    "SELECT status, metadata, updated_at FROM bot_status WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            Ok(row.map(|(status, metadata, updated_at)| StatusSnapshot {
                status,
                metadata: serde_json::from_str(&metadata)
                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
                updated_at,
            }))
        })
        .await?
    }

    async fn append_log(
        &self,
        level: &str,
        message: &str,
        details: Option<&serde_json::Value>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        let level = level.to_string();
        let message = message.to_string();
        let details = details.map(serde_json::Value::to_string);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = conn.lock();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO bot_logs (level, message, details, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![level, message, details, now],
            )?;
            Ok(())
        })
        .await?
    }

    async fn recent_logs(&self, limit: usize) -> anyhow::Result<Vec<LogRecord>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<LogRecord>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, level, message, details, created_at FROM bot_logs
                 ORDER BY id DESC LIMIT ?1",
            )?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt.query_map(params![limit], |row| {
                Ok(LogRecord {
                    id: row.get(0)?,
                    level: row.get(1)?,
                    message: row.get(2)?,
                    details: row
                        .get::<_, Option<String>>(3)?
                        .and_then(|raw| serde_json::from_str(&raw).ok()),
                    created_at: row.get(4)?,
                })
            })?;
            Ok(rows.filter_map(std::result::Result::ok).collect())
        })
        .await?
    }

    async fn health_check(&self) -> bool {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || conn.lock().execute_batch("SELECT 1").is_ok())
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn sqlite_name() {
        assert_eq!(store().name(), "sqlite");
    }

    #[tokio::test]
    async fn sqlite_health() {
        assert!(store().health_check().await);
    }

    #[tokio::test]
    async fn config_row_absent_until_seeded() {
        let store = store();
        assert!(store.load_agent_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn allow_channel_seeds_default_row() {
        let store = store();
        store.allow_channel("123").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.id, 1);
        assert_eq!(config.allowed_channel_ids, vec!["123"]);
        assert_eq!(config.system_instructions, DEFAULT_SYSTEM_INSTRUCTIONS);
        assert!(config.conversation_summary.is_none());
    }

    #[tokio::test]
    async fn allow_channel_is_idempotent() {
        let store = store();
        store.allow_channel("123").await.unwrap();
        store.allow_channel("123").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.allowed_channel_ids, vec!["123"]);
    }

    #[tokio::test]
    async fn deny_channel_removes_only_that_id() {
        let store = store();
        store.allow_channel("123").await.unwrap();
        store.allow_channel("456").await.unwrap();
        store.deny_channel("123").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.allowed_channel_ids, vec!["456"]);
    }

    #[tokio::test]
    async fn deny_channel_seeds_row_when_missing() {
        let store = store();
        store.deny_channel("999").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert!(config.allowed_channel_ids.is_empty());
    }

    #[tokio::test]
    async fn set_instructions_replaces_text() {
        let store = store();
        store.set_instructions("Answer in haiku.").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.system_instructions, "Answer in haiku.");
    }

    #[tokio::test]
    async fn save_summary_overwrites_previous() {
        let store = store();
        store.allow_channel("123").await.unwrap();
        store.save_summary(1, "first").await.unwrap();
        store.save_summary(1, "second").await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.conversation_summary.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn reset_summary_clears_it() {
        let store = store();
        store.allow_channel("123").await.unwrap();
        store.save_summary(1, "remember this").await.unwrap();
        store.reset_summary().await.unwrap();

        let config = store.load_agent_config().await.unwrap().unwrap();
        assert!(config.conversation_summary.is_none());
    }

    #[tokio::test]
    async fn ingest_documents_and_chunks() {
        let store = store();
        let doc = store.insert_document("refund policy").await.unwrap();
        let inserted = store
            .insert_chunks(
                doc.id,
                &["part one".into(), "part two".into(), "part three".into()],
            )
            .await
            .unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(store.count_chunks().await.unwrap(), 3);
        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "refund policy");
    }

    #[tokio::test]
    async fn delete_document_cascades_to_chunks() {
        let store = store();
        let doc = store.insert_document("doomed").await.unwrap();
        store
            .insert_chunks(doc.id, &["a".into(), "b".into()])
            .await
            .unwrap();

        assert!(store.delete_document(doc.id).await.unwrap());
        assert_eq!(store.count_chunks().await.unwrap(), 0);
        assert!(!store.delete_document(doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn search_chunks_is_case_insensitive_substring() {
        let store = store();
        let doc = store.insert_document("policies").await.unwrap();
        store
            .insert_chunks(
                doc.id,
                &[
                    "Our Refund Policy allows returns within 30 days.".into(),
                    "Shipping takes 5 business days.".into(),
                ],
            )
            .await
            .unwrap();

        let hits = store.search_chunks("refund policy", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("Refund Policy"));
    }

    #[tokio::test]
    async fn search_chunks_keeps_insertion_order_and_limit() {
        let store = store();
        let doc = store.insert_document("numbers").await.unwrap();
        let chunks: Vec<String> = (1..=5).map(|i| format!("shared term {i}")).collect();
        store.insert_chunks(doc.id, &chunks).await.unwrap();

        let hits = store.search_chunks("shared term", 3).await.unwrap();
        assert_eq!(
            hits,
            vec!["shared term 1", "shared term 2", "shared term 3"]
        );
    }

    #[tokio::test]
    async fn status_upsert_keeps_single_row() {
        let store = store();
        store
            .write_status("online", &serde_json::json!({"pid": 1}))
            .await
            .unwrap();
        store
            .write_status("offline", &serde_json::json!({"pid": 1}))
            .await
            .unwrap();

        let snapshot = store.latest_status().await.unwrap().unwrap();
        assert_eq!(snapshot.status, "offline");
        assert_eq!(snapshot.metadata["pid"], 1);
    }

    #[tokio::test]
    async fn latest_status_none_before_first_write() {
        let store = store();
        assert!(store.latest_status().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logs_append_and_read_newest_first() {
        let store = store();
        store.append_log("info", "first", None).await.unwrap();
        store.append_log("warn", "second", None).await.unwrap();
        store
            .append_log(
                "info",
                "third",
                Some(&serde_json::json!({"user": "alice"})),
            )
            .await
            .unwrap();

        let logs = store.recent_logs(2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "third");
        assert_eq!(logs[1].message, "second");
        assert_eq!(logs[0].details.as_ref().unwrap()["user"], "alice");
    }
}
