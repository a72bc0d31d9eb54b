use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Instructions seeded into a fresh agent row before any operator edits.
pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// Durable agent identity: which channels it serves, how it speaks,
/// and what it remembers of the conversation so far.
///
/// The agent refuses all traffic until this row exists. Admission keys
/// off `allowed_channel_ids`; an empty list admits nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: i64,
    pub allowed_channel_ids: Vec<String>,
    pub system_instructions: String,
    pub conversation_summary: Option<String>,
}

/// An ingested knowledge document. Content lives in its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub created_at: String,
}

/// Latest liveness record written by the heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub metadata: serde_json::Value,
    pub updated_at: String,
}

/// One durable log row, queryable after the process is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub created_at: String,
}

/// Persistence seam for agent state: identity row, knowledge chunks,
/// liveness status, durable logs. Implement for any backing database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Fetch the agent row, or `None` when the agent was never configured.
    async fn load_agent_config(&self) -> anyhow::Result<Option<AgentConfig>>;

    /// Replace the rolling conversation summary for one agent row.
    async fn save_summary(&self, config_id: i64, summary: &str) -> anyhow::Result<()>;

    /// Admit a channel. Seeds the agent row on first use.
    async fn allow_channel(&self, channel_id: &str) -> anyhow::Result<()>;

    /// Remove a channel from the admitted set.
    async fn deny_channel(&self, channel_id: &str) -> anyhow::Result<()>;

    /// Replace the system instructions.
    async fn set_instructions(&self, instructions: &str) -> anyhow::Result<()>;

    /// Drop the conversation summary, keeping the rest of the row.
    async fn reset_summary(&self) -> anyhow::Result<()>;

    /// Register a document and return it with its assigned id.
    async fn insert_document(&self, title: &str) -> anyhow::Result<Document>;

    /// Append chunks for a document, preserving their order.
    async fn insert_chunks(&self, document_id: i64, chunks: &[String]) -> anyhow::Result<usize>;

    /// Delete a document and its chunks. `false` when the id was unknown.
    async fn delete_document(&self, document_id: i64) -> anyhow::Result<bool>;

    async fn list_documents(&self) -> anyhow::Result<Vec<Document>>;

    /// Case-insensitive substring search over chunk content, in
    /// insertion order, capped at `limit` rows.
    async fn search_chunks(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>>;

    async fn count_chunks(&self) -> anyhow::Result<usize>;

    /// Upsert the single liveness row.
    async fn write_status(&self, status: &str, metadata: &serde_json::Value)
    -> anyhow::Result<()>;

    async fn latest_status(&self) -> anyhow::Result<Option<StatusSnapshot>>;

    /// Append one durable log row.
    async fn append_log(
        &self,
        level: &str,
        message: &str,
        details: Option<&serde_json::Value>,
    ) -> anyhow::Result<()>;

    /// Most recent log rows, newest first.
    async fn recent_logs(&self, limit: usize) -> anyhow::Result<Vec<LogRecord>>;

    /// Health check
    async fn health_check(&self) -> bool;
}
