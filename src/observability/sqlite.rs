use super::traits::{Observer, ObserverEvent, ObserverMetric};
use anyhow::Context;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::json;
use std::any::Any;
use std::path::Path;

/// Observer that appends pipeline events to the `bot_logs` table, so
/// they can be read back after the process is gone.
///
/// Writes happen synchronously on its own connection. High-frequency
/// events (heartbeat ticks, per-call timings) and metrics are skipped;
/// only rows an operator would page through are kept.
pub struct SqliteObserver {
    conn: Mutex<Connection>,
}

impl SqliteObserver {
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("SQLite failed to open database: {}", db_path.display()))?;
        // Second writer on the same file as the store; busy_timeout keeps
        // a concurrent store write from surfacing as SQLITE_BUSY here.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bot_logs (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                level      TEXT NOT NULL,
                message    TEXT NOT NULL,
                details    TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_logs_created ON bot_logs(created_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn append(&self, level: &str, message: &str, details: &serde_json::Value) {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO bot_logs (level, message, details, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![level, message, details.to_string(), now],
        );
        if let Err(e) = result {
            tracing::warn!("durable log write failed: {e}");
        }
    }
}

impl Observer for SqliteObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::AgentStart { provider, model } => {
                self.append(
                    "info",
                    "Agent online",
                    &json!({"provider": provider, "model": model}),
                );
            }
            ObserverEvent::ChannelReady { channel } => {
                self.append("info", "Channel ready", &json!({"channel": channel}));
            }
            ObserverEvent::MessageProcessed {
                sender,
                channel_id,
                model,
                retrieval_hit,
            } => {
                self.append(
                    "info",
                    "Processed message",
                    &json!({
                        "user": sender,
                        "channel": channel_id,
                        "model": model,
                        "rag": retrieval_hit,
                    }),
                );
            }
            ObserverEvent::AgentEnd { duration } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                self.append("info", "Shutting down", &json!({"uptime_ms": ms}));
            }
            ObserverEvent::Warning { component, message } => {
                self.append("warn", message, &json!({"component": component}));
            }
            ObserverEvent::Error { component, message } => {
                self.append("error", message, &json!({"component": component}));
            }
            // Tick and per-call events would flood the table
            ObserverEvent::HeartbeatTick | ObserverEvent::LlmCall { .. } => {}
        }
    }

    fn record_metric(&self, _metric: &ObserverMetric) {}

    fn name(&self) -> &str {
        "sqlite"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
