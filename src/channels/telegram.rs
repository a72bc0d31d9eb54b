use super::traits::{Channel, ChannelMessage};
use async_trait::async_trait;
use uuid::Uuid;

/// Telegram channel — long-polls the Bot API for updates
pub struct TelegramChannel {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Map one `getUpdates` entry to a [`ChannelMessage`]. Updates without
    /// text or without a chat id are skipped; who may talk to the agent is
    /// decided later against the durable allow-list, not here.
    fn parse_update(update: &serde_json::Value) -> Option<ChannelMessage> {
        let message = update.get("message")?;
        let text = message.get("text").and_then(serde_json::Value::as_str)?;

        let from = message.get("from");
        let sender = from
            .and_then(|f| f.get("username"))
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                from.and_then(|f| f.get("first_name"))
                    .and_then(serde_json::Value::as_str)
            })
            .unwrap_or("unknown")
            .to_string();
        let author_is_bot = from
            .and_then(|f| f.get("is_bot"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let channel_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(serde_json::Value::as_i64)
            .map(|id| id.to_string())?;

        let timestamp = message
            .get("date")
            .and_then(serde_json::Value::as_i64)
            .and_then(|d| u64::try_from(d).ok())
            .unwrap_or_else(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            });

        Some(ChannelMessage {
            id: Uuid::new_v4().to_string(),
            sender,
            channel_id,
            content: text.to_string(),
            author_is_bot,
            timestamp,
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str, channel_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "text": message,
        });

        self.client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let url = self.api_url("getUpdates");
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });

            let resp = match self.client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(msg) = Self::parse_update(update) else {
                        continue;
                    };

                    if tx.send(msg).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn start_typing(&self, channel_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "action": "typing"
        });

        self.client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    // stop_typing stays the default no-op: Telegram's indicator expires
    // on its own a few seconds after the last sendChatAction.
}
