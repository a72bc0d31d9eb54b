use async_trait::async_trait;

/// An inbound message received from a channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: String,
    /// Display name of the author, for logs and telemetry.
    pub sender: String,
    /// Conversation identifier the admission allow-list is keyed on.
    /// Replies go back to this id.
    pub channel_id: String,
    pub content: String,
    /// Set when the platform marks the author as a bot. Bot-authored
    /// messages never enter the reply pipeline.
    pub author_is_bot: bool,
    pub timestamp: u64,
}

/// Core channel trait — implement for any messaging platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Send a message through this channel
    async fn send(&self, message: &str, channel_id: &str) -> anyhow::Result<()>;

    /// Start listening for incoming messages (long-running)
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()>;

    /// Check if channel is healthy
    async fn health_check(&self) -> bool {
        true
    }

    /// Signal that the bot is composing a reply (e.g. "typing" indicator).
    /// Implementations should repeat the indicator as needed for their platform.
    async fn start_typing(&self, _channel_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop any active typing indicator.
    async fn stop_typing(&self, _channel_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
