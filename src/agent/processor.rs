//! Per-message reply pipeline.
//!
//! Each inbound message runs admission, retrieval, prompt assembly, one
//! model call, delivery, then the summary update. The processor is shared
//! behind `Arc` and every message gets its own task, so everything here
//! must tolerate concurrent calls.

use crate::channels::{Channel, ChannelMessage};
use crate::memory::ConversationMemory;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::providers::{Provider, ProviderError};
use crate::rag::RetrievalEngine;
use crate::store::{AgentConfig, Store};
use std::sync::Arc;
use std::time::Instant;

use super::prompt::{self, PromptContext};

/// Platform ceiling for one outbound message, in characters. Longer
/// replies are sent as sequential segments.
pub const REPLY_SEGMENT_CHARS: usize = 2000;

const EMPTY_REPLY_FALLBACK: &str = "No response generated.";
const APOLOGY_REPLY: &str = "Sorry, I encountered an error. Please check the agent logs.";
const SETUP_REQUIRED_REPLY: &str = "⚠️ Setup required: no language model API key is configured. \
     Set RAGLINE_API_KEY or add api_key to config.toml.";

pub struct MessageProcessor {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn Provider>,
    pub channel: Arc<dyn Channel>,
    pub retrieval: RetrievalEngine,
    pub memory: ConversationMemory,
    pub observer: Arc<dyn Observer>,
    pub model: String,
    pub temperature: f64,
}

impl MessageProcessor {
    /// Run the full pipeline for one inbound message. Never returns an
    /// error: every failure either reaches the user as a notice or stays
    /// in the observer.
    pub async fn handle(&self, message: ChannelMessage) {
        let Some(config) = self.admit(&message).await else {
            return;
        };

        // Best effort. A missing typing indicator is not worth a retry.
        let _ = self.channel.start_typing(&message.channel_id).await;

        let knowledge = self.retrieval.search(&message.content).await;
        let retrieval_hit = !knowledge.is_empty();

        let messages = prompt::build_messages(&PromptContext {
            system_instructions: &config.system_instructions,
            knowledge: &knowledge,
            summary: config.conversation_summary.as_deref(),
            user_message: &message.content,
        });

        let started = Instant::now();
        let outcome = self
            .provider
            .complete(&messages, &self.model, self.temperature)
            .await;
        let elapsed = started.elapsed();
        self.observer.record_event(&ObserverEvent::LlmCall {
            purpose: "reply".into(),
            duration: elapsed,
            success: outcome.is_ok(),
        });
        self.observer
            .record_metric(&ObserverMetric::RequestLatency(elapsed));

        let reply = match outcome {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY_FALLBACK.to_string(),
            Ok(text) => text,
            Err(error) => {
                self.observer.record_event(&ObserverEvent::Error {
                    component: "provider".into(),
                    message: format!("reply generation failed: {error}"),
                });
                self.deliver(&message.channel_id, Self::failure_notice(&error))
                    .await;
                let _ = self.channel.stop_typing(&message.channel_id).await;
                return;
            }
        };

        self.deliver(&message.channel_id, &reply).await;
        let _ = self.channel.stop_typing(&message.channel_id).await;

        self.memory
            .record_exchange(
                config.id,
                config.conversation_summary.as_deref(),
                &message.content,
                &reply,
            )
            .await;

        self.observer.record_event(&ObserverEvent::MessageProcessed {
            sender: message.sender.clone(),
            channel_id: message.channel_id.clone(),
            model: self.model.clone(),
            retrieval_hit,
        });
    }

    /// Admission control. Returns the config snapshot when the message
    /// should be answered. Skips are silent: no typing, no replies, no
    /// log writes.
    async fn admit(&self, message: &ChannelMessage) -> Option<AgentConfig> {
        if message.author_is_bot {
            return None;
        }

        let config = match self.store.load_agent_config().await {
            Ok(config) => config?,
            Err(error) => {
                self.observer.record_event(&ObserverEvent::Error {
                    component: "store".into(),
                    message: format!("agent config load failed: {error}"),
                });
                return None;
            }
        };

        if !config
            .allowed_channel_ids
            .iter()
            .any(|id| id == &message.channel_id)
        {
            return None;
        }

        Some(config)
    }

    /// Send `text` as in-order segments. Delivery stops at the first
    /// failed segment.
    async fn deliver(&self, channel_id: &str, text: &str) {
        for segment in split_into_segments(text, REPLY_SEGMENT_CHARS) {
            if let Err(error) = self.channel.send(&segment, channel_id).await {
                self.observer.record_event(&ObserverEvent::Error {
                    component: "channel".into(),
                    message: format!("reply delivery failed: {error}"),
                });
                return;
            }
        }
    }

    fn failure_notice(error: &anyhow::Error) -> &'static str {
        if matches!(
            error.downcast_ref::<ProviderError>(),
            Some(ProviderError::MissingApiKey { .. })
        ) {
            SETUP_REQUIRED_REPLY
        } else {
            APOLOGY_REPLY
        }
    }
}

/// Split a reply into sequential segments of at most `max_chars`
/// characters each. Empty input yields no segments.
pub fn split_into_segments(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    text.chars()
        .collect::<Vec<char>>()
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopObserver;
    use crate::providers::ChatMessage;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CollectingChannel {
        sends: Mutex<Vec<(String, String)>>,
        typing_started: AtomicUsize,
        typing_stopped: AtomicUsize,
    }

    #[async_trait]
    impl Channel for CollectingChannel {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn send(&self, message: &str, channel_id: &str) -> anyhow::Result<()> {
            self.sends
                .lock()
                .push((message.to_string(), channel_id.to_string()));
            Ok(())
        }

        async fn listen(
            &self,
            _tx: tokio::sync::mpsc::Sender<ChannelMessage>,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn start_typing(&self, _channel_id: &str) -> anyhow::Result<()> {
            self.typing_started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_typing(&self, _channel_id: &str) -> anyhow::Result<()> {
            self.typing_stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Replays queued outcomes in order; once drained, answers with a
    /// fixed summary string so the post-reply summary call always works.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _model: &str,
            _temperature: f64,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("scripted summary".to_string()))
        }
    }

    struct Harness {
        store: Arc<SqliteStore>,
        channel: Arc<CollectingChannel>,
        provider: Arc<ScriptedProvider>,
        processor: MessageProcessor,
    }

    async fn harness(replies: Vec<anyhow::Result<String>>) -> Harness {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.allow_channel("room-1").await.unwrap();
        harness_with_store(store, replies)
    }

    fn harness_with_store(
        store: Arc<SqliteStore>,
        replies: Vec<anyhow::Result<String>>,
    ) -> Harness {
        let channel = Arc::new(CollectingChannel::default());
        let provider = Arc::new(ScriptedProvider::new(replies));
        let observer: Arc<dyn Observer> = Arc::new(NoopObserver);

        let processor = MessageProcessor {
            store: store.clone(),
            provider: provider.clone(),
            channel: channel.clone(),
            retrieval: RetrievalEngine::new(store.clone(), observer.clone(), 3),
            memory: ConversationMemory::new(
                store.clone(),
                provider.clone(),
                observer.clone(),
                "test-model",
                0.7,
                4000,
            ),
            observer,
            model: "test-model".into(),
            temperature: 0.7,
        };

        Harness {
            store,
            channel,
            provider,
            processor,
        }
    }

    fn inbound(content: &str, channel_id: &str) -> ChannelMessage {
        ChannelMessage {
            id: "m1".into(),
            sender: "alice".into(),
            channel_id: channel_id.into(),
            content: content.into(),
            author_is_bot: false,
            timestamp: 0,
        }
    }

    // ── Segmentation ─────────────────────────────────────────────

    #[test]
    fn split_under_limit_single_segment() {
        let segments = split_into_segments("short reply", REPLY_SEGMENT_CHARS);
        assert_eq!(segments, vec!["short reply".to_string()]);
    }

    #[test]
    fn split_exact_limit_single_segment() {
        let text = "x".repeat(REPLY_SEGMENT_CHARS);
        let segments = split_into_segments(&text, REPLY_SEGMENT_CHARS);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn split_just_over_limit_two_segments() {
        let text = "x".repeat(REPLY_SEGMENT_CHARS + 1);
        let segments = split_into_segments(&text, REPLY_SEGMENT_CHARS);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), REPLY_SEGMENT_CHARS);
        assert_eq!(segments[1], "x");
    }

    #[test]
    fn split_counts_chars_not_bytes() {
        let text = "é".repeat(REPLY_SEGMENT_CHARS + 1);
        let segments = split_into_segments(&text, REPLY_SEGMENT_CHARS);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), REPLY_SEGMENT_CHARS);
        assert_eq!(segments[1], "é");
    }

    #[test]
    fn split_empty_reply_produces_no_segments() {
        assert!(split_into_segments("", REPLY_SEGMENT_CHARS).is_empty());
    }

    // ── Admission ────────────────────────────────────────────────

    #[tokio::test]
    async fn bot_author_skipped_silently() {
        let h = harness(vec![Ok("never sent".into())]).await;
        let mut message = inbound("hello", "room-1");
        message.author_is_bot = true;

        h.processor.handle(message).await;

        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert!(h.channel.sends.lock().is_empty());
        assert_eq!(h.channel.typing_started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unlisted_channel_skipped_silently() {
        let h = harness(vec![Ok("never sent".into())]).await;

        h.processor.handle(inbound("hello", "room-9")).await;

        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert!(h.channel.sends.lock().is_empty());
        assert_eq!(h.channel.typing_started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_config_row_skipped_silently() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let h = harness_with_store(store, vec![Ok("never sent".into())]);

        h.processor.handle(inbound("hello", "room-1")).await;

        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert!(h.channel.sends.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_allow_list_skipped_silently() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.set_instructions("be helpful").await.unwrap();
        let h = harness_with_store(store, vec![Ok("never sent".into())]);

        h.processor.handle(inbound("hello", "room-1")).await;

        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
        assert!(h.channel.sends.lock().is_empty());
    }

    // ── Reply pipeline ───────────────────────────────────────────

    #[tokio::test]
    async fn allowed_channel_gets_reply_and_summary() {
        let h = harness(vec![
            Ok("Here to help.".into()),
            Ok("User greeted the agent.".into()),
        ])
        .await;

        h.processor.handle(inbound("hello there", "room-1")).await;

        let sends = h.channel.sends.lock().clone();
        assert_eq!(sends, vec![("Here to help.".to_string(), "room-1".to_string())]);
        assert_eq!(h.channel.typing_started.load(Ordering::SeqCst), 1);
        assert_eq!(h.channel.typing_stopped.load(Ordering::SeqCst), 1);

        // Reply call plus summary call.
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 2);
        let config = h.store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(
            config.conversation_summary.as_deref(),
            Some("User greeted the agent.")
        );
    }

    #[tokio::test]
    async fn empty_model_reply_uses_fallback_text() {
        let h = harness(vec![Ok(String::new())]).await;

        h.processor.handle(inbound("hello", "room-1")).await;

        let sends = h.channel.sends.lock().clone();
        assert_eq!(sends[0].0, EMPTY_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn provider_error_sends_apology_and_skips_summary() {
        let h = harness(vec![Err(anyhow::anyhow!("model exploded"))]).await;
        h.store.save_summary(1, "prior summary").await.unwrap();

        h.processor.handle(inbound("hello", "room-1")).await;

        let sends = h.channel.sends.lock().clone();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, APOLOGY_REPLY);

        // No summary call happened and the prior summary survived.
        assert_eq!(h.provider.calls.load(Ordering::SeqCst), 1);
        let config = h.store.load_agent_config().await.unwrap().unwrap();
        assert_eq!(config.conversation_summary.as_deref(), Some("prior summary"));
    }

    #[tokio::test]
    async fn missing_key_sends_setup_notice() {
        let h = harness(vec![Err(ProviderError::MissingApiKey {
            provider: "Groq".into(),
        }
        .into())])
        .await;

        h.processor.handle(inbound("hello", "room-1")).await;

        let sends = h.channel.sends.lock().clone();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].0.contains("RAGLINE_API_KEY"));
    }

    #[tokio::test]
    async fn long_reply_split_into_ordered_segments() {
        let reply = "a".repeat(2000) + &"b".repeat(2000) + "c";
        let h = harness(vec![Ok(reply)]).await;

        h.processor.handle(inbound("hello", "room-1")).await;

        let sends = h.channel.sends.lock().clone();
        assert_eq!(sends.len(), 3);
        assert!(sends[0].0.chars().all(|c| c == 'a'));
        assert!(sends[1].0.chars().all(|c| c == 'b'));
        assert_eq!(sends[2].0, "c");
    }

    #[tokio::test]
    async fn retrieved_knowledge_reaches_the_prompt() {
        let h = harness(vec![Ok("refund info sent".into())]).await;
        let doc = h.store.insert_document("policies").await.unwrap();
        h.store
            .insert_chunks(doc.id, &["Refunds take 5 business days.".to_string()])
            .await
            .unwrap();

        h.processor.handle(inbound("refunds", "room-1")).await;

        let seen = h.provider.seen.lock().clone();
        let reply_call = &seen[0];
        assert!(reply_call.iter().any(|m| {
            m.role == "system"
                && m.content.starts_with("RELEVANT KNOWLEDGE:")
                && m.content.contains("Refunds take 5 business days.")
        }));
    }
}
