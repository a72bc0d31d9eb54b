//! Rolling conversation summary.
//!
//! After every delivered reply the agent folds the exchange into a single
//! summary string via the language model, then persists it. The summary is
//! the only piece of agent config the runtime ever writes back.

use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::providers::{ChatMessage, Provider};
use crate::store::{Store, DEFAULT_SYSTEM_INSTRUCTIONS};
use std::sync::Arc;
use std::time::Instant;

/// Folds (prior summary, user message, assistant reply) into an updated
/// summary and persists it. Shared across concurrent message tasks;
/// overlapping updates resolve last-write-wins.
pub struct ConversationMemory {
    store: Arc<dyn Store>,
    provider: Arc<dyn Provider>,
    observer: Arc<dyn Observer>,
    model: String,
    temperature: f64,
    max_chars: usize,
}

impl ConversationMemory {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn Provider>,
        observer: Arc<dyn Observer>,
        model: impl Into<String>,
        temperature: f64,
        max_chars: usize,
    ) -> Self {
        Self {
            store,
            provider,
            observer,
            model: model.into(),
            temperature,
            max_chars,
        }
    }

    /// Compress one exchange into the rolling summary and persist it.
    ///
    /// Every failure mode keeps the prior summary and stays invisible to
    /// the chat user: a failed model call or a failed write is reported
    /// through the observer only.
    pub async fn record_exchange(
        &self,
        config_id: i64,
        prior: Option<&str>,
        user_message: &str,
        assistant_reply: &str,
    ) {
        let Some(updated) = self.compress(prior, user_message, assistant_reply).await else {
            return;
        };

        self.observer
            .record_metric(&ObserverMetric::SummaryChars(updated.chars().count() as u64));

        if let Err(error) = self.store.save_summary(config_id, &updated).await {
            self.observer.record_event(&ObserverEvent::Error {
                component: "memory".into(),
                message: format!("summary persistence failed: {error}"),
            });
        }
    }

    /// Ask the model for an updated summary. `None` means keep the prior
    /// one, either because the call failed or the model returned nothing.
    async fn compress(
        &self,
        prior: Option<&str>,
        user_message: &str,
        assistant_reply: &str,
    ) -> Option<String> {
        let prompt = Self::build_update_prompt(prior, user_message, assistant_reply);
        let messages = [
            ChatMessage::system(DEFAULT_SYSTEM_INSTRUCTIONS),
            ChatMessage::user(prompt),
        ];

        let started = Instant::now();
        let outcome = self
            .provider
            .complete(&messages, &self.model, self.temperature)
            .await;
        self.observer.record_event(&ObserverEvent::LlmCall {
            purpose: "summary".into(),
            duration: started.elapsed(),
            success: outcome.is_ok(),
        });

        match outcome {
            Ok(text) => {
                let capped = Self::cap_summary(&text, self.max_chars);
                if capped.is_empty() {
                    return None;
                }
                Some(capped)
            }
            Err(error) => {
                self.observer.record_event(&ObserverEvent::Error {
                    component: "memory".into(),
                    message: format!("summary update failed: {error}"),
                });
                None
            }
        }
    }

    fn build_update_prompt(
        prior: Option<&str>,
        user_message: &str,
        assistant_reply: &str,
    ) -> String {
        let current = match prior {
            Some(text) if !text.trim().is_empty() => text,
            _ => "None",
        };
        format!(
            "Current summary: \"{current}\"\n\
             User: {user_message}\n\
             Assistant: {assistant_reply}\n\
             Update the summary to include this exchange concisely. \
             Return ONLY the summary text."
        )
    }

    /// Trim and truncate to `max_chars` characters. Zero disables the cap.
    fn cap_summary(text: &str, max_chars: usize) -> String {
        let trimmed = text.trim();
        if max_chars == 0 || trimmed.chars().count() <= max_chars {
            return trimmed.to_string();
        }
        trimmed.chars().take(max_chars).collect()
    }
}
