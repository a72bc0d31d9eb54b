use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::store::Store;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Characters that are neither word characters nor whitespace are
/// stripped before search, so "refund policy!!" still matches chunk
/// text stored without the punctuation.
static NON_SEARCH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static pattern compiles"));

/// Queries shorter than this after normalization skip storage entirely.
const MIN_QUERY_CHARS: usize = 3;

/// Keyword retrieval over ingested chunks.
///
/// Best effort by contract: a failed lookup degrades to an empty result
/// and the reply pipeline continues without knowledge context.
pub struct RetrievalEngine {
    store: Arc<dyn Store>,
    observer: Arc<dyn Observer>,
    limit: usize,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn Store>, observer: Arc<dyn Observer>, limit: usize) -> Self {
        Self {
            store,
            observer,
            limit,
        }
    }

    /// Reduce a raw message to searchable text.
    pub fn normalize(query: &str) -> String {
        NON_SEARCH_CHARS.replace_all(query, "").trim().to_string()
    }

    /// Find chunks matching the message, in insertion order, capped at
    /// the configured limit.
    pub async fn search(&self, message: &str) -> Vec<String> {
        let normalized = Self::normalize(message);
        if normalized.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        match self.store.search_chunks(&normalized, self.limit).await {
            Ok(chunks) => {
                self.observer
                    .record_metric(&ObserverMetric::RetrievedChunks(chunks.len() as u64));
                chunks
            }
            Err(e) => {
                self.observer.record_event(&ObserverEvent::Warning {
                    component: "retrieval".into(),
                    message: format!("knowledge lookup failed: {e}"),
                });
                Vec::new()
            }
        }
    }
}
