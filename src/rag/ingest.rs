//! Document ingestion: read, chunk, persist.
//!
//! Chunker parameters are validated before anything is written, so a
//! bad configuration never leaves a document row without chunks.

use crate::config::RetrievalConfig;
use crate::rag::chunker;
use crate::store::Store;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Outcome of one ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: i64,
    pub title: String,
    pub chunk_count: usize,
}

/// Ingest a text file. The title defaults to the file stem.
pub async fn ingest_file(
    store: &Arc<dyn Store>,
    retrieval: &RetrievalConfig,
    path: &Path,
    title: Option<&str>,
) -> Result<IngestOutcome> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let derived = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    ingest_text(store, retrieval, &content, title.unwrap_or(derived)).await
}

/// Chunk raw text and persist it as one document.
pub async fn ingest_text(
    store: &Arc<dyn Store>,
    retrieval: &RetrievalConfig,
    content: &str,
    title: &str,
) -> Result<IngestOutcome> {
    if content.trim().is_empty() {
        bail!("document is empty");
    }

    let chunks = chunker::chunk(content, retrieval.chunk_size, retrieval.chunk_overlap)?;
    if chunks.is_empty() {
        bail!("document contains no usable text");
    }

    let document = store.insert_document(title).await?;
    let chunk_count = store.insert_chunks(document.id, &chunks).await?;

    Ok(IngestOutcome {
        document_id: document.id,
        title: document.title,
        chunk_count,
    })
}
