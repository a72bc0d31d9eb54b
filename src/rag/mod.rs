//! Retrieval pipeline for the knowledge base.
//!
//! Documents enter through [`ingest`]: fixed-window chunking with
//! overlap, then chunk rows in the store. Answers draw on
//! [`retrieval::RetrievalEngine`]: normalized keyword search over those
//! rows, best effort, never a hard failure for the reply pipeline.

pub mod chunker;
pub mod ingest;
pub mod retrieval;

pub use chunker::{chunk, ChunkerError};
pub use ingest::{ingest_file, ingest_text, IngestOutcome};
pub use retrieval::RetrievalEngine;
