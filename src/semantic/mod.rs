//! Semantic search infrastructure for note embeddings.
//!
//! This module keeps a persisted collection of embedding vectors derived from
//! note text blocks and answers nearest-neighbor queries over it.
//!
//! # Architecture
//!
//! - `embeddings`: Provider capability interface (embed, complete)
//! - `providers`: OpenAI-compatible and Gemini vendor implementations
//! - `index`: Cosine similarity and top-K ranking
//! - `storage`: JSON file persistence for vectors.json
//! - `preprocess`: Selection of embeddable note blocks
//! - `service`: The semantic index that ties it together
//! - `summarize`: Note summaries via the completion capability

pub mod embeddings;
mod index;
mod preprocess;
pub mod providers;
mod service;
mod storage;
mod summarize;

pub use embeddings::{
    build_provider, AiProvider, Capabilities, Completion, ProviderError, Usage,
};
pub use index::{cosine_similarity, rank, SearchResult, SimilarityError};
pub use preprocess::embeddable_blocks;
pub use service::{BlockFailure, IndexError, IndexSummary, SemanticIndex};
pub use summarize::{summarize_note, summary_prompt};
pub use storage::{Snapshot, StoreError, VectorRecord, VectorRecordStore, FORMAT_VERSION, VECTORS_FILE};

/// Default number of search hits
pub const DEFAULT_LIMIT: usize = 5;
