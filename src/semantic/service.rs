//! Semantic index over note text blocks.
//!
//! Keeps the vector record store consistent with note content:
//! - (re)indexing a note replaces all of its records in one step
//! - deleting a note removes all of its records
//! - search embeds the query and ranks a snapshot of the store
//!
//! The index is built once from explicit configuration and is `Send + Sync`;
//! share it behind an `Arc`. To switch providers, call
//! [`SemanticIndex::reconfigure`], which returns a new instance.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::notes::Note;
use crate::semantic::embeddings::{build_provider, AiProvider, ProviderError};
use crate::semantic::index::{rank, SearchResult, SimilarityError};
use crate::semantic::preprocess::embeddable_blocks;
use crate::semantic::storage::{Snapshot, StoreError, VectorRecord, VectorRecordStore};

/// Errors that can occur during semantic index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Embedding capability is not available")]
    CapabilityUnavailable,

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl From<ProviderError> for IndexError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported { .. } => IndexError::CapabilityUnavailable,
            err => IndexError::Provider(err),
        }
    }
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DimensionMismatch { expected, got } => {
                IndexError::DimensionMismatch { expected, got }
            }
            err => IndexError::Store(err),
        }
    }
}

impl From<SimilarityError> for IndexError {
    fn from(err: SimilarityError) -> Self {
        match err {
            SimilarityError::DimensionMismatch { expected, got } => {
                IndexError::DimensionMismatch { expected, got }
            }
        }
    }
}

/// A text block that could not be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFailure {
    pub note_id: String,
    pub block_id: String,
    pub error: String,
}

/// Outcome of indexing one or more notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub indexed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BlockFailure>,
}

impl IndexSummary {
    fn merge(&mut self, other: IndexSummary) {
        self.indexed += other.indexed;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

pub struct SemanticIndex {
    /// Present only when the provider can embed
    embedder: Option<Arc<dyn AiProvider>>,
    store: VectorRecordStore,
    default_limit: usize,
}

impl SemanticIndex {
    /// Open the index stored in `dir`.
    ///
    /// A provider without embedding support is accepted; operations that need
    /// embeddings then fail with [`IndexError::CapabilityUnavailable`].
    pub async fn open(
        dir: &Path,
        provider: Option<Arc<dyn AiProvider>>,
        default_limit: usize,
    ) -> Result<Self, IndexError> {
        let embedder = provider.filter(|p| p.capabilities().embed);
        let model = embedder.as_ref().and_then(|p| p.embedding_model());

        let store = VectorRecordStore::load(dir, model).await?;

        Ok(Self {
            embedder,
            store,
            default_limit,
        })
    }

    /// Build provider and index from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, IndexError> {
        let provider = if config.vector_db.enabled {
            build_provider(&config.ai_service)?
        } else {
            log::info!("vector db disabled, semantic search unavailable");
            None
        };

        Self::open(&config.vector_db_dir(), provider, config.vector_db.default_limit).await
    }

    /// Rebuild the index for a new configuration.
    pub async fn reconfigure(self, config: &Config) -> Result<Self, IndexError> {
        drop(self);
        Self::from_config(config).await
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn provider(&self) -> Option<&Arc<dyn AiProvider>> {
        self.embedder.as_ref()
    }

    pub fn store(&self) -> &VectorRecordStore {
        &self.store
    }

    /// Current records (read-only snapshot).
    pub fn records(&self) -> Arc<Snapshot> {
        self.store.all()
    }

    fn embedder(&self) -> Result<&Arc<dyn AiProvider>, IndexError> {
        self.embedder
            .as_ref()
            .ok_or(IndexError::CapabilityUnavailable)
    }

    /// Re-derive the records of `note` and replace its old ones.
    ///
    /// A block whose embedding fails is skipped and reported in the summary;
    /// only store failures are returned as errors.
    pub async fn index_note(&self, note: &Note) -> Result<IndexSummary, IndexError> {
        let embedder = self.embedder()?;

        let mut summary = IndexSummary::default();
        let mut records = Vec::new();

        for block in embeddable_blocks(note) {
            match embedder.embed(&block.content).await {
                Ok(vector) => {
                    records.push(VectorRecord {
                        note_id: note.id.clone(),
                        block_id: block.id.clone(),
                        vector,
                        text: block.content.clone(),
                    });
                }
                Err(err) => {
                    log::warn!(
                        "failed to embed block {} of note {}: {err}",
                        block.id,
                        note.id
                    );
                    summary.failures.push(BlockFailure {
                        note_id: note.id.clone(),
                        block_id: block.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        summary.indexed = records.len();
        summary.failed = summary.failures.len();

        if let Some(first) = records.first() {
            self.store.discard_foreign(first.vector.len()).await?;
        }
        self.store.replace_for_note(&note.id, records).await?;

        log::info!(
            "indexed note {}: {} blocks, {} failed",
            note.id,
            summary.indexed,
            summary.failed
        );

        Ok(summary)
    }

    /// Index many notes in order, stopping at the first store failure.
    pub async fn index_notes<'a, I>(&self, notes: I) -> Result<IndexSummary, IndexError>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        self.embedder()?;

        let mut total = IndexSummary::default();
        for note in notes {
            total.merge(self.index_note(note).await?);
        }
        Ok(total)
    }

    /// Drop every record of a note. Deleting an unknown note succeeds.
    pub async fn delete_note(&self, note_id: &str) -> Result<(), IndexError> {
        if self.store.remove_for_note(note_id).await? {
            log::info!("removed vectors of note {note_id}");
        }
        Ok(())
    }

    /// Rank stored blocks by similarity to `query`.
    ///
    /// `limit` defaults to the configured default. An empty store yields an
    /// empty result without calling the provider.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let embedder = self.embedder()?;

        if self.store.is_empty() {
            return Ok(vec![]);
        }

        let limit = limit.unwrap_or(self.default_limit);
        let query_embedding = embedder.embed(query).await?;

        if self.store.discard_foreign(query_embedding.len()).await? {
            return Ok(vec![]);
        }
        let snapshot = self.store.all();

        let results = rank(&query_embedding, snapshot.records(), limit)?;
        log::debug!("search {query:?}: {} hits over {} records", results.len(), snapshot.len());

        Ok(results)
    }
}
