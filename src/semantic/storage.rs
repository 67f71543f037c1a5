//! Persistent store of vector records.
//!
//! File format: `vectors.json`
//!
//! ```json
//! { "version": 1, "model": "openai/text-embedding-ada-002", "dimensions": 1536,
//!   "records": [ { "noteId": "..", "blockId": "..", "vector": [..], "text": ".." } ] }
//! ```
//!
//! A bare array of records (the unversioned layout) is read as version 0 and
//! upgraded on the next write.
//!
//! The whole collection lives in memory as an immutable [`Snapshot`]. Every
//! mutation builds the next snapshot, writes it to disk (temp -> fsync ->
//! rename) and only then swaps it in. Persists are serialized by a single
//! async mutex.
//!
//! The `model` tag is never cleared: a store opened without an embedding
//! model writes back the tag it read. Records without a tag (legacy files)
//! are kept until the first fresh vector proves their length matches, see
//! [`VectorRecordStore::discard_foreign`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Name of the persisted collection inside the store directory
pub const VECTORS_FILE: &str = "vectors.json";

/// One embedded text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub note_id: String,
    pub block_id: String,
    pub vector: Vec<f32>,
    pub text: String,
}

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    version: u32,
    model: Option<&'a str>,
    dimensions: Option<usize>,
    records: &'a [VectorRecord],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Persisted {
    Versioned {
        version: u32,
        #[serde(default)]
        model: Option<String>,
        records: Vec<VectorRecord>,
    },
    Legacy(Vec<VectorRecord>),
}

/// Immutable view of the collection with a derived per-note index.
#[derive(Debug, Default)]
pub struct Snapshot {
    records: Vec<VectorRecord>,
    by_note: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    fn new(records: Vec<VectorRecord>) -> Self {
        let mut by_note: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, record) in records.iter().enumerate() {
            by_note.entry(record.note_id.clone()).or_default().push(pos);
        }
        Self { records, by_note }
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn for_note<'a>(&'a self, note_id: &str) -> impl Iterator<Item = &'a VectorRecord> + 'a {
        self.by_note
            .get(note_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.records[pos])
    }

    pub fn contains_note(&self, note_id: &str) -> bool {
        self.by_note.contains_key(note_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.by_note.len()
    }

    /// Vector length shared by every record, `None` when empty.
    pub fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|r| r.vector.len())
    }

    fn without_note(&self, note_id: &str) -> Vec<VectorRecord> {
        self.records
            .iter()
            .filter(|r| r.note_id != note_id)
            .cloned()
            .collect()
    }
}

/// Check that all records share one vector length.
fn uniform_dimensions(records: &[VectorRecord]) -> Result<Option<usize>, StoreError> {
    let Some(expected) = records.first().map(|r| r.vector.len()) else {
        return Ok(None);
    };

    match records.iter().find(|r| r.vector.len() != expected) {
        Some(bad) => Err(StoreError::DimensionMismatch {
            expected,
            got: bad.vector.len(),
        }),
        None => Ok(Some(expected)),
    }
}

/// The persisted vector record collection.
pub struct VectorRecordStore {
    path: PathBuf,
    /// Embedding space of the active provider
    model: Option<String>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Guards writes and holds the model tag written to disk
    write_lock: tokio::sync::Mutex<Option<String>>,
    /// Tag equals the active model; lets readers skip the write lock
    tagged: AtomicBool,
}

impl VectorRecordStore {
    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// `model` identifies the embedding space of the active provider. A file
    /// written under another model, a newer format, or one that fails to parse
    /// is logged and replaced by an empty collection on the next write.
    pub async fn load(dir: &Path, model: Option<String>) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(VECTORS_FILE);
        let (records, file_model) = Self::read_records(&path, model.as_deref()).await;

        let tag = if records.is_empty() {
            model.clone().or(file_model)
        } else {
            file_model
        };

        let tagged = model.is_some() && tag == model;

        Ok(Self {
            path,
            model,
            snapshot: RwLock::new(Arc::new(Snapshot::new(records))),
            write_lock: tokio::sync::Mutex::new(tag),
            tagged: AtomicBool::new(tagged),
        })
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Current collection. Cheap; never waits on an in-flight write.
    pub fn all(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Replace every record of `note_id` with `records` and persist.
    ///
    /// New records are appended after all surviving records.
    pub async fn replace_for_note(
        &self,
        note_id: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), StoreError> {
        let mut tag = self.write_lock.lock().await;

        let current = self.all();
        let mut next = current.without_note(note_id);
        next.extend(records);

        self.commit(&mut tag, next).await
    }

    /// Remove every record of `note_id`. Returns whether anything was removed.
    pub async fn remove_for_note(&self, note_id: &str) -> Result<bool, StoreError> {
        let mut tag = self.write_lock.lock().await;

        let current = self.all();
        if !current.contains_note(note_id) {
            return Ok(false);
        }

        self.commit(&mut tag, current.without_note(note_id)).await?;
        Ok(true)
    }

    /// Drop untagged records whose vectors are not `dimensions` long.
    ///
    /// Called with the length of a freshly embedded vector. Records read from
    /// an untagged file cannot be checked against the model name, so a length
    /// mismatch marks them as stale. A matching length adopts them under the
    /// active model. Returns whether records were dropped.
    pub async fn discard_foreign(&self, dimensions: usize) -> Result<bool, StoreError> {
        if self.model.is_none() || self.tagged.load(Ordering::Acquire) {
            return Ok(false);
        }

        let mut tag = self.write_lock.lock().await;
        if *tag == self.model {
            return Ok(false);
        }

        let current = self.all();
        match current.dimensions() {
            Some(stored) if stored != dimensions => {
                log::warn!(
                    "dropping {} untagged vectors of length {stored}, provider produces {dimensions}",
                    current.len()
                );
                self.commit(&mut tag, vec![]).await?;
                Ok(true)
            }
            _ => {
                tag.clone_from(&self.model);
                self.tagged.store(true, Ordering::Release);
                Ok(false)
            }
        }
    }

    /// Persist `records` and make them the current snapshot. `tag` is the
    /// write lock guard's model tag.
    async fn commit(
        &self,
        tag: &mut Option<String>,
        records: Vec<VectorRecord>,
    ) -> Result<(), StoreError> {
        let dimensions = uniform_dimensions(&records)?;
        let snapshot = Snapshot::new(records);

        // an empty collection belongs to whatever model is active
        let next_tag = if snapshot.is_empty() && self.model.is_some() {
            self.model.clone()
        } else {
            tag.clone()
        };

        self.persist(&snapshot, next_tag.as_deref(), dimensions).await?;

        self.tagged
            .store(self.model.is_some() && next_tag == self.model, Ordering::Release);
        *tag = next_tag;
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        Ok(())
    }

    /// Uses atomic write: temp file -> fsync -> rename
    async fn persist(
        &self,
        snapshot: &Snapshot,
        model: Option<&str>,
        dimensions: Option<usize>,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_vec(&PersistedRef {
            version: FORMAT_VERSION,
            model,
            dimensions,
            records: snapshot.records(),
        })?;

        let temp_path = self.path.with_extension("json.tmp");

        if let Err(err) = write_synced(&temp_path, &data).await {
            // Clean up temp file on error
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        log::debug!(
            "persisted {} vector records to {}",
            snapshot.len(),
            self.path.display()
        );

        Ok(())
    }

    /// Read the persisted records and the model tag they were written under.
    async fn read_records(path: &Path, model: Option<&str>) -> (Vec<VectorRecord>, Option<String>) {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No existing vector store, starting fresh");
                return (vec![], None);
            }
            Err(err) => {
                log::error!("Failed to read {}: {err}, starting fresh", path.display());
                return (vec![], None);
            }
        };

        let (version, file_model, records) = match serde_json::from_slice::<Persisted>(&data) {
            Ok(Persisted::Versioned {
                version,
                model,
                records,
            }) => (version, model, records),
            Ok(Persisted::Legacy(records)) => (0, None, records),
            Err(err) => {
                log::error!("Failed to parse {}: {err}, starting fresh", path.display());
                return (vec![], None);
            }
        };

        if version > FORMAT_VERSION {
            log::warn!(
                "Vector store version {version} unsupported (max {FORMAT_VERSION}), starting fresh"
            );
            return (vec![], None);
        }

        if let (Some(file_model), Some(model)) = (file_model.as_deref(), model) {
            if file_model != model {
                log::warn!(
                    "Embedding model changed ({file_model} -> {model}), starting fresh index"
                );
                return (vec![], None);
            }
        }

        if let Err(err) = uniform_dimensions(&records) {
            log::error!("Vector store is inconsistent: {err}, starting fresh");
            return (vec![], None);
        }

        if file_model.is_none() && !records.is_empty() {
            log::warn!("Vector store has no model tag, vectors are checked on first use");
        }

        log::info!("Loaded {} vectors from storage", records.len());
        (records, file_model)
    }
}

/// Write, flush and fsync. The file handle is closed on every exit path.
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}
