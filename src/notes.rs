//! Read-only view of the note store.
//!
//! Notes are owned by the note store; the index only reads them. On disk the
//! store keeps one `<id>.json` document per note.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Latex,
    Code,
    Image,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NoteBlock {
    pub fn new(id: &str, kind: BlockType, content: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            content: content.to_string(),
            metadata: Default::default(),
        }
    }

    pub fn text(id: &str, content: &str) -> Self {
        Self::new(id, BlockType::Text, content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<NoteBlock>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Note {
    pub fn new(id: &str, title: &str, blocks: Vec<NoteBlock>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            blocks,
            tags: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("failed to read note {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("note {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a single note document.
pub async fn read_note_file(path: &Path) -> Result<Note, NoteError> {
    let data = tokio::fs::read(path).await.map_err(|source| NoteError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&data).map_err(|source| NoteError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Directory of `<id>.json` note documents.
#[derive(Debug, Clone)]
pub struct NotesDir {
    path: PathBuf,
}

impl NotesDir {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Note files sorted by name, so bulk indexing visits notes in a stable order.
    /// A missing or unreadable directory lists nothing.
    pub async fn list(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("cannot read notes directory {}: {err}", self.path.display());
                return vec![];
            }
        };

        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }

        files.sort();
        files
    }

    pub async fn read(&self, note_id: &str) -> Result<Note, NoteError> {
        read_note_file(&self.path.join(format!("{note_id}.json"))).await
    }

    /// Load every readable note. Broken documents are logged and skipped.
    pub async fn load_all(&self) -> Vec<Note> {
        let mut notes = Vec::new();
        for path in self.list().await {
            match read_note_file(&path).await {
                Ok(note) => notes.push(note),
                Err(err) => log::error!("skipping note: {err}"),
            }
        }
        notes
    }
}
