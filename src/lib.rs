//! # notedex
//!
//! Semantic index for block-structured notes.
//!
//! - [`semantic`]: embedding providers, the vector record store and the
//!   [`SemanticIndex`] that keeps it consistent with note content.
//! - [`notes`]: the note data model as read from the note store.
//! - [`config`]: YAML configuration.

pub mod config;
pub mod notes;
pub mod semantic;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use notes::{BlockType, Note, NoteBlock};
pub use semantic::{IndexError, IndexSummary, SearchResult, SemanticIndex, VectorRecord};
