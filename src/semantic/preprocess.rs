//! Block selection for embedding.
//!
//! Only free text is embedded:
//! 1. Keep blocks of type `text`
//! 2. Skip blocks that are empty after trimming
//! 3. Keep the first block for any repeated block id

use std::collections::HashSet;

use crate::notes::{BlockType, Note, NoteBlock};

/// Blocks of `note` that should carry a vector record, in note order.
pub fn embeddable_blocks(note: &Note) -> Vec<&NoteBlock> {
    let mut seen = HashSet::new();

    note.blocks
        .iter()
        .filter(|block| block.kind == BlockType::Text)
        .filter(|block| !block.content.trim().is_empty())
        .filter(|block| {
            let first = seen.insert(block.id.as_str());
            if !first {
                log::warn!(
                    "note {} has duplicate text block id {}, keeping the first",
                    note.id,
                    block.id
                );
            }
            first
        })
        .collect()
}
