//! Note summaries through the completion capability.

use crate::notes::{BlockType, Note};
use crate::semantic::embeddings::{AiProvider, Completion, ProviderError};

/// Prompt asking for a summary of the note's text blocks.
///
/// Returns `None` when the note has no text to summarize.
pub fn summary_prompt(note: &Note) -> Option<String> {
    let text = note
        .blocks
        .iter()
        .filter(|block| block.kind == BlockType::Text && !block.content.trim().is_empty())
        .map(|block| block.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.is_empty() {
        return None;
    }

    Some(format!("Summarize the following note:\n\n{text}"))
}

pub async fn summarize_note(
    provider: &dyn AiProvider,
    note: &Note,
) -> Result<Completion, ProviderError> {
    if !provider.capabilities().complete {
        return Err(ProviderError::Unsupported {
            provider: provider.name(),
            operation: "completions",
        });
    }

    let prompt = summary_prompt(note).ok_or_else(|| {
        ProviderError::InvalidInput(format!("note {} has no text to summarize", note.id))
    })?;

    log::debug!("summarizing note {} with {}", note.id, provider.name());
    provider.complete(&prompt).await
}
