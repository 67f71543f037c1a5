//! Exact cosine similarity ranking over vector records.
//!
//! Linear scan, intended for personal-sized corpora.

use serde::Serialize;

use crate::semantic::storage::VectorRecord;

/// A ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub note_id: String,
    pub block_id: String,
    pub text: String,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

/// Errors that can occur while scoring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimilarityError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two equally sized vectors.
///
/// A zero-magnitude side scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    score_against(a, l2_norm(a), b)
}

fn score_against(query: &[f32], query_norm: f32, target: &[f32]) -> Result<f32, SimilarityError> {
    if query.len() != target.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: query.len(),
            got: target.len(),
        });
    }

    let target_norm = l2_norm(target);
    if query_norm == 0.0 || target_norm == 0.0 {
        return Ok(0.0);
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    Ok(dot_product / (query_norm * target_norm))
}

/// Score every record against `query` and return the best `limit` hits.
///
/// Results are sorted by score descending; equal scores keep record order.
pub fn rank(
    query: &[f32],
    records: &[VectorRecord],
    limit: usize,
) -> Result<Vec<SearchResult>, SimilarityError> {
    let query_norm = l2_norm(query);

    let mut scored = records
        .iter()
        .enumerate()
        .map(|(pos, record)| score_against(query, query_norm, &record.vector).map(|s| (pos, s)))
        .collect::<Result<Vec<(usize, f32)>, _>>()?;

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .map(|(pos, score)| {
            let record = &records[pos];
            SearchResult {
                note_id: record.note_id.clone(),
                block_id: record.block_id.clone(),
                text: record.text.clone(),
                score,
            }
        })
        .collect())
}
