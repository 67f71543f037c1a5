//! Semantic index behaviour against a deterministic provider.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ProviderKind};
use crate::notes::{BlockType, Note, NoteBlock};
use crate::semantic::{AiProvider, IndexError, SemanticIndex, DEFAULT_LIMIT, VECTORS_FILE};
use crate::tests::stub::StubProvider;

fn stub() -> StubProvider {
    StubProvider::new(&[
        ("A", &[1.0, 0.0]),
        ("B", &[0.0, 1.0]),
        ("east", &[1.0, 0.0]),
        ("north", &[0.0, 1.0]),
        ("nowhere", &[0.0, 0.0]),
        ("the cat sat", &[0.9, 0.1, 0.0]),
        ("a dog ran", &[0.1, 0.9, 0.0]),
        ("feline pet", &[0.8, 0.2, 0.1]),
    ])
}

async fn open_with(dir: &Path, provider: StubProvider) -> (SemanticIndex, Arc<StubProvider>) {
    let provider = Arc::new(provider);
    let index = SemanticIndex::open(dir, Some(provider.clone() as Arc<dyn AiProvider>), DEFAULT_LIMIT)
        .await
        .expect("failed to open index");
    (index, provider)
}

fn text_note(id: &str, blocks: &[(&str, &str)]) -> Note {
    Note::new(
        id,
        id,
        blocks
            .iter()
            .map(|(block_id, content)| NoteBlock::text(block_id, content))
            .collect(),
    )
}

#[tokio::test]
async fn test_index_twice_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;
    let note = text_note("n1", &[("b1", "A"), ("b2", "B")]);

    let first = index.index_note(&note).await.unwrap();
    let after_first = index.records().records().to_vec();
    let second = index.index_note(&note).await.unwrap();
    let after_second = index.records().records().to_vec();

    assert_eq!(first.indexed, 2);
    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
    assert_eq!(after_second.len(), 2);
}

#[tokio::test]
async fn test_delete_removes_all_records_of_note() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index
        .index_note(&text_note("n1", &[("b1", "A"), ("b2", "B")]))
        .await
        .unwrap();
    index
        .index_note(&text_note("n2", &[("b1", "east")]))
        .await
        .unwrap();

    index.delete_note("n1").await.unwrap();

    let snapshot = index.records();
    assert!(snapshot.records().iter().all(|r| r.note_id != "n1"));
    assert_eq!(snapshot.len(), 1);

    // idempotent
    index.delete_note("n1").await.unwrap();
    index.delete_note("never-indexed").await.unwrap();
    assert_eq!(index.records().len(), 1);
}

#[tokio::test]
async fn test_changed_block_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index.index_note(&text_note("n1", &[("b1", "A")])).await.unwrap();
    index.index_note(&text_note("n1", &[("b1", "B")])).await.unwrap();

    let snapshot = index.records();
    let records: Vec<_> = snapshot.for_note("n1").collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].block_id, "b1");
    assert_eq!(records[0].text, "B");
    assert_eq!(records[0].vector, vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_removed_text_clears_stale_records() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index.index_note(&text_note("n1", &[("b1", "A")])).await.unwrap();
    let summary = index.index_note(&text_note("n1", &[("b1", "   ")])).await.unwrap();

    assert_eq!(summary.indexed, 0);
    assert!(!index.records().contains_note("n1"));
}

#[tokio::test]
async fn test_non_text_blocks_are_not_embedded() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, provider) = open_with(tmp.path(), stub()).await;

    let note = Note::new(
        "n1",
        "no prose",
        vec![
            NoteBlock::new("c1", BlockType::Code, "A"),
            NoteBlock::new("l1", BlockType::Latex, "A"),
            NoteBlock::new("i1", BlockType::Image, "A"),
        ],
    );

    let summary = index.index_note(&note).await.unwrap();
    assert_eq!(summary.indexed, 0);
    assert_eq!(summary.failed, 0);
    assert!(index.records().is_empty());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_blocks() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub().failing_on("B")).await;

    let summary = index
        .index_note(&text_note("n1", &[("b1", "A"), ("b2", "B"), ("b3", "east")]))
        .await
        .unwrap();

    assert_eq!(summary.indexed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].block_id, "b2");
    assert_eq!(summary.failures[0].note_id, "n1");

    let snapshot = index.records();
    let blocks: Vec<&str> = snapshot.for_note("n1").map(|r| r.block_id.as_str()).collect();
    assert_eq!(blocks, vec!["b1", "b3"]);
}

#[tokio::test]
async fn test_similarity_ranking() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index.index_note(&text_note("n1", &[("b1", "north")])).await.unwrap();
    index.index_note(&text_note("n2", &[("b1", "east")])).await.unwrap();

    let results = index.search("A", None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].note_id, "n2");
    assert_eq!(results[0].text, "east");
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[1].note_id, "n1");
    assert_eq!(results[1].score, 0.0);
}

#[tokio::test]
async fn test_zero_vector_record_scores_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index
        .index_note(&text_note("n1", &[("b1", "nowhere"), ("b2", "east")]))
        .await
        .unwrap();

    let results = index.search("A", None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].block_id, "b1");
    assert_eq!(results[1].score, 0.0);

    // zero-magnitude query
    let results = index.search("nowhere", None).await.unwrap();
    assert!(results.iter().all(|r| r.score == 0.0));
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    // several equal scores
    index.index_note(&text_note("n1", &[("b1", "east")])).await.unwrap();
    index.index_note(&text_note("n2", &[("b1", "A")])).await.unwrap();
    index.index_note(&text_note("n3", &[("b1", "north")])).await.unwrap();
    index.index_note(&text_note("n4", &[("b1", "B")])).await.unwrap();

    let first = index.search("A", Some(10)).await.unwrap();
    let second = index.search("A", Some(10)).await.unwrap();
    assert_eq!(first, second);

    let order: Vec<&str> = first.iter().map(|r| r.note_id.as_str()).collect();
    assert_eq!(order, vec!["n1", "n2", "n3", "n4"]);
}

#[tokio::test]
async fn test_search_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    for i in 0..8 {
        index
            .index_note(&text_note(&format!("n{i}"), &[("b1", "east")]))
            .await
            .unwrap();
    }

    assert_eq!(index.search("A", None).await.unwrap().len(), DEFAULT_LIMIT);
    assert_eq!(index.search("A", Some(2)).await.unwrap().len(), 2);
    assert_eq!(index.search("A", Some(50)).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_cold_index_returns_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, provider) = open_with(tmp.path(), stub()).await;

    let results = index.search("anything at all", None).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_scenario_cat_ranks_above_dog() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    let notes = vec![
        text_note("A", &[("b1", "the cat sat")]),
        text_note("B", &[("b1", "a dog ran")]),
    ];
    let summary = index.index_notes(&notes).await.unwrap();
    assert_eq!(summary.indexed, 2);

    let results = index.search("feline pet", None).await.unwrap();
    assert_eq!(results[0].note_id, "A");
    assert_eq!(results[1].note_id, "B");
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn test_no_provider_is_capability_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let index = SemanticIndex::open(tmp.path(), None, DEFAULT_LIMIT).await.unwrap();

    assert!(!index.has_embeddings());
    assert!(matches!(
        index.index_note(&text_note("n1", &[("b1", "A")])).await,
        Err(IndexError::CapabilityUnavailable)
    ));
    assert!(matches!(
        index.search("A", None).await,
        Err(IndexError::CapabilityUnavailable)
    ));
    assert!(matches!(
        index.index_notes(Vec::<Note>::new().iter()).await,
        Err(IndexError::CapabilityUnavailable)
    ));

    // deleting needs no provider
    index.delete_note("n1").await.unwrap();
}

#[tokio::test]
async fn test_completion_only_provider_is_capability_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, provider) = open_with(tmp.path(), stub().without_embeddings()).await;

    assert!(!index.has_embeddings());
    assert!(matches!(
        index.search("A", None).await,
        Err(IndexError::CapabilityUnavailable)
    ));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_query_provider_failure_is_surfaced() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub().failing_on("north")).await;

    index.index_note(&text_note("n1", &[("b1", "east")])).await.unwrap();

    assert!(matches!(
        index.search("north", None).await,
        Err(IndexError::Provider(_))
    ));
}

#[tokio::test]
async fn test_mismatched_dimensions_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;

    index.index_note(&text_note("n1", &[("b1", "A")])).await.unwrap();

    // 3-d vector next to 2-d records
    let result = index.index_note(&text_note("n2", &[("b1", "the cat sat")])).await;
    assert!(matches!(
        result,
        Err(IndexError::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
    assert!(!index.records().contains_note("n2"));

    // 3-d query against 2-d records
    assert!(matches!(
        index.search("feline pet", None).await,
        Err(IndexError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_records_survive_restart() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (index, _) = open_with(tmp.path(), stub()).await;
        index
            .index_note(&text_note("n1", &[("b1", "A"), ("b2", "B")]))
            .await
            .unwrap();
    }

    let (index, _) = open_with(tmp.path(), stub()).await;
    assert_eq!(index.records().len(), 2);

    let results = index.search("B", Some(1)).await.unwrap();
    assert_eq!(results[0].block_id, "b2");
}

#[tokio::test]
async fn test_switching_embedding_model_starts_fresh() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (index, _) = open_with(tmp.path(), stub()).await;
        index.index_note(&text_note("n1", &[("b1", "A")])).await.unwrap();
    }

    let (index, _) = open_with(tmp.path(), stub().with_model("stub/v2")).await;
    assert!(index.records().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_index_and_search() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, _) = open_with(tmp.path(), stub()).await;
    let index = Arc::new(index);

    index.index_note(&text_note("seed", &[("b1", "east")])).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let writer = index.clone();
        handles.push(tokio::spawn(async move {
            let note = text_note(&format!("n{i}"), &[("b1", "A"), ("b2", "north")]);
            writer.index_note(&note).await.map(|_| ())
        }));

        let reader = index.clone();
        handles.push(tokio::spawn(async move {
            let results = reader.search("A", Some(100)).await?;
            assert!(!results.is_empty());
            Ok::<(), IndexError>(())
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = index.records();
    assert_eq!(snapshot.len(), 1 + 12 * 2);
    assert_eq!(snapshot.note_count(), 13);
}

#[tokio::test]
async fn test_from_config_respects_flags() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::load_with(tmp.path()).unwrap();

    // no api key
    let index = SemanticIndex::from_config(&config).await.unwrap();
    assert!(!index.has_embeddings());
    assert!(tmp.path().join("vector_db").is_dir());

    // vector db disabled
    config.ai_service.api_key = "sk-test".to_string();
    config.vector_db.enabled = false;
    let index = index.reconfigure(&config).await.unwrap();
    assert!(!index.has_embeddings());

    // gemini cannot embed
    config.vector_db.enabled = true;
    config.ai_service.provider = ProviderKind::Gemini;
    let index = index.reconfigure(&config).await.unwrap();
    assert!(index.provider().is_none());
    assert!(matches!(
        index.search("A", None).await,
        Err(IndexError::CapabilityUnavailable)
    ));

    config.ai_service.provider = ProviderKind::OpenAi;
    let index = index.reconfigure(&config).await.unwrap();
    assert!(index.has_embeddings());
    assert_eq!(index.store().model(), Some("openai/text-embedding-ada-002"));
}

fn write_untagged_store(dir: &Path) {
    let legacy = serde_json::json!([
        { "noteId": "old", "blockId": "b1", "vector": [1.0, 0.0], "text": "east" }
    ]);
    std::fs::write(dir.join(VECTORS_FILE), legacy.to_string()).unwrap();
}

#[tokio::test]
async fn test_reindex_replaces_untagged_vectors_of_other_length() {
    let tmp = tempfile::tempdir().unwrap();
    write_untagged_store(tmp.path());
    let (index, _) = open_with(tmp.path(), stub()).await;
    assert_eq!(index.records().len(), 1);

    // 3-d provider over a 2-d untagged file
    let notes = vec![
        text_note("A", &[("b1", "the cat sat")]),
        text_note("B", &[("b1", "a dog ran")]),
    ];
    let summary = index.index_notes(&notes).await.unwrap();
    assert_eq!(summary.indexed, 2);

    let snapshot = index.records();
    assert!(!snapshot.contains_note("old"));
    assert_eq!(snapshot.dimensions(), Some(3));

    let results = index.search("feline pet", None).await.unwrap();
    assert_eq!(results[0].note_id, "A");
}

#[tokio::test]
async fn test_search_drops_untagged_vectors_of_other_length() {
    let tmp = tempfile::tempdir().unwrap();
    write_untagged_store(tmp.path());
    let (index, _) = open_with(tmp.path(), stub()).await;

    let results = index.search("feline pet", None).await.unwrap();
    assert!(results.is_empty());
    assert!(index.records().is_empty());

    // and stays usable
    index
        .index_note(&text_note("A", &[("b1", "the cat sat")]))
        .await
        .unwrap();
    assert_eq!(index.search("feline pet", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_untagged_vectors_of_same_length_are_kept() {
    let tmp = tempfile::tempdir().unwrap();
    write_untagged_store(tmp.path());
    let (index, _) = open_with(tmp.path(), stub()).await;

    let results = index.search("A", None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].note_id, "old");
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn test_delete_without_provider_keeps_model_tag() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (index, _) = open_with(tmp.path(), stub()).await;
        index.index_note(&text_note("n1", &[("b1", "A")])).await.unwrap();
        index.index_note(&text_note("n2", &[("b1", "B")])).await.unwrap();
    }

    {
        let index = SemanticIndex::open(tmp.path(), None, DEFAULT_LIMIT).await.unwrap();
        index.delete_note("n1").await.unwrap();
    }

    let (index, _) = open_with(tmp.path(), stub().with_model("stub/v2")).await;
    assert!(index.records().is_empty());
}
