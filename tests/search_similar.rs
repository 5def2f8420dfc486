//! Integration tests for similarity search.
//!
//! Drives the full path (documents, filter, digest, provider, index) with a
//! deterministic provider so rankings can be asserted exactly.

mod common;

use common::{char_sum, fixture};
use notevec::{DocumentRef, StoredVector, VectorIndex};

/// Indexes each path in order, one at a time.
async fn index_all(index: &notevec::NoteIndex, paths: &[&str]) -> Vec<StoredVector> {
    let mut records = Vec::new();
    for path in paths {
        records.push(index.index_document(&DocumentRef::new(*path)).await.unwrap());
    }
    records
}

// ============================================================================
// Duplicate content
// ============================================================================

#[tokio::test]
async fn test_duplicate_notes_share_one_record() {
    let fx = fixture(&[
        ("A.md", "hello world"),
        ("B.md", "hello world"),
        ("C.md", "goodbye"),
    ]);

    index_all(&fx.index, &["A.md", "B.md", "C.md"]).await;

    assert_eq!(fx.index.count(), 2);
    // "hello world" once, "goodbye" once
    assert_eq!(fx.provider.calls(), 2);
}

#[tokio::test]
async fn test_search_from_distinct_note_excludes_self() {
    let fx = fixture(&[
        ("A.md", "hello world"),
        ("B.md", "hello world"),
        ("C.md", "goodbye"),
    ]);

    let records = index_all(&fx.index, &["A.md", "B.md", "C.md"]).await;
    let c = &records[2];
    assert_eq!(c.identity, "C");

    let results = fx.index.index().unwrap().search(c).unwrap();

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert!(hit.record.identity == "A" || hit.record.identity == "B");
    assert_eq!(hit.record.embedding, char_sum("hello world"));
    assert!(hit.similarity < 1.0);
    assert!(hit.similarity > 0.0);
}

#[tokio::test]
async fn test_search_similar_indexes_query_note_first() {
    let fx = fixture(&[("A.md", "alpha beta"), ("B.md", "gamma")]);
    index_all(&fx.index, &["A.md"]).await;
    assert_eq!(fx.index.count(), 1);

    let results = fx.index.search_similar(&DocumentRef::new("B.md")).await.unwrap();

    assert_eq!(fx.index.count(), 2);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.identity, "A");
}

// ============================================================================
// Ranking
// ============================================================================

#[tokio::test]
async fn test_results_sorted_descending() {
    let fx = fixture(&[
        ("Query.md", "aaaa bbbb"),
        ("Close.md", "aaaa bbbc"),
        ("Middle.md", "aa bbbbbbbbbbbbbbbb"),
        ("Far.md", "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"),
    ]);
    index_all(&fx.index, &["Close.md", "Middle.md", "Far.md"]).await;

    let results = fx
        .index
        .search_similar(&DocumentRef::new("Query.md"))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert_eq!(results[0].record.identity, "Close");
    assert_eq!(results[2].record.identity, "Far");
}

#[tokio::test]
async fn test_find_top_matches_limits_results() {
    let fx = fixture(&[
        ("A.md", "one note"),
        ("B.md", "two notes"),
        ("C.md", "three notes here"),
        ("D.md", "four"),
    ]);
    index_all(&fx.index, &["A.md", "B.md", "C.md", "D.md"]).await;

    let top = fx.index.find_top_matches("A", 2).unwrap();
    assert_eq!(top.len(), 2);
    assert!(top.iter().all(|hit| hit.record.identity != "A"));

    let all = fx.index.find_top_matches("A", 10).unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_find_top_matches_unknown_identity() {
    let fx = fixture(&[("A.md", "one note")]);
    index_all(&fx.index, &["A.md"]).await;

    let err = fx.index.find_top_matches("Nope", 3).unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Raw vector queries
// ============================================================================

#[test]
fn test_raw_vector_query_includes_identical_record() {
    let index = VectorIndex::in_memory(notevec::EmbeddingModel::default());
    let record = StoredVector::new(
        "A",
        "A.md",
        char_sum("hello world"),
        notevec::digest("hello world"),
    );
    index.save(record).unwrap();

    let query = char_sum("hello world");
    let results = index.search(&query).unwrap();

    assert_eq!(results.len(), 1);
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[test]
fn test_search_empty_index() {
    let index = VectorIndex::in_memory(notevec::EmbeddingModel::default());
    let query = vec![1.0, 2.0, 3.0, 4.0];
    assert!(index.search(&query).unwrap().is_empty());
}
