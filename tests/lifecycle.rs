//! Integration tests for opening, reopening, and rebuilding the index.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{fixture, CharSumProvider};
use notevec::storage::{open_store, MemoryStore, SettingsDocument};
use notevec::{
    Config, DocumentRef, EmbeddingModel, InMemoryDocuments, NoteGroup, NoteIndex, StoredVector,
};
use tempfile::tempdir;

fn notes() -> Arc<InMemoryDocuments> {
    Arc::new(InMemoryDocuments::with_documents([
        ("A.md", "alpha note"),
        ("B.md", "beta note"),
        ("lit/C.md", "gamma reading"),
    ]))
}

fn open_at(path: &Path, documents: Arc<InMemoryDocuments>, provider: Arc<CharSumProvider>) -> NoteIndex {
    NoteIndex::open(open_store(path).unwrap(), documents, Config::default())
        .unwrap()
        .with_provider(provider)
        .unwrap()
}

// ============================================================================
// Reopen
// ============================================================================

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notevec.redb");
    let documents = notes();

    let provider = Arc::new(CharSumProvider::new());
    let index = open_at(&path, documents.clone(), provider.clone());
    index.index_document(&DocumentRef::new("A.md")).await.unwrap();
    index.index_document(&DocumentRef::new("B.md")).await.unwrap();
    assert_eq!(provider.calls(), 2);
    index.close().unwrap();

    let provider = Arc::new(CharSumProvider::new());
    let index = open_at(&path, documents, provider.clone());
    assert_eq!(index.count(), 2);
    assert_eq!(index.model(), EmbeddingModel::TextEmbedding3Small);

    // Already indexed, so nothing is embedded
    index.index_document(&DocumentRef::new("A.md")).await.unwrap();
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_open_missing_file_starts_empty() {
    let dir = tempdir().unwrap();
    let index = NoteIndex::open(
        open_store(dir.path().join("fresh.redb")).unwrap(),
        notes(),
        Config::default(),
    )
    .unwrap();

    assert_eq!(index.count(), 0);
    assert_eq!(index.active_group().unwrap().unwrap().name, "Permanent Notes");
}

// ============================================================================
// Legacy blobs
// ============================================================================

#[test]
fn test_unlabelled_blob_is_treated_as_legacy_model() {
    let blob = br#"{
        "allowPattern": ".*",
        "vectors": [
            {"linktext": "A", "path": "A.md", "embedding": [1.0, 0.0], "sha": "legacy-a"}
        ]
    }"#;
    let store = Box::new(MemoryStore::with_blob(blob.to_vec()));
    let index = NoteIndex::open(store, notes(), Config::default()).unwrap();

    assert_eq!(index.model(), EmbeddingModel::Ada002);
    assert_eq!(index.count(), 1);

    let err = index
        .with_provider(Arc::new(CharSumProvider::new()))
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_legacy_index_accepts_matching_provider() {
    let blob = br#"{"vectors": [{"linktext": "A", "path": "A.md", "embedding": [1.0], "sha": "x"}]}"#;
    let store = Box::new(MemoryStore::with_blob(blob.to_vec()));

    let index = NoteIndex::open(store, notes(), Config::default())
        .unwrap()
        .with_provider(Arc::new(CharSumProvider::for_model(EmbeddingModel::Ada002)))
        .unwrap();
    assert_eq!(index.model(), EmbeddingModel::Ada002);
}

// ============================================================================
// Model change
// ============================================================================

#[tokio::test]
async fn test_change_model_clears_and_persists() {
    let fx = fixture(&[("A.md", "alpha"), ("B.md", "beta")]);
    fx.index.index_document(&DocumentRef::new("A.md")).await.unwrap();
    fx.index.index_document(&DocumentRef::new("B.md")).await.unwrap();

    let changed = fx
        .index
        .change_embedding_model(
            EmbeddingModel::Ada002,
            Some(Arc::new(CharSumProvider::for_model(EmbeddingModel::Ada002))),
        )
        .unwrap();

    assert!(changed);
    assert_eq!(fx.index.count(), 0);
    assert_eq!(fx.index.model(), EmbeddingModel::Ada002);

    let doc = SettingsDocument::from_blob(&fx.store.blob().unwrap().unwrap()).unwrap();
    assert!(doc.vectors.is_empty());
    assert_eq!(doc.embeddings_model_version, Some(EmbeddingModel::Ada002));
}

#[test]
fn test_change_model_rejects_mismatched_provider() {
    let fx = fixture(&[]);
    let err = fx
        .index
        .change_embedding_model(EmbeddingModel::Ada002, Some(Arc::new(CharSumProvider::new())))
        .unwrap_err();

    assert!(err.is_config());
    assert_eq!(fx.index.model(), EmbeddingModel::TextEmbedding3Small);
}

#[tokio::test]
async fn test_writes_from_replaced_index_are_dropped() {
    let fx = fixture(&[("A.md", "alpha"), ("B.md", "beta")]);
    let stale = fx.index.indexer().unwrap();

    fx.index.clear().unwrap();
    stale.index_document(&DocumentRef::new("A.md")).await.unwrap();

    assert_eq!(fx.index.count(), 0);
    let doc = SettingsDocument::from_blob(&fx.store.blob().unwrap().unwrap()).unwrap();
    assert!(doc.vectors.is_empty());
}

// ============================================================================
// Active note group
// ============================================================================

#[tokio::test]
async fn test_switching_group_clears_index() {
    let fx = fixture(&[("A.md", "alpha"), ("lit/C.md", "gamma")]);

    let mut prefs = fx.index.preferences().unwrap();
    prefs
        .note_groups
        .push(NoteGroup::new("Literature", Some("lit".to_string())));
    fx.index.save_preferences(prefs).unwrap();

    fx.index.index_document(&DocumentRef::new("A.md")).await.unwrap();
    assert_eq!(fx.index.count(), 1);

    assert!(fx.index.set_active_group(1).unwrap());
    assert_eq!(fx.index.count(), 0);
    assert_eq!(fx.index.active_group().unwrap().unwrap().name, "Literature");

    // Same group again is a no-op
    assert!(!fx.index.set_active_group(1).unwrap());
}

#[tokio::test]
async fn test_preferences_round_trip_with_vectors() {
    let fx = fixture(&[("A.md", "## Body\nalpha\n")]);

    let mut prefs = fx.index.preferences().unwrap();
    prefs.content_marker = "## Body".to_string();
    prefs.allow_pattern = "zettel/, lit/".to_string();
    fx.index.save_preferences(prefs.clone()).unwrap();

    let record: StoredVector = fx.index.index_document(&DocumentRef::new("A.md")).await.unwrap();
    assert_eq!(record.digest, notevec::digest("alpha"));

    let doc = SettingsDocument::from_blob(&fx.store.blob().unwrap().unwrap()).unwrap();
    assert_eq!(doc.preferences, prefs);
    assert_eq!(doc.vectors, vec![record]);
}
