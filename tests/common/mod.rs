//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use notevec::storage::MemoryStore;
use notevec::{
    Config, Embedding, EmbeddingModel, EmbeddingProvider, InMemoryDocuments, NoteIndex,
    NoteVecError, Result,
};

/// Embedding length produced by [`CharSumProvider`].
pub const DIM: usize = 4;

/// Deterministic embedding: `[len, vowels, consonants, spaces + 1]`.
pub fn char_sum(text: &str) -> Embedding {
    let mut vowels = 0.0;
    let mut consonants = 0.0;
    let mut spaces = 0.0;
    for c in text.chars() {
        match c.to_ascii_lowercase() {
            'a' | 'e' | 'i' | 'o' | 'u' => vowels += 1.0,
            c if c.is_ascii_alphabetic() => consonants += 1.0,
            c if c.is_whitespace() => spaces += 1.0,
            _ => {}
        }
    }
    vec![text.chars().count() as f32, vowels, consonants, spaces + 1.0]
}

/// Stub provider built on [`char_sum`], with a call counter.
#[derive(Default)]
pub struct CharSumProvider {
    calls: AtomicUsize,
    fail_on: Mutex<Vec<String>>,
    model: Option<EmbeddingModel>,
}

impl CharSumProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that claims to serve `model`.
    pub fn for_model(model: EmbeddingModel) -> Self {
        Self {
            model: Some(model),
            ..Default::default()
        }
    }

    /// Makes requests for exactly `text` fail.
    pub fn fail_on(&self, text: &str) {
        self.fail_on.lock().unwrap().push(text.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CharSumProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail_on = self.fail_on.lock().unwrap().clone();
        if texts.iter().any(|t| fail_on.contains(t)) {
            return Err(NoteVecError::embedding("429 Too Many Requests"));
        }
        Ok(texts.iter().map(|t| char_sum(t)).collect())
    }

    fn model(&self) -> EmbeddingModel {
        self.model.unwrap_or_default()
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Everything a test needs to drive a [`NoteIndex`].
pub struct Fixture {
    pub index: NoteIndex,
    pub store: Arc<MemoryStore>,
    pub documents: Arc<InMemoryDocuments>,
    pub provider: Arc<CharSumProvider>,
}

/// Opens an index over in-memory notes with the stub provider.
pub fn fixture(notes: &[(&str, &str)]) -> Fixture {
    fixture_with_config(notes, Config::default())
}

pub fn fixture_with_config(notes: &[(&str, &str)], config: Config) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let documents = Arc::new(InMemoryDocuments::with_documents(notes.iter().copied()));
    let provider = Arc::new(CharSumProvider::new());

    let index = NoteIndex::open(Box::new(store.clone()), documents.clone(), config)
        .unwrap()
        .with_provider(provider.clone())
        .unwrap();

    Fixture {
        index,
        store,
        documents,
        provider,
    }
}
