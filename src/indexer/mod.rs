//! Indexing orchestration.
//!
//! [`Indexer`] turns host documents into index records: read the text,
//! filter it, hash it, and hand it to [`VectorIndex::upsert`]. Batches go
//! through a [`ConcurrencyManager`], so at most `concurrency_limit`
//! embedding requests are in flight and one bad note never stops the rest.
//!
//! Every successful upsert flushes on its own, so an interrupted batch
//! keeps whatever it finished.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use crate::concurrency::{ConcurrencyManager, ProgressObserver, RunSummary};
use crate::config::DEFAULT_CONCURRENCY_LIMIT;
use crate::document::{DocumentRef, DocumentStore, PreparedDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{NoteVecError, Result};
use crate::extract::ContentFilter;
use crate::types::StoredVector;
use crate::vector::VectorIndex;

/// Drives documents into a [`VectorIndex`].
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Indexer {
    index: Arc<VectorIndex>,
    documents: Arc<dyn DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    filter: ContentFilter,
    concurrency_limit: usize,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("index", &self.index)
            .field("filter", &self.filter)
            .field("concurrency_limit", &self.concurrency_limit)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    /// Creates an indexer with the default concurrency limit.
    pub fn new(
        index: Arc<VectorIndex>,
        documents: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        filter: ContentFilter,
    ) -> Self {
        Self {
            index,
            documents,
            provider,
            filter,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }

    /// Sets how many embedding requests a batch keeps in flight.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Returns the target index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Reads and filters a document.
    ///
    /// # Errors
    ///
    /// Store errors from reading, and [`NoteVecError::Extraction`] if
    /// nothing is left after filtering.
    pub async fn prepare(&self, doc: &DocumentRef) -> Result<PreparedDocument> {
        let identity = self.documents.identity(doc);
        let raw = self.documents.read_text(doc).await?;
        let text = self.filter.extract(&identity, &raw)?;
        Ok(PreparedDocument::new(identity, doc.path.as_str(), text))
    }

    /// Indexes a single document, surfacing every error.
    pub async fn index_document(&self, doc: &DocumentRef) -> Result<StoredVector> {
        let prepared = self.prepare(doc).await?;
        self.index.upsert(&prepared, self.provider.as_ref()).await
    }

    /// Starts a batch over `docs`.
    ///
    /// Extraction and provider failures are logged and counted in the
    /// summary. Consistency failures are logged too, and the first one is
    /// returned from [`IndexingRun::done`].
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self, docs, observer), fields(count = docs.len()))]
    pub fn index_documents(
        &self,
        docs: Vec<DocumentRef>,
        observer: Arc<dyn ProgressObserver>,
    ) -> IndexingRun {
        let total = docs.len();
        let fatal: Arc<Mutex<Option<NoteVecError>>> = Arc::new(Mutex::new(None));

        info!(total, limit = self.concurrency_limit, "Starting indexing run");

        let indexer = self.clone();
        let first_fatal = fatal.clone();
        let manager = ConcurrencyManager::start(
            self.concurrency_limit,
            docs,
            move |doc: DocumentRef| {
                let indexer = indexer.clone();
                let first_fatal = first_fatal.clone();
                async move {
                    match indexer.index_document(&doc).await {
                        Ok(record) => {
                            debug!(identity = %record.identity, "Indexed");
                            Ok(())
                        }
                        Err(err) if err.is_consistency() => {
                            let message = err.to_string();
                            if let Ok(mut slot) = first_fatal.lock() {
                                slot.get_or_insert(err);
                            }
                            Err(NoteVecError::consistency(message))
                        }
                        Err(err) => {
                            warn!(path = %doc.path, "Skipping document");
                            Err(err)
                        }
                    }
                }
            },
            observer,
        );

        IndexingRun {
            total,
            manager,
            fatal,
        }
    }

    /// Counts the documents in `docs` that have no up-to-date record.
    ///
    /// Documents that cannot be read or filtered are not counted; indexing
    /// them would fail anyway.
    pub async fn count_needing_index(&self, docs: &[DocumentRef]) -> usize {
        let mut count = 0;
        for doc in docs {
            match self.prepare(doc).await {
                Ok(prepared) if self.index.needs_indexing(&prepared) => count += 1,
                Ok(_) => {}
                Err(err) => debug!(path = %doc.path, error = %err, "Not counted"),
            }
        }
        count
    }
}

/// A batch in progress.
///
/// Await [`done`](Self::done) for the outcome. Dropping the run without
/// awaiting it leaves in-flight work to finish in the background.
#[derive(Debug)]
pub struct IndexingRun {
    total: usize,
    manager: ConcurrencyManager<DocumentRef>,
    fatal: Arc<Mutex<Option<NoteVecError>>>,
}

impl IndexingRun {
    /// Number of documents queued so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Adds a document to the running batch.
    ///
    /// Returns false if the batch has already settled; start a new run.
    pub fn enqueue(&mut self, doc: DocumentRef) -> bool {
        let queued = self.manager.push(doc);
        if queued {
            self.total += 1;
        }
        queued
    }

    /// Waits for every queued document to settle.
    ///
    /// # Errors
    ///
    /// Returns the first consistency error any task hit. Other per-document
    /// failures only show in the summary's `failed` count.
    pub async fn done(self) -> Result<RunSummary> {
        let summary = self.manager.done().await?;

        let fatal = self.fatal.lock().ok().and_then(|mut slot| slot.take());
        if let Some(err) = fatal {
            return Err(err);
        }

        info!(
            total = self.total,
            succeeded = summary.succeeded(),
            failed = summary.failed,
            "Indexing run settled"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::concurrency::NoopObserver;
    use crate::config::EmbeddingModel;
    use crate::document::InMemoryDocuments;
    use crate::types::Embedding;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn model(&self) -> EmbeddingModel {
            EmbeddingModel::default()
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn setup(docs: &[(&str, &str)], marker: &str) -> (Indexer, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider::default());
        let documents = Arc::new(InMemoryDocuments::with_documents(docs.iter().copied()));
        let index = Arc::new(VectorIndex::in_memory(EmbeddingModel::default()));
        let indexer = Indexer::new(index, documents, provider.clone(), ContentFilter::new(marker));
        (indexer, provider)
    }

    #[tokio::test]
    async fn test_prepare_applies_filter() {
        let (indexer, _) = setup(&[("A.md", "# Title\n## Body\nkept\n")], "## Body");
        let prepared = indexer.prepare(&DocumentRef::new("A.md")).await.unwrap();
        assert_eq!(prepared.identity(), "A");
        assert_eq!(prepared.text(), "kept");
    }

    #[tokio::test]
    async fn test_index_document_surfaces_extraction_failure() {
        let (indexer, provider) = setup(&[("Empty.md", "   ")], "");
        let err = indexer
            .index_document(&DocumentRef::new("Empty.md"))
            .await
            .unwrap_err();
        assert!(err.is_extraction());
        assert_eq!(err.to_string(), "Error extracting text for [[Empty]]");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_skips_bad_documents() {
        let (indexer, _) = setup(&[("A.md", "alpha"), ("B.md", ""), ("C.md", "gamma")], "");
        let docs = vec![
            DocumentRef::new("A.md"),
            DocumentRef::new("B.md"),
            DocumentRef::new("C.md"),
            DocumentRef::new("Missing.md"),
        ];

        let summary = indexer
            .index_documents(docs, Arc::new(NoopObserver))
            .done()
            .await
            .unwrap();

        assert_eq!(summary.completed, 4);
        assert_eq!(summary.failed, 2);
        assert_eq!(indexer.index().count(), 2);
    }

    #[tokio::test]
    async fn test_count_needing_index() {
        let (indexer, _) = setup(&[("A.md", "alpha"), ("B.md", "beta"), ("C.md", "")], "");
        let docs = vec![
            DocumentRef::new("A.md"),
            DocumentRef::new("B.md"),
            DocumentRef::new("C.md"),
        ];
        assert_eq!(indexer.count_needing_index(&docs).await, 2);

        indexer.index_document(&docs[0]).await.unwrap();
        assert_eq!(indexer.count_needing_index(&docs).await, 1);
    }

    #[tokio::test]
    async fn test_enqueue_extends_running_batch() {
        let (indexer, _) = setup(&[("A.md", "alpha"), ("B.md", "beta")], "");
        let mut run = indexer.index_documents(vec![DocumentRef::new("A.md")], Arc::new(NoopObserver));
        assert!(run.enqueue(DocumentRef::new("B.md")));
        assert_eq!(run.total(), 2);

        let summary = run.done().await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(indexer.index().count(), 2);
    }
}
