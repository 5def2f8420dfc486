//! NoteIndex main struct and lifecycle operations.
//!
//! The [`NoteIndex`] struct is the primary interface for hosts. It ties the
//! settings blob, the vector index, the host's documents, and the embedding
//! provider together and provides methods for:
//!
//! - Opening and closing the index
//! - Indexing single notes and whole scopes
//! - Similarity search
//! - Switching embedding model and active note group
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notevec::{Config, NoteIndex, NoopObserver, storage::open_store};
//!
//! let index = NoteIndex::open(open_store("./notevec.redb")?, documents, Config::default())?;
//!
//! // Index the active note group
//! let summary = index.index_active_group(Arc::new(NoopObserver))?.done().await?;
//!
//! // Notes similar to the one being edited
//! let results = index.search_similar(&DocumentRef::new("zettel/Idea.md")).await?;
//! ```
//!
//! # Thread Safety
//!
//! `NoteIndex` is `Send + Sync` and can be shared across tasks using `Arc`.
//! Rebuilding the index (model or scope change) swaps in a fresh
//! [`VectorIndex`]; runs already in flight finish against the old one and
//! their writes are dropped.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, instrument, warn};

use crate::concurrency::ProgressObserver;
use crate::config::{Config, EmbeddingModel, Preferences};
use crate::document::{DocumentRef, DocumentStore};
use crate::embedding::{create_embedding_provider, EmbeddingProvider};
use crate::error::{NoteVecError, NotFoundError, Result, StorageError};
use crate::extract::ContentFilter;
use crate::indexer::{Indexer, IndexingRun};
use crate::note_group::{AllowPattern, NoteGroup};
use crate::storage::{Settings, SettingsStore};
use crate::types::{SearchResult, StoredVector};
use crate::vector::VectorIndex;

/// Embedding provider, or why there is none.
#[derive(Clone)]
enum ProviderSlot {
    Ready(Arc<dyn EmbeddingProvider>),
    Unavailable(String),
}

impl ProviderSlot {
    fn resolve(model: EmbeddingModel, config: &Config, preferences: &Preferences) -> Self {
        match create_embedding_provider(model, config.resolve_api_key(preferences)) {
            Ok(provider) => Self::Ready(provider),
            Err(err) => {
                debug!(error = %err, "No embedding provider");
                let reason = match err {
                    NoteVecError::Config { reason } => reason,
                    other => other.to_string(),
                };
                Self::Unavailable(reason)
            }
        }
    }
}

/// The note embedding index.
///
/// # Example
///
/// ```rust,ignore
/// let index = NoteIndex::open(store, documents, Config::default())?
///     .with_provider(my_provider)?;
/// println!("{} notes indexed", index.count());
/// ```
pub struct NoteIndex {
    config: Config,
    settings: Arc<Settings>,
    documents: Arc<dyn DocumentStore>,
    index: RwLock<Arc<VectorIndex>>,
    provider: RwLock<ProviderSlot>,
}

impl std::fmt::Debug for NoteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteIndex")
            .field("config", &self.config.default_model)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl NoteIndex {
    /// Opens the index stored in `store`.
    ///
    /// Loads the settings blob, applies the legacy model migration, and
    /// builds the in-memory index. If no provider can be built (no API key,
    /// feature disabled), the index still opens; operations that need
    /// embeddings return a configuration error until one is supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the blob cannot be read.
    #[instrument(skip(store, documents, config))]
    pub fn open(
        store: Box<dyn SettingsStore>,
        documents: Arc<dyn DocumentStore>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;

        info!("Opening note index");

        let (settings, loaded) = Settings::load(store, config.default_model)?;
        let model = loaded.model;
        let index = Arc::new(VectorIndex::load(model, loaded.vectors, settings.bind_index()));

        let preferences = settings.preferences()?;
        let provider = ProviderSlot::resolve(model, &config, &preferences);

        info!(
            records = index.count(),
            model = model.label(),
            provider = matches!(provider, ProviderSlot::Ready(_)),
            "Note index opened"
        );

        Ok(Self {
            config,
            settings,
            documents,
            index: RwLock::new(index),
            provider: RwLock::new(provider),
        })
    }

    /// Replaces the embedding provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `provider` serves a different model
    /// than the index was built with.
    pub fn with_provider(self, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let model = self.model();
        if provider.model() != model {
            return Err(NoteVecError::config(format!(
                "provider serves {} but the index is built with {}",
                provider.model().api_name(),
                model.api_name()
            )));
        }
        self.set_provider(ProviderSlot::Ready(provider))?;
        Ok(self)
    }

    /// Closes the index.
    ///
    /// Every mutation is already persisted; this only releases resources.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!(records = self.count(), "Closing note index");
        drop(self);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the runtime configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current vector index.
    pub fn index(&self) -> Result<Arc<VectorIndex>> {
        self.index
            .read()
            .map(|index| Arc::clone(&index))
            .map_err(|_| StorageError::poisoned("index slot").into())
    }

    /// Returns the model the index is built with.
    pub fn model(&self) -> EmbeddingModel {
        self.index()
            .map(|index| index.model())
            .unwrap_or(self.config.default_model)
    }

    /// Returns the number of indexed notes.
    pub fn count(&self) -> usize {
        self.index().map(|index| index.count()).unwrap_or(0)
    }

    /// Returns the persisted preferences.
    pub fn preferences(&self) -> Result<Preferences> {
        self.settings.preferences()
    }

    /// Saves preferences.
    ///
    /// Rebuilds the provider if the effective API key changed.
    pub fn save_preferences(&self, preferences: Preferences) -> Result<()> {
        let before = self.settings.preferences()?;
        let key_changed = self.config.resolve_api_key(&before)
            != self.config.resolve_api_key(&preferences);

        if key_changed {
            let slot = ProviderSlot::resolve(self.model(), &self.config, &preferences);
            self.set_provider(slot)?;
            debug!("Embedding provider rebuilt after key change");
        }

        self.settings.save_preferences(preferences)
    }

    /// Returns the active note group, if the stored position is valid.
    pub fn active_group(&self) -> Result<Option<NoteGroup>> {
        let position = self.settings.indexed_note_group()?;
        Ok(self.settings.preferences()?.note_groups.get(position).cloned())
    }

    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let slot = self
            .provider
            .read()
            .map_err(|_| StorageError::poisoned("provider slot"))?;
        match &*slot {
            ProviderSlot::Ready(provider) => Ok(Arc::clone(provider)),
            ProviderSlot::Unavailable(reason) => Err(NoteVecError::config(reason.clone())),
        }
    }

    fn set_provider(&self, slot: ProviderSlot) -> Result<()> {
        let mut current = self
            .provider
            .write()
            .map_err(|_| StorageError::poisoned("provider slot"))?;
        *current = slot;
        Ok(())
    }

    /// Returns an indexer over the current index, provider, and filter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no provider is available.
    pub fn indexer(&self) -> Result<Indexer> {
        let provider = self.provider()?;
        let preferences = self.settings.preferences()?;
        let filter = ContentFilter::new(&preferences.content_marker);

        Ok(Indexer::new(
            self.index()?,
            Arc::clone(&self.documents),
            provider,
            filter,
        )
        .with_concurrency_limit(self.config.concurrency_limit))
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Indexes one note. Errors are returned, not logged and skipped.
    pub async fn index_document(&self, doc: &DocumentRef) -> Result<StoredVector> {
        self.indexer()?.index_document(doc).await
    }

    /// Starts a batch over the active note group.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Configuration errors and an out-of-range active group are returned
    /// before anything starts.
    #[instrument(skip(self, observer))]
    pub fn index_active_group(&self, observer: Arc<dyn ProgressObserver>) -> Result<IndexingRun> {
        let indexer = self.indexer()?;
        let docs = self.active_group_documents()?;
        Ok(indexer.index_documents(docs, observer))
    }

    /// Starts a batch over every note matching the `allowPattern` preference.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self, observer))]
    pub fn index_allowed(&self, observer: Arc<dyn ProgressObserver>) -> Result<IndexingRun> {
        let indexer = self.indexer()?;
        let pattern = AllowPattern::parse(&self.settings.preferences()?.allow_pattern);
        let docs = pattern.filter(&self.documents.list_documents()?);
        Ok(indexer.index_documents(docs, observer))
    }

    /// Counts notes in the active group without an up-to-date record.
    pub async fn count_needing_index(&self) -> Result<usize> {
        let indexer = self.indexer()?;
        let docs = self.active_group_documents()?;
        Ok(indexer.count_needing_index(&docs).await)
    }

    fn active_group_documents(&self) -> Result<Vec<DocumentRef>> {
        let position = self.settings.indexed_note_group()?;
        let group = self
            .active_group()?
            .ok_or_else(|| NotFoundError::note_group(position))?;
        let docs = group.documents_in(&self.documents.list_documents()?);
        debug!(group = %group.name, selected = docs.len(), "Scoped documents");
        Ok(docs)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Ranks every other note by similarity to `doc`.
    ///
    /// The note is indexed first if needed, so this may call the provider.
    pub async fn search_similar(&self, doc: &DocumentRef) -> Result<Vec<SearchResult>> {
        let indexer = self.indexer()?;
        let record = indexer.index_document(doc).await?;
        indexer.index().search(&record)
    }

    /// Returns the `n` notes most similar to the stored note `identity`.
    pub fn find_top_matches(&self, identity: &str, n: usize) -> Result<Vec<SearchResult>> {
        self.index()?.find_top_matches(identity, n)
    }

    // =========================================================================
    // Rebuilds
    // =========================================================================

    fn reset_index(&self, model: EmbeddingModel) -> Result<()> {
        let fresh = Arc::new(VectorIndex::load(model, Vec::new(), self.settings.bind_index()));
        fresh.clear()?;

        let mut slot = self
            .index
            .write()
            .map_err(|_| StorageError::poisoned("index slot"))?;
        *slot = fresh;
        Ok(())
    }

    /// Drops every record.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<()> {
        self.reset_index(self.model())
    }

    /// Switches to another embedding model.
    ///
    /// Vectors from different models are not comparable, so every record is
    /// dropped. The caller re-runs indexing afterwards. With `provider` set,
    /// it is used as-is; otherwise one is built from the configured key.
    ///
    /// Returns false if `model` is already active.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `provider` serves another model.
    #[instrument(skip(self, provider))]
    pub fn change_embedding_model(
        &self,
        model: EmbeddingModel,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<bool> {
        if model == self.model() {
            return Ok(false);
        }

        let slot = match provider {
            Some(provider) if provider.model() != model => {
                return Err(NoteVecError::config(format!(
                    "provider serves {} but {} was requested",
                    provider.model().api_name(),
                    model.api_name()
                )));
            }
            Some(provider) => ProviderSlot::Ready(provider),
            None => ProviderSlot::resolve(model, &self.config, &self.settings.preferences()?),
        };

        let dropped = self.count();
        self.reset_index(model)?;
        self.set_provider(slot)?;

        warn!(dropped, model = model.label(), "Embedding model changed; index cleared");
        Ok(true)
    }

    /// Makes the group at `position` the indexing scope.
    ///
    /// Only one group is indexed at a time, so changing it drops every
    /// record. Returns false if the group was already active.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::NoteGroup`] if `position` is out of range.
    #[instrument(skip(self))]
    pub fn set_active_group(&self, position: usize) -> Result<bool> {
        if self.settings.indexed_note_group()? == position {
            return Ok(false);
        }

        self.settings.set_indexed_note_group(position)?;
        self.reset_index(self.model())?;

        info!(position, "Active note group changed; index cleared");
        Ok(true)
    }
}
