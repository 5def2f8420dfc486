//! Typed handle over the settings blob.
//!
//! [`Settings`] owns the decoded [`SettingsDocument`] and writes the whole
//! blob back through its [`SettingsStore`] whenever any part changes. The
//! vector index reaches it through an [`IndexSink`] obtained from
//! [`Settings::bind_index`], so index mutations and preference edits end up
//! in the same document.
//!
//! Only the most recently bound sink writes. When the index is rebuilt (model
//! change, scope change, clear), flushes from tasks still holding the old
//! index are dropped instead of resurrecting its records.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument};

use super::schema::SettingsDocument;
use super::{IndexSink, SettingsStore};
use crate::config::{EmbeddingModel, Preferences};
use crate::error::{NotFoundError, Result, StorageError};
use crate::types::StoredVector;

/// Index contents read from the blob at load time.
#[derive(Clone, Debug)]
pub struct LoadedIndex {
    /// Model the vectors were built with, after migration.
    pub model: EmbeddingModel,

    /// Stored vectors in blob order.
    pub vectors: Vec<StoredVector>,
}

/// Settings blob handle.
pub struct Settings {
    store: Box<dyn SettingsStore>,
    document: Mutex<SettingsDocument>,
    generation: AtomicU64,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("path", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Reads and decodes the blob, returning the handle and the stored index.
    ///
    /// A store with no blob yields default preferences and an empty index
    /// built with `default_model`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the blob cannot be read or decoded.
    #[instrument(skip(store))]
    pub fn load(
        store: Box<dyn SettingsStore>,
        default_model: EmbeddingModel,
    ) -> Result<(Arc<Self>, LoadedIndex)> {
        let mut document = match store.load()? {
            Some(blob) => SettingsDocument::from_blob(&blob)?,
            None => {
                debug!("No settings blob; starting from defaults");
                SettingsDocument::default()
            }
        };

        let model = document.resolve_model(default_model);
        if document.embeddings_model_version.is_none() {
            debug!(model = model.label(), "Settings blob has no model label");
        }
        document.embeddings_model_version = Some(model);

        let loaded = LoadedIndex {
            model,
            vectors: document.vectors.clone(),
        };

        info!(
            vectors = loaded.vectors.len(),
            model = model.label(),
            "Settings loaded"
        );

        let settings = Arc::new(Self {
            store,
            document: Mutex::new(document),
            generation: AtomicU64::new(0),
        });
        Ok((settings, loaded))
    }

    fn lock(&self) -> Result<MutexGuard<'_, SettingsDocument>> {
        self.document
            .lock()
            .map_err(|_| StorageError::poisoned("settings document").into())
    }

    fn write(&self, document: &SettingsDocument) -> Result<()> {
        let blob = document.to_blob()?;
        self.store.save(&blob)
    }

    /// Returns a copy of the current preferences.
    pub fn preferences(&self) -> Result<Preferences> {
        Ok(self.lock()?.preferences.clone())
    }

    /// Replaces the preferences and writes the blob.
    pub fn save_preferences(&self, preferences: Preferences) -> Result<()> {
        let mut document = self.lock()?;
        document.preferences = preferences;
        self.write(&document)
    }

    /// Returns the index of the active note group.
    pub fn indexed_note_group(&self) -> Result<usize> {
        Ok(self.lock()?.indexed_note_group)
    }

    /// Sets the active note group and writes the blob.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::NoteGroup`] if `index` is out of range.
    pub fn set_indexed_note_group(&self, index: usize) -> Result<()> {
        let mut document = self.lock()?;
        if index >= document.preferences.note_groups.len() {
            return Err(NotFoundError::note_group(index).into());
        }
        document.indexed_note_group = index;
        self.write(&document)
    }

    /// Returns the model label currently recorded in the blob.
    pub fn model(&self) -> Result<Option<EmbeddingModel>> {
        Ok(self.lock()?.embeddings_model_version)
    }

    /// Returns the backing store.
    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Returns a sink for a newly built index.
    ///
    /// Every sink bound earlier stops writing.
    pub fn bind_index(self: &Arc<Self>) -> Arc<dyn IndexSink> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Arc::new(SettingsSink {
            settings: Arc::clone(self),
            generation,
        })
    }
}

/// [`IndexSink`] bound to one index instance.
struct SettingsSink {
    settings: Arc<Settings>,
    generation: u64,
}

impl IndexSink for SettingsSink {
    fn persist_index(&self, model: EmbeddingModel, vectors: &[StoredVector]) -> Result<()> {
        let mut document = self.settings.lock()?;
        if self.settings.generation.load(Ordering::SeqCst) != self.generation {
            debug!(records = vectors.len(), "Ignoring flush from a replaced index");
            return Ok(());
        }
        document.vectors = vectors.to_vec();
        document.embeddings_model_version = Some(model);
        self.settings.write(&document)
    }
}
