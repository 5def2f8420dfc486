//! Storage layer abstractions for notevec.
//!
//! The index persists through the host's settings blob: one JSON document
//! holding user preferences, the vector list, the model label, and the
//! active note group. This module separates *where* the blob lives
//! ([`SettingsStore`]) from *what* it contains ([`SettingsDocument`]) and
//! from the typed handle the rest of the crate uses ([`Settings`]).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      NoteIndex                               │
//! │                  │              │                            │
//! │                  ▼              ▼                            │
//! │          ┌─────────────┐  ┌──────────────┐                  │
//! │          │ VectorIndex │─▶│  IndexSink   │  ← Trait         │
//! │          └─────────────┘  └──────────────┘                  │
//! │                                 ▲                            │
//! │                           ┌─────┴─────┐                      │
//! │                           │ Settings  │                      │
//! │                           └─────┬─────┘                      │
//! │                                 ▼                            │
//! │                     ┌─────────────────────┐                 │
//! │                     │   SettingsStore     │  ← Trait        │
//! │                     └─────────────────────┘                 │
//! │                       ▲               ▲                     │
//! │              ┌────────┴──┐       ┌────┴────────┐            │
//! │              │ RedbStore │       │ MemoryStore │            │
//! │              └───────────┘       └─────────────┘            │
//! │                 (file)              (host/test)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod redb;
pub mod schema;
pub mod settings;

pub use self::redb::RedbStore;
pub use schema::SettingsDocument;
pub use settings::{LoadedIndex, Settings};

use std::path::Path;
use std::sync::Mutex;

use crate::config::EmbeddingModel;
use crate::error::{Result, StorageError};
use crate::types::StoredVector;

/// Byte-level persistence for the settings blob.
///
/// Implementations store and return one opaque blob. A missing blob is
/// `Ok(None)`, not an error; the caller starts from defaults.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Writes are serialized by the
/// caller, so an implementation only needs each `save` to be atomic.
pub trait SettingsStore: Send + Sync {
    /// Reads the current blob, if one was ever saved.
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob.
    fn save(&self, blob: &[u8]) -> Result<()>;

    /// Returns the backing file path, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Receives the full vector list after every index mutation.
///
/// The index hands over the authoritative list; the sink writes it out.
/// A failed write surfaces to the caller of the mutating operation.
pub trait IndexSink: Send + Sync {
    /// Persists `vectors` as the current index built with `model`.
    fn persist_index(&self, model: EmbeddingModel, vectors: &[StoredVector]) -> Result<()>;
}

/// Sink that discards everything. Used for purely in-memory indexes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl IndexSink for NullSink {
    fn persist_index(&self, _model: EmbeddingModel, _vectors: &[StoredVector]) -> Result<()> {
        Ok(())
    }
}

/// In-memory [`SettingsStore`].
///
/// For hosts that manage the blob themselves (they seed it with
/// [`with_blob`](Self::with_blob) and read it back with
/// [`blob`](Self::blob)) and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    blob: Option<Vec<u8>>,
    saves: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `blob`.
    pub fn with_blob(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                blob: Some(blob.into()),
                saves: 0,
            }),
        }
    }

    /// Returns a copy of the current blob.
    pub fn blob(&self) -> Result<Option<Vec<u8>>> {
        self.load()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.saves).unwrap_or(0)
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::poisoned("memory store"))?;
        Ok(state.blob.clone())
    }

    fn save(&self, blob: &[u8]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StorageError::poisoned("memory store"))?;
        state.blob = Some(blob.to_vec());
        state.saves += 1;
        Ok(())
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        (**self).load()
    }

    fn save(&self, blob: &[u8]) -> Result<()> {
        (**self).save(blob)
    }

    fn path(&self) -> Option<&Path> {
        (**self).path()
    }
}

/// Opens the file-backed settings store at `path`.
///
/// Convenience for [`RedbStore::open`].
pub fn open_store(path: impl AsRef<Path>) -> Result<Box<dyn SettingsStore>> {
    Ok(Box::new(RedbStore::open(path)?))
}
