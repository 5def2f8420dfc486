//! # notevec
//!
//! Embedding index for a personal note corpus.
//!
//! notevec keeps one embedding per note, finds notes similar to a given
//! one, and keeps the index in step with the notes as they are edited,
//! renamed, and duplicated, while calling the embedding provider as rarely
//! as possible.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notevec::prelude::*;
//! use notevec::storage::open_store;
//!
//! // Open (or create) the index
//! let index = NoteIndex::open(open_store("./notevec.redb")?, documents, Config::default())?;
//!
//! // Index the active note group, reporting progress
//! let run = index.index_active_group(Arc::new(|e: ProgressEvent| println!("{:?}", e)))?;
//! let summary = run.done().await?;
//!
//! // Find notes related to the one being edited
//! for hit in index.search_similar(&DocumentRef::new("zettel/Idea.md")).await?.iter().take(5) {
//!     println!("{:.3} [[{}]]", hit.similarity, hit.record.identity);
//! }
//! ```
//!
//! ## Key Concepts
//!
//! ### Digest
//!
//! Each note's filtered text is hashed. Records are keyed by both identity
//! (the note's link text) and digest, which lets the index recognise:
//! - **unchanged** notes (same identity, same digest): nothing to do
//! - **edited** notes (same identity, new digest): replace the record
//! - **renamed** notes (new identity, known digest): repoint the record
//! - **duplicates** (known digest under another identity): reuse it
//!
//! Only genuinely new content reaches the embedding provider.
//!
//! ### Note Groups
//!
//! A **note group** is a folder-scoped subset of notes. One group at a time
//! is the indexing scope.
//!
//! ### Persistence
//!
//! Everything round-trips through one settings blob held by a
//! [`storage::SettingsStore`]. Each index mutation is flushed on its own,
//! so an interrupted batch keeps what it finished.
//!
//! ## Features
//!
//! - `openai` - Enable the OpenAI embeddings client
//!
//! ## Thread Safety
//!
//! [`NoteIndex`] and [`VectorIndex`] are `Send + Sync` and can be shared
//! across tasks using `Arc`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod digest;
mod document;
mod engine;
mod error;
mod extract;
mod note_group;
mod types;

pub mod concurrency;
pub mod embedding;
pub mod indexer;
pub mod storage;

/// Vector index with brute-force cosine search.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main interface
pub use engine::NoteIndex;

// Configuration
pub use config::{
    Config, EmbeddingModel, ModelProvider, Preferences, DEFAULT_CONCURRENCY_LIMIT,
    MAX_CONCURRENCY_LIMIT,
};

// Error handling
pub use error::{NotFoundError, NoteVecError, Result, StorageError, ValidationError};

// Core types
pub use types::{Digest, Embedding, SearchResult, StoredVector};

// Content addressing and extraction
pub use digest::digest;
pub use extract::ContentFilter;

// Host documents and scoping
pub use document::{DocumentRef, DocumentStore, InMemoryDocuments, PreparedDocument};
pub use note_group::{default_note_groups, AllowPattern, NoteGroup};

// Indexing
pub use concurrency::{NoopObserver, ProgressEvent, ProgressObserver, RunSummary};
pub use embedding::EmbeddingProvider;
pub use indexer::{Indexer, IndexingRun};
pub use vector::VectorIndex;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common notevec usage.
///
/// ```rust
/// use notevec::prelude::*;
/// ```
pub mod prelude {
    pub use crate::concurrency::{NoopObserver, ProgressEvent, ProgressObserver};
    pub use crate::config::{Config, EmbeddingModel};
    pub use crate::document::{DocumentRef, DocumentStore};
    pub use crate::embedding::EmbeddingProvider;
    pub use crate::engine::NoteIndex;
    pub use crate::error::{NoteVecError, Result};
    pub use crate::types::{SearchResult, StoredVector};
}
