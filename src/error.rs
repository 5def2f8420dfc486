//! Error types for notevec.
//!
//! notevec uses a hierarchical error system:
//! - `NoteVecError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`, `NotFoundError`)
//!   provide detail
//!
//! # Failure Classes
//!
//! The indexing subsystem distinguishes four kinds of failure, each with its
//! own propagation policy:
//!
//! | Class         | Variant                         | Batch mode        | Single document |
//! |---------------|---------------------------------|-------------------|-----------------|
//! | Extraction    | [`NoteVecError::Extraction`]    | logged, skipped   | returned        |
//! | Provider      | [`NoteVecError::Embedding`]     | logged, skipped   | returned        |
//! | Consistency   | [`NoteVecError::Consistency`]   | returned          | returned        |
//! | Configuration | [`NoteVecError::Config`]        | returned up front | returned        |
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use notevec::{NoteIndex, Config, Result};
//!
//! async fn example(index: &NoteIndex, doc: &DocumentRef) -> Result<()> {
//!     let results = index.search_similar(doc).await?;
//!     // ... render results ...
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for notevec operations.
pub type Result<T> = std::result::Result<T, NoteVecError>;

/// Top-level error enum for all notevec operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum NoteVecError {
    /// Storage layer error (settings blob I/O, serialization, redb).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error (no provider, missing API key, bad limits).
    ///
    /// Raised before any network attempt.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Document text was empty after content filtering.
    #[error("Error extracting text for [[{identity}]]")]
    Extraction {
        /// Identity of the document that produced no text.
        identity: String,
    },

    /// Embedding provider call failed (auth, rate limit, network).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Index invariant violated by the caller.
    ///
    /// This signals a programming error, e.g. renaming a digest that was
    /// never stored. It is never swallowed.
    #[error("Index consistency error: {0}")]
    Consistency(String),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NoteVecError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an extraction error for the given document identity.
    pub fn extraction(identity: impl Into<String>) -> Self {
        Self::Extraction {
            identity: identity.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a consistency error with the given message.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is an extraction error.
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction { .. })
    }

    /// Returns true if this is an embedding provider error.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }

    /// Returns true if this is a consistency error.
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the settings blob or the store
/// backing it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Settings blob exists but cannot be understood.
    #[error("Settings corrupted: {0}")]
    Corrupted(String),

    /// Store is locked by another process.
    #[error("Settings store is locked by another writer")]
    Locked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a poisoned-lock error naming the lock.
    pub fn poisoned(what: impl Into<String>) -> Self {
        Self::Poisoned(what.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to NoteVecError for convenience
impl From<redb::Error> for NoteVecError {
    fn from(err: redb::Error) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for NoteVecError {
    fn from(err: redb::TransactionError) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for NoteVecError {
    fn from(err: redb::CommitError) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for NoteVecError {
    fn from(err: redb::TableError) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for NoteVecError {
    fn from(err: redb::StorageError) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for NoteVecError {
    fn from(err: serde_json::Error) -> Self {
        NoteVecError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the active model's dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from the embedding model.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// No stored vector for the given identity.
    #[error("Vector not found: {0}")]
    Vector(String),

    /// Note group index out of range.
    #[error("Note group not found: {0}")]
    NoteGroup(String),

    /// Host document store has no document at the given path.
    #[error("Document not found: {0}")]
    Document(String),
}

impl NotFoundError {
    /// Creates a vector not found error.
    pub fn vector(identity: impl ToString) -> Self {
        Self::Vector(identity.to_string())
    }

    /// Creates a note group not found error.
    pub fn note_group(id: impl ToString) -> Self {
        Self::NoteGroup(id.to_string())
    }

    /// Creates a document not found error.
    pub fn document(path: impl ToString) -> Self {
        Self::Document(path.to_string())
    }
}
