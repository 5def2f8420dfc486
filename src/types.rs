//! Core type definitions for notevec records and search results.
//!
//! A [`StoredVector`] is the one record kept per indexed note. Its wire
//! names (`linktext`, `sha`) match the settings blob written by earlier
//! versions of the host, so existing blobs load without conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dense embedding vector.
///
/// Length is fixed per embedding model (see
/// [`EmbeddingModel::dimension`](crate::EmbeddingModel::dimension)).
pub type Embedding = Vec<f32>;

/// Content hash of normalized note text.
///
/// Base64-encoded SHA-256. Two notes with identical filtered text share a
/// digest, which is what makes deduplication and rename detection work.
///
/// # Example
/// ```
/// use notevec::digest;
///
/// let a = digest("hello world");
/// let b = digest("hello world");
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wraps an already-encoded digest string.
    ///
    /// No validation is done; use [`digest()`](crate::digest) to hash text.
    #[inline]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded digest.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One indexed note.
///
/// # Fields
///
/// - `identity`: link-style name of the note; unique among records, updated on rename
/// - `path`: current location in the host's document store
/// - `embedding`: vector produced by the active model; never changes for a digest
/// - `digest`: content hash; unique among records, fixed for the record's lifetime
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredVector {
    /// Stable human-meaningful key (link text).
    #[serde(rename = "linktext")]
    pub identity: String,

    /// Current location of the note.
    pub path: String,

    /// Embedding of the note's filtered text.
    pub embedding: Embedding,

    /// Content hash of the note's filtered text.
    #[serde(rename = "sha")]
    pub digest: Digest,
}

impl StoredVector {
    /// Creates a new record.
    pub fn new(
        identity: impl Into<String>,
        path: impl Into<String>,
        embedding: Embedding,
        digest: Digest,
    ) -> Self {
        Self {
            identity: identity.into(),
            path: path.into(),
            embedding,
            digest,
        }
    }
}

/// A ranked search hit.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    /// The matching record.
    pub record: StoredVector,

    /// Cosine similarity to the query, in `[-1.0, 1.0]`.
    pub similarity: f32,
}
