//! Host document store seam.
//!
//! The host application owns the notes. The index only needs three things
//! from it: the list of notes, each note's text, and each note's identity
//! (its link text). [`DocumentStore`] is that contract.
//!
//! [`InMemoryDocuments`] is a complete implementation over a map, used by
//! hosts that already hold note text in memory and by tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::digest::digest;
use crate::error::{NotFoundError, Result, StorageError};
use crate::types::Digest;

/// Reference to a note in the host's store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    /// Location of the note, e.g. `"zettel/Idea.md"`.
    pub path: String,
}

impl DocumentRef {
    /// Creates a reference to the note at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Capabilities the index consumes from the host.
///
/// # Implementing for a Host
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use notevec::{DocumentRef, DocumentStore, Result};
///
/// struct Vault { root: PathBuf }
///
/// #[async_trait]
/// impl DocumentStore for Vault {
///     fn list_documents(&self) -> Result<Vec<DocumentRef>> { /* walk root */ }
///     async fn read_text(&self, doc: &DocumentRef) -> Result<String> {
///         Ok(tokio::fs::read_to_string(self.root.join(&doc.path)).await?)
///     }
///     fn identity(&self, doc: &DocumentRef) -> String { link_text(&doc.path) }
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists every note the host knows about.
    ///
    /// Scoping (note groups, allow patterns) is applied by the caller.
    fn list_documents(&self) -> Result<Vec<DocumentRef>>;

    /// Reads the raw text of a note.
    async fn read_text(&self, doc: &DocumentRef) -> Result<String>;

    /// Derives the stable identity (link text) of a note.
    fn identity(&self, doc: &DocumentRef) -> String;
}

/// A note read from the host and reduced to its indexed content.
///
/// Construction computes the digest, so a `PreparedDocument` always carries
/// the hash of exactly the text it holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedDocument {
    identity: String,
    path: String,
    text: String,
    digest: Digest,
}

impl PreparedDocument {
    /// Creates a prepared document from already-filtered text.
    pub fn new(identity: impl Into<String>, path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let digest = digest(&text);
        Self {
            identity: identity.into(),
            path: path.into(),
            text,
            digest,
        }
    }

    /// Link text of the note.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Location of the note.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Filtered text that gets embedded.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Digest of [`text`](Self::text).
    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// Map-backed [`DocumentStore`].
///
/// Identity is the path without a trailing `.md`, mirroring how link text
/// is formed for notes addressed by full path.
#[derive(Debug, Default)]
pub struct InMemoryDocuments {
    docs: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDocuments {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given `(path, text)` pairs.
    pub fn with_documents<P, T>(docs: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<String>,
        T: Into<String>,
    {
        let docs = docs
            .into_iter()
            .map(|(path, text)| (path.into(), text.into()))
            .collect();
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Creates or replaces the note at `path`.
    pub fn write(&self, path: impl Into<String>, text: impl Into<String>) -> Result<()> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::poisoned("document map"))?;
        docs.insert(path.into(), text.into());
        Ok(())
    }

    /// Moves a note to a new path, keeping its text.
    pub fn rename(&self, from: &str, to: impl Into<String>) -> Result<()> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::poisoned("document map"))?;
        let text = docs.remove(from).ok_or_else(|| NotFoundError::document(from))?;
        docs.insert(to.into(), text);
        Ok(())
    }

    /// Deletes a note. Returns true if it existed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::poisoned("document map"))?;
        Ok(docs.remove(path).is_some())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocuments {
    fn list_documents(&self) -> Result<Vec<DocumentRef>> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::poisoned("document map"))?;
        Ok(docs.keys().map(DocumentRef::new).collect())
    }

    async fn read_text(&self, doc: &DocumentRef) -> Result<String> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::poisoned("document map"))?;
        docs.get(&doc.path)
            .cloned()
            .ok_or_else(|| NotFoundError::document(&doc.path).into())
    }

    fn identity(&self, doc: &DocumentRef) -> String {
        doc.path
            .strip_suffix(".md")
            .unwrap_or(&doc.path)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_document_digest_matches_text() {
        let doc = PreparedDocument::new("A", "A.md", "hello world");
        assert_eq!(doc.digest(), &digest("hello world"));
        assert_eq!(doc.identity(), "A");
        assert_eq!(doc.path(), "A.md");
    }

    #[tokio::test]
    async fn test_in_memory_read_and_list() {
        let store = InMemoryDocuments::with_documents([("b.md", "B"), ("a.md", "A")]);
        let listed = store.list_documents().unwrap();
        assert_eq!(listed, vec![DocumentRef::new("a.md"), DocumentRef::new("b.md")]);
        assert_eq!(store.read_text(&DocumentRef::new("b.md")).await.unwrap(), "B");
    }

    #[tokio::test]
    async fn test_in_memory_missing_document() {
        let store = InMemoryDocuments::new();
        let err = store
            .read_text(&DocumentRef::new("nope.md"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_in_memory_rename_keeps_text() {
        let store = InMemoryDocuments::with_documents([("old.md", "text")]);
        store.rename("old.md", "new.md").unwrap();
        assert!(store.read_text(&DocumentRef::new("old.md")).await.is_err());
        assert_eq!(
            store.read_text(&DocumentRef::new("new.md")).await.unwrap(),
            "text"
        );
    }

    #[test]
    fn test_identity_strips_markdown_extension() {
        let store = InMemoryDocuments::new();
        assert_eq!(store.identity(&DocumentRef::new("zettel/Idea.md")), "zettel/Idea");
        assert_eq!(store.identity(&DocumentRef::new("data.csv")), "data.csv");
    }
}
