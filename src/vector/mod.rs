//! The vector index.
//!
//! [`VectorIndex`] is the authoritative in-memory map of note identity to
//! [`StoredVector`], with a secondary index by digest. Every mutation hands
//! the full record list to an [`IndexSink`] before returning, so indexing
//! progress is durable per record.
//!
//! # Invariants
//!
//! - Identities are unique among records.
//! - Digests are unique among records.
//! - A record's digest and embedding never change; edits replace the record.
//!
//! Search is brute force: cosine similarity against every record, sorted
//! descending. Corpora are a few thousand notes, so a linear scan is cheaper
//! than maintaining an ANN structure.

mod similarity;

pub use similarity::cosine_similarity;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

use crate::config::EmbeddingModel;
use crate::document::PreparedDocument;
use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::{NoteVecError, NotFoundError, Result, StorageError};
use crate::storage::{IndexSink, NullSink};
use crate::types::{Digest, SearchResult, StoredVector};

/// Search input: an embedding plus an optional digest to exclude.
///
/// Built from a stored record (excludes the record itself) or from a bare
/// embedding (excludes nothing).
#[derive(Clone, Copy, Debug)]
pub struct Query<'a> {
    embedding: &'a [f32],
    exclude: Option<&'a Digest>,
}

impl<'a> Query<'a> {
    /// Creates a query that excludes nothing.
    pub fn new(embedding: &'a [f32]) -> Self {
        Self {
            embedding,
            exclude: None,
        }
    }

    /// Excludes the record with `digest` from the results.
    pub fn excluding(mut self, digest: &'a Digest) -> Self {
        self.exclude = Some(digest);
        self
    }
}

impl<'a> From<&'a StoredVector> for Query<'a> {
    fn from(record: &'a StoredVector) -> Self {
        Query::new(&record.embedding).excluding(&record.digest)
    }
}

impl<'a> From<&'a [f32]> for Query<'a> {
    fn from(embedding: &'a [f32]) -> Self {
        Query::new(embedding)
    }
}

impl<'a> From<&'a Vec<f32>> for Query<'a> {
    fn from(embedding: &'a Vec<f32>) -> Self {
        Query::new(embedding)
    }
}

/// Record list plus lookup tables. Positions in the maps index `records`.
#[derive(Debug, Default)]
struct IndexState {
    records: Vec<StoredVector>,
    by_identity: HashMap<String, usize>,
    by_digest: HashMap<Digest, usize>,
}

impl IndexState {
    /// Mirrors a persisted list. Later entries win over earlier ones that
    /// share an identity or a digest; returns how many were dropped.
    fn from_records(vectors: Vec<StoredVector>) -> (Self, usize) {
        let total = vectors.len();
        let mut state = Self::default();
        for record in vectors {
            state.remove_identity(&record.identity);
            state.remove_digest(&record.digest);
            state.push(record);
        }
        let dropped = total - state.records.len();
        (state, dropped)
    }

    fn get(&self, identity: &str) -> Option<&StoredVector> {
        self.by_identity.get(identity).map(|&pos| &self.records[pos])
    }

    fn get_by_digest(&self, digest: &Digest) -> Option<&StoredVector> {
        self.by_digest.get(digest).map(|&pos| &self.records[pos])
    }

    fn push(&mut self, record: StoredVector) {
        let pos = self.records.len();
        self.by_identity.insert(record.identity.clone(), pos);
        self.by_digest.insert(record.digest.clone(), pos);
        self.records.push(record);
    }

    /// Inserts or overwrites by identity, keeping the slot's position.
    ///
    /// The caller guarantees `record.digest` is not held by another identity.
    fn put(&mut self, record: StoredVector) {
        match self.by_identity.get(&record.identity).copied() {
            Some(pos) => {
                self.by_digest.remove(&self.records[pos].digest);
                self.by_digest.insert(record.digest.clone(), pos);
                self.records[pos] = record;
            }
            None => self.push(record),
        }
    }

    fn remove_at(&mut self, pos: usize) -> StoredVector {
        let record = self.records.remove(pos);
        self.reindex();
        record
    }

    fn remove_identity(&mut self, identity: &str) -> Option<StoredVector> {
        let pos = self.by_identity.get(identity).copied()?;
        Some(self.remove_at(pos))
    }

    fn remove_digest(&mut self, digest: &Digest) -> Option<StoredVector> {
        let pos = self.by_digest.get(digest).copied()?;
        Some(self.remove_at(pos))
    }

    /// Repoints the record holding `digest` at a new identity.
    fn rename(
        &mut self,
        digest: &Digest,
        identity: &str,
        path: Option<&str>,
    ) -> Result<StoredVector> {
        let pos = self.by_digest.get(digest).copied().ok_or_else(|| {
            NoteVecError::consistency(format!("no record with digest {} to rename", digest))
        })?;

        if let Some(&holder) = self.by_identity.get(identity) {
            if holder != pos {
                return Err(NoteVecError::consistency(format!(
                    "cannot rename to [[{}]]: identity already holds another record",
                    identity
                )));
            }
        }

        let old_identity = std::mem::replace(&mut self.records[pos].identity, identity.to_string());
        self.by_identity.remove(&old_identity);
        self.by_identity.insert(identity.to_string(), pos);
        if let Some(path) = path {
            self.records[pos].path = path.to_string();
        }
        Ok(self.records[pos].clone())
    }

    fn clear(&mut self) {
        self.records.clear();
        self.by_identity.clear();
        self.by_digest.clear();
    }

    fn reindex(&mut self) {
        self.by_identity.clear();
        self.by_digest.clear();
        for (pos, record) in self.records.iter().enumerate() {
            self.by_identity.insert(record.identity.clone(), pos);
            self.by_digest.insert(record.digest.clone(), pos);
        }
    }
}

/// In-memory vector index with write-through persistence.
///
/// All mutating methods take `&self`; state sits behind a `RwLock`.
/// Persistence happens while the write lock is held, so flushes never
/// interleave and the sink always sees a consistent list.
///
/// # Thread Safety
///
/// `VectorIndex` is `Send + Sync` and is shared as `Arc<VectorIndex>`.
/// [`upsert`](Self::upsert) releases the lock across its embedding call.
pub struct VectorIndex {
    state: RwLock<IndexState>,
    sink: Arc<dyn IndexSink>,
    model: EmbeddingModel,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model", &self.model)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Builds an index from a persisted record list.
    ///
    /// Duplicate identities or digests in `vectors` are resolved in favour
    /// of the later entry. Nothing is written back until the first mutation.
    #[instrument(skip(vectors, sink), fields(count = vectors.len()))]
    pub fn load(model: EmbeddingModel, vectors: Vec<StoredVector>, sink: Arc<dyn IndexSink>) -> Self {
        let (state, dropped) = IndexState::from_records(vectors);
        if dropped > 0 {
            warn!(dropped, "Dropped duplicate records while loading index");
        }
        debug!(records = state.records.len(), "Vector index loaded");

        Self {
            state: RwLock::new(state),
            sink,
            model,
        }
    }

    /// Creates an empty index that persists nowhere.
    pub fn in_memory(model: EmbeddingModel) -> Self {
        Self::load(model, Vec::new(), Arc::new(NullSink))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|_| StorageError::poisoned("vector index").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|_| StorageError::poisoned("vector index").into())
    }

    fn flush(&self, state: &IndexState) -> Result<()> {
        self.sink.persist_index(self.model, &state.records)?;
        debug!(records = state.records.len(), "Index flushed");
        Ok(())
    }

    /// Returns the model every stored embedding was produced with.
    #[inline]
    pub fn model(&self) -> EmbeddingModel {
        self.model
    }

    /// Returns the number of records.
    pub fn count(&self) -> usize {
        self.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns true if a record with `digest` exists.
    pub fn has(&self, digest: &Digest) -> bool {
        self.state
            .read()
            .map(|s| s.by_digest.contains_key(digest))
            .unwrap_or(false)
    }

    /// Returns the record for `identity`, if any.
    pub fn get(&self, identity: &str) -> Option<StoredVector> {
        self.state.read().ok()?.get(identity).cloned()
    }

    /// Returns a snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<StoredVector> {
        self.state
            .read()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// Returns true if `doc` has no up-to-date record under its identity.
    pub fn needs_indexing(&self, doc: &PreparedDocument) -> bool {
        self.get(doc.identity())
            .map_or(true, |record| record.digest != *doc.digest())
    }

    /// Inserts or overwrites the record for `record.identity`, then flushes.
    ///
    /// Saving an identical record again changes nothing but still flushes.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the digest already belongs to a
    /// different identity, and any error from the sink.
    pub fn save(&self, record: StoredVector) -> Result<()> {
        let mut state = self.write()?;

        if let Some(owner) = state.get_by_digest(&record.digest) {
            if owner.identity != record.identity {
                return Err(NoteVecError::consistency(format!(
                    "digest {} is already stored for [[{}]]",
                    record.digest, owner.identity
                )));
            }
        }

        debug!(identity = %record.identity, digest = %record.digest, "Saving record");
        state.put(record);
        self.flush(&state)
    }

    /// Removes the record with `digest`, then flushes.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if no record has that digest. Callers
    /// check [`has`](Self::has) first.
    pub fn delete_by_digest(&self, digest: &Digest) -> Result<StoredVector> {
        let mut state = self.write()?;
        let removed = state.remove_digest(digest).ok_or_else(|| {
            NoteVecError::consistency(format!("no record with digest {} to delete", digest))
        })?;
        debug!(identity = %removed.identity, %digest, "Record deleted");
        self.flush(&state)?;
        Ok(removed)
    }

    /// Points the record with `digest` at `new_identity`, then flushes.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if no record has that digest or if
    /// `new_identity` already holds a different record.
    pub fn rename_identity(&self, digest: &Digest, new_identity: &str) -> Result<StoredVector> {
        let mut state = self.write()?;
        let renamed = state.rename(digest, new_identity, None)?;
        self.flush(&state)?;
        Ok(renamed)
    }

    /// Drops every record, then flushes.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.write()?;
        let dropped = state.records.len();
        state.clear();
        self.flush(&state)?;
        info!(dropped, "Vector index cleared");
        Ok(())
    }

    /// Ranks every record by cosine similarity to the query.
    ///
    /// The record sharing the query's digest, if any, is left out. Results
    /// are sorted by similarity, highest first; equal scores keep insertion
    /// order. Records whose length differs from the query's are skipped.
    /// A zero-magnitude vector on either side scores 0.
    ///
    /// The full ranking is returned; callers take as many as they need.
    pub fn search<'q>(&self, query: impl Into<Query<'q>>) -> Result<Vec<SearchResult>> {
        let query = query.into();
        let state = self.read()?;

        let mut results = Vec::with_capacity(state.records.len());
        for record in &state.records {
            if query.exclude == Some(&record.digest) {
                continue;
            }

            if record.embedding.len() != query.embedding.len() {
                warn!(
                    identity = %record.identity,
                    expected = query.embedding.len(),
                    got = record.embedding.len(),
                    "Skipping record with mismatched dimension"
                );
                continue;
            }

            let similarity = match cosine_similarity(query.embedding, &record.embedding) {
                Some(similarity) => similarity,
                None => {
                    warn!(identity = %record.identity, "Zero-magnitude or non-finite vector in similarity");
                    0.0
                }
            };

            results.push(SearchResult {
                record: record.clone(),
                similarity,
            });
        }

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(results)
    }

    /// Returns the `n` records most similar to the one stored for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Vector`] if `identity` has no record.
    pub fn find_top_matches(&self, identity: &str, n: usize) -> Result<Vec<SearchResult>> {
        let record = self
            .get(identity)
            .ok_or_else(|| NotFoundError::vector(identity))?;
        let mut results = self.search(&record)?;
        results.truncate(n);
        Ok(results)
    }

    /// Makes sure `doc` is represented by an up-to-date record.
    ///
    /// In order:
    /// 1. Same identity, same digest: returns the stored record.
    /// 2. Same identity, new digest: the note was edited; the old record is
    ///    deleted and the note is treated as new.
    /// 3. Unknown identity, known digest: the note was renamed; the stored
    ///    record is repointed at the new identity and path.
    /// 4. Otherwise the text is embedded and a new record saved.
    ///
    /// Only step 4 calls the provider. If, after an edit, the new text is
    /// already stored under another identity, that record is returned and
    /// nothing is embedded.
    ///
    /// The lock is released while waiting on the provider. If another task
    /// stored the same content in the meantime, its record is kept and
    /// returned.
    ///
    /// # Errors
    ///
    /// Provider and validation errors from the embedding call, and sink
    /// errors from any flush.
    #[instrument(skip(self, doc, provider), fields(identity = doc.identity()))]
    pub async fn upsert(
        &self,
        doc: &PreparedDocument,
        provider: &dyn EmbeddingProvider,
    ) -> Result<StoredVector> {
        {
            let mut state = self.write()?;

            let stored_digest = state.get(doc.identity()).map(|r| r.digest.clone());
            match stored_digest {
                Some(digest) if digest == *doc.digest() => {
                    if let Some(record) = state.get(doc.identity()) {
                        return Ok(record.clone());
                    }
                }
                Some(old_digest) => {
                    state.remove_digest(&old_digest);
                    self.flush(&state)?;
                    debug!(old = %old_digest, new = %doc.digest(), "Content changed; old record removed");
                }
                None => {
                    if state.by_digest.contains_key(doc.digest()) {
                        let renamed = state.rename(doc.digest(), doc.identity(), Some(doc.path()))?;
                        self.flush(&state)?;
                        info!(digest = %doc.digest(), "Renamed record to match moved note");
                        return Ok(renamed);
                    }
                }
            }

            if let Some(owner) = state.get_by_digest(doc.digest()) {
                debug!(owner = %owner.identity, "Content already indexed under another identity");
                return Ok(owner.clone());
            }
        }

        let embedding = embed_one(provider, doc.text()).await?;
        let record = StoredVector::new(
            doc.identity(),
            doc.path(),
            embedding,
            doc.digest().clone(),
        );

        let mut state = self.write()?;
        if let Some(owner) = state.get_by_digest(&record.digest) {
            debug!(owner = %owner.identity, "Same content stored while embedding; keeping existing record");
            return Ok(owner.clone());
        }
        state.put(record.clone());
        self.flush(&state)?;
        debug!(digest = %record.digest, "Record stored");
        Ok(record)
    }
}
