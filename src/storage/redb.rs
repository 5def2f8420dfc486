//! redb-backed settings store.
//!
//! Keeps the settings blob in a single-table [redb](https://docs.rs/redb)
//! file, so every save is an ACID transaction and a crash mid-write leaves
//! the previous blob intact.
//!
//! # File Layout
//!
//! When you open a store at `./notevec.redb`, redb creates:
//! - `./notevec.redb` - Main database file
//! - `./notevec.redb.lock` - Lock file for writer coordination (may not be visible)

use std::path::{Path, PathBuf};

use ::redb::Database;
use tracing::{debug, info, instrument};

use super::schema::{SETTINGS_KEY, SETTINGS_TABLE};
use super::SettingsStore;
use crate::error::{Result, StorageError};

/// File-backed [`SettingsStore`].
///
/// # Thread Safety
///
/// `RedbStore` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is locked by another process
    /// - The file is not a redb database
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use notevec::storage::RedbStore;
    ///
    /// let store = RedbStore::open("./notevec.redb")?;
    /// ```
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(exists = path.exists(), "Opening settings store");

        let db = Self::create_database(path)?;

        // Create the table up front so reads on a fresh file don't fail
        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!("Settings store opened");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    fn create_database(path: &Path) -> Result<Database> {
        // Note: redb doesn't expose a typed error variant for lock conflicts,
        // so we detect them via error message string matching.
        let db = Database::builder().create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::Locked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;
        Ok(db)
    }
}

impl SettingsStore for RedbStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;

        let blob = table.get(SETTINGS_KEY)?.map(|value| value.value().to_vec());
        Ok(blob)
    }

    fn save(&self, blob: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.insert(SETTINGS_KEY, blob)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(bytes = blob.len(), "Settings blob saved");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
