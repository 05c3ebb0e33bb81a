//! redb-backed key-value store.
//!
//! All data lives in one table named `/` with opaque byte keys and values.

use crate::error::StoreError;
use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadTransaction, ReadableTable, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::path::{Path, PathBuf};

/// The single flat keyspace
pub const BUCKET: TableDefinition<'static, &'static [u8], &'static [u8]> = TableDefinition::new("/");

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page cache size in bytes (redb default when unset)
    pub cache_size: Option<usize>,
}

/// Transactional key-value store
pub struct KvStore {
    db: Database,
    path: Option<PathBuf>,
}

impl KvStore {
    /// Open or create the database file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened (including when another
    /// process holds its lock) or the table cannot be created
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        let mut builder = Database::builder();
        if let Some(size) = config.cache_size {
            builder.set_cache_size(size);
        }
        let db = builder.create(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            db,
            path: Some(path.to_path_buf()),
        };
        store.ensure_bucket()?;
        Ok(store)
    }

    /// Create a store that lives only in memory
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be initialised
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        let store = Self { db, path: None };
        store.ensure_bucket()?;
        Ok(store)
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn ensure_bucket(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_read()?;
        match txn.open_table(BUCKET) {
            Ok(_) => return Ok(()),
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(err) => return Err(err.into()),
        }
        drop(txn);

        tracing::debug!(table = BUCKET.name(), "creating table");
        let txn = self.db.begin_write()?;
        txn.open_table(BUCKET)?;
        txn.commit()?;
        Ok(())
    }

    /// Read `key` in its own read transaction
    ///
    /// # Errors
    ///
    /// Returns error if the transaction or read fails
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BUCKET)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Write `key` in its own write transaction
    ///
    /// # Errors
    ///
    /// Returns error if the transaction, write, or commit fails
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let batch = self.begin_batch()?;
        batch.put(key, value)?;
        batch.commit()
    }

    /// Delete `key` in its own write transaction, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns error if the transaction, delete, or commit fails
    pub fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        let batch = self.begin_batch()?;
        let existed = batch.delete(key)?;
        batch.commit()?;
        Ok(existed)
    }

    /// Begin a write transaction.
    ///
    /// redb admits one writer at a time: this blocks while another
    /// [`WriteBatch`] is alive, including one held by the caller.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction cannot begin
    pub fn begin_batch(&self) -> Result<WriteBatch, StoreError> {
        Ok(WriteBatch {
            txn: self.db.begin_write()?,
        })
    }

    /// Open a cursor over a read snapshot
    ///
    /// # Errors
    ///
    /// Returns error if the transaction cannot begin
    pub fn open_cursor(&self) -> Result<ReadCursor, StoreError> {
        Ok(ReadCursor {
            txn: self.db.begin_read()?,
            last: None,
            exhausted: false,
        })
    }

    /// All keys in order
    ///
    /// # Errors
    ///
    /// Returns error if the scan fails
    pub fn keys(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BUCKET)?;
        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }
}

/// Open write transaction
pub struct WriteBatch {
    txn: WriteTransaction,
}

impl WriteBatch {
    /// Put inside the batch
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut table = self.txn.open_table(BUCKET)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Delete inside the batch, returning whether the key existed
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    pub fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut table = self.txn.open_table(BUCKET)?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }

    /// Read through the batch's uncommitted view
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.txn.open_table(BUCKET)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Commit
    ///
    /// # Errors
    ///
    /// Returns error if the commit fails
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit()?;
        Ok(())
    }

    /// Roll back
    ///
    /// # Errors
    ///
    /// Returns error if the rollback fails
    pub fn abort(self) -> Result<(), StoreError> {
        self.txn.abort()?;
        Ok(())
    }
}

/// Forward cursor over the snapshot of one read transaction
pub struct ReadCursor {
    txn: ReadTransaction,
    last: Option<Vec<u8>>,
    exhausted: bool,
}

impl ReadCursor {
    /// Advance one entry; `None` once past the last key
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        if self.exhausted {
            return Ok(None);
        }
        let entry = {
            let table = self.txn.open_table(BUCKET)?;
            let lower = match &self.last {
                Some(key) => Bound::Excluded(key.as_slice()),
                None => Bound::Unbounded,
            };
            let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (lower, Bound::Unbounded);
            let mut range = table.range::<&[u8]>(bounds)?;
            match range.next() {
                Some(item) => {
                    let (key, value) = item?;
                    Some((key.value().to_vec(), value.value().to_vec()))
                }
                None => None,
            }
        };
        match &entry {
            Some((key, _)) => self.last = Some(key.clone()),
            None => self.exhausted = true,
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_store_config_default() {
        assert_eq!(StoreConfig::default().cache_size, None);
    }

    #[test]
    fn test_put_get_delete() {
        let store = KvStore::in_memory().unwrap();
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        assert!(store.delete(b"a").unwrap());
        assert_eq!(store.get(b"a").unwrap(), None);
        assert!(!store.delete(b"a").unwrap());
    }

    #[test]
    fn test_empty_key_and_value() {
        let store = KvStore::in_memory().unwrap();
        store.put(b"", b"").unwrap();
        assert_eq!(store.get(b"").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_batch_isolation() {
        let store = KvStore::in_memory().unwrap();
        let batch = store.begin_batch().unwrap();
        batch.put(b"k", b"v").unwrap();

        assert_eq!(batch.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get(b"k").unwrap(), None);

        batch.commit().unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_batch_abort() {
        let store = KvStore::in_memory().unwrap();
        let batch = store.begin_batch().unwrap();
        batch.put(b"k", b"v").unwrap();
        batch.abort().unwrap();

        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_cursor_walks_in_key_order() {
        let store = KvStore::in_memory().unwrap();
        store.put(b"b", b"2").unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"c", b"3").unwrap();

        let mut cursor = store.open_cursor().unwrap();
        assert_eq!(cursor.next_entry().unwrap(), Some((b"a".to_vec(), b"1".to_vec())));
        assert_eq!(cursor.next_entry().unwrap(), Some((b"b".to_vec(), b"2".to_vec())));
        assert_eq!(cursor.next_entry().unwrap(), Some((b"c".to_vec(), b"3".to_vec())));
        assert_eq!(cursor.next_entry().unwrap(), None);
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_cursor_sees_its_snapshot() {
        let store = KvStore::in_memory().unwrap();
        store.put(b"a", b"1").unwrap();

        let mut cursor = store.open_cursor().unwrap();
        store.put(b"b", b"2").unwrap();

        assert!(cursor.next_entry().unwrap().is_some());
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let store = KvStore::open(&path, &StoreConfig::default()).unwrap();
            store.put(b"x", b"y").unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }
        let store = KvStore::open(&path, &StoreConfig { cache_size: Some(1 << 20) }).unwrap();
        assert_eq!(store.get(b"x").unwrap(), Some(b"y".to_vec()));
        assert_eq!(store.keys().unwrap(), vec![b"x".to_vec()]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_cursor_matches_ordered_model(
            writes in proptest::collection::vec(
                (proptest::collection::vec(any::<u8>(), 0..6), proptest::option::of(proptest::collection::vec(any::<u8>(), 0..6))),
                0..40,
            )
        ) {
            let store = KvStore::in_memory().unwrap();
            let mut model = BTreeMap::new();
            for (key, value) in &writes {
                match value {
                    Some(value) => {
                        store.put(key, value).unwrap();
                        model.insert(key.clone(), value.clone());
                    }
                    None => {
                        prop_assert_eq!(store.delete(key).unwrap(), model.remove(key).is_some());
                    }
                }
            }

            let mut cursor = store.open_cursor().unwrap();
            let mut walked = Vec::new();
            while let Some(entry) = cursor.next_entry().unwrap() {
                walked.push(entry);
            }
            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(walked, expected);
        }
    }
}
