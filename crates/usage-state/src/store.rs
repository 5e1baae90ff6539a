//! UsageStore — redb-backed handle on the usage ledger.
//!
//! The store owns one redb `Database` with the `"usage"` table created on
//! open. Readers take snapshots through [`UsageSource`]; each snapshot is a
//! redb read transaction, so it never observes a concurrent write halfway.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable,
    ReadableTableMetadata,
};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::record::UsageRecord;
use crate::source::{RawRecord, UsageSnapshot, UsageSource};
use crate::tables::USAGE;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe handle on the usage ledger.
#[derive(Clone)]
pub struct UsageStore {
    db: Arc<Database>,
}

impl UsageStore {
    /// Open (or create) the ledger at the given path.
    ///
    /// The parent directory must already exist.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "usage store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory ledger (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory usage store opened");
        Ok(store)
    }

    /// Create the usage table if it doesn't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(USAGE).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Seeding (tooling and tests) ────────────────────────────────

    /// Insert or replace a raw entry, bypassing the value layout check.
    pub fn put_raw(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(USAGE).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace a well-formed usage record.
    pub fn put_usage(&self, key: &str, record: UsageRecord) -> StateResult<()> {
        self.put_raw(key.as_bytes(), &record.encode())
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Get the decoded record for a key, if present.
    pub fn get_usage(&self, key: &str) -> StateResult<Option<UsageRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(USAGE).map_err(map_err!(Table))?;
        match table.get(key.as_bytes()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(UsageRecord::decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Number of entries in the usage table, malformed ones included.
    pub fn len(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(USAGE).map_err(map_err!(Table))?;
        table.len().map_err(map_err!(Read))
    }

    pub fn is_empty(&self) -> StateResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl UsageSource for UsageStore {
    fn snapshot(&self) -> StateResult<Box<dyn UsageSnapshot + '_>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(USAGE).map_err(map_err!(Table))?;
        Ok(Box::new(RedbSnapshot { table, _txn: txn }))
    }
}

/// A redb read transaction pinned to the usage table.
struct RedbSnapshot {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
    _txn: ReadTransaction,
}

impl UsageSnapshot for RedbSnapshot {
    fn records(&self) -> StateResult<Box<dyn Iterator<Item = StateResult<RawRecord>> + '_>> {
        let range = self.table.iter().map_err(map_err!(Read))?;
        Ok(Box::new(range.map(|entry| {
            let (key, value) = entry.map_err(map_err!(Read))?;
            Ok(RawRecord {
                key: key.value().to_vec(),
                value: value.value().to_vec(),
            })
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(store: &UsageStore) -> Vec<RawRecord> {
        let snapshot = store.snapshot().unwrap();
        snapshot
            .records()
            .unwrap()
            .collect::<StateResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn open_in_memory_creates_empty_table() {
        let store = UsageStore::open_in_memory().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(collect(&store).is_empty());
    }

    #[test]
    fn put_and_get_usage() {
        let store = UsageStore::open_in_memory().unwrap();
        store.put_usage("user:alice", UsageRecord::new(1000, 5)).unwrap();

        assert_eq!(
            store.get_usage("user:alice").unwrap(),
            Some(UsageRecord::new(1000, 5))
        );
        assert!(store.get_usage("user:bob").unwrap().is_none());
    }

    #[test]
    fn get_malformed_value_errors() {
        let store = UsageStore::open_in_memory().unwrap();
        store.put_raw(b"bkt1", &[1, 2, 3]).unwrap();

        assert!(matches!(
            store.get_usage("bkt1"),
            Err(StateError::MalformedRecord { found: 3, .. })
        ));
    }

    #[test]
    fn snapshot_iterates_in_key_order() {
        let store = UsageStore::open_in_memory().unwrap();
        store.put_usage("user:zed", UsageRecord::new(3, 3)).unwrap();
        store.put_usage("bkt1", UsageRecord::new(1, 1)).unwrap();
        store.put_usage("user:alice", UsageRecord::new(2, 2)).unwrap();

        let keys: Vec<Vec<u8>> = collect(&store).into_iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![
                b"bkt1".to_vec(),
                b"user:alice".to_vec(),
                b"user:zed".to_vec()
            ]
        );
    }

    #[test]
    fn snapshot_includes_malformed_entries() {
        let store = UsageStore::open_in_memory().unwrap();
        store.put_raw(b"bkt-short", &[0u8; 4]).unwrap();
        store.put_usage("bkt-ok", UsageRecord::new(9, 1)).unwrap();

        let records = collect(&store);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, b"bkt-ok");
        assert_eq!(records[1].value.len(), 4);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = UsageStore::open_in_memory().unwrap();
        store.put_usage("user:alice", UsageRecord::new(1000, 5)).unwrap();

        let snapshot = store.snapshot().unwrap();
        store.put_usage("user:alice", UsageRecord::new(1500, 6)).unwrap();
        store.put_usage("user:bob", UsageRecord::new(1, 1)).unwrap();

        let seen: Vec<RawRecord> = snapshot
            .records()
            .unwrap()
            .collect::<StateResult<Vec<_>>>()
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            UsageRecord::decode(&seen[0].value).unwrap(),
            UsageRecord::new(1000, 5)
        );
        drop(snapshot);

        assert_eq!(collect(&store).len(), 2);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("usage.redb");

        {
            let store = UsageStore::open(&db_path).unwrap();
            store.put_usage("bkt1", UsageRecord::new(2000, 10)).unwrap();
        }

        let store = UsageStore::open(&db_path).unwrap();
        assert_eq!(
            store.get_usage("bkt1").unwrap(),
            Some(UsageRecord::new(2000, 10))
        );
    }

    #[test]
    fn open_fails_when_parent_missing() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing").join("usage.redb");

        let err = UsageStore::open(&db_path).err().unwrap();
        assert!(matches!(err, StateError::Open(_)));
        assert!(!db_path.exists());
    }
}
