use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rocksdb::{
    ErrorKind, Options, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};

use crate::contracts::{DateKey, DaySequence, DaySequenceStore, StorageError, StoreInfo};

/// Key prefix for per-day counters
const DAY_PREFIX: &str = "day";
/// How long an increment waits on another holder of the same row lock
const LOCK_TIMEOUT_MS: i64 = 1_000;

/// Embedded durable sequence store on a RocksDB `TransactionDB`.
///
/// Each increment is a pessimistic transaction: the day row is locked with
/// `get_for_update`, bumped, and committed with a synced WAL write. Concurrent
/// callers for the same day queue on the row lock. RocksDB holds an exclusive
/// lock on its directory, so only one process can use a given data dir.
pub struct RocksDbSequenceStore {
    db: Arc<TransactionDB>,
    path: PathBuf,
}

impl RocksDbSequenceStore {
    /// Opens or creates a sequence store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        // One small row per day; keep the footprint tiny.
        opts.set_write_buffer_size(4 * 1024 * 1024);
        opts.set_max_write_buffer_number(2);
        opts.set_wal_dir(path.join("wal"));

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);

        let db = TransactionDB::open(&opts, &txn_db_opts, path).map_err(map_rocksdb_err)?;

        tracing::debug!(path = %path.display(), "Opened RocksDB sequence store");

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Creates a day key.
    fn day_key(date: DateKey) -> String {
        format!("{}:{}", DAY_PREFIX, date)
    }

    fn encode(row: &DaySequence) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(row).map_err(|e| StorageError::Io(e.to_string()))
    }

    fn decode(date: DateKey, bytes: &[u8]) -> Result<DaySequence, StorageError> {
        let row: DaySequence = bincode::deserialize(bytes).map_err(|e| StorageError::Corrupt {
            date,
            detail: format!("undecodable row: {}", e),
        })?;
        if row.date != date {
            return Err(StorageError::Corrupt {
                date,
                detail: format!("row stored under {} claims date {}", date, row.date),
            });
        }
        Ok(row)
    }

    /// Read-increment-or-insert inside one transaction.
    fn increment_blocking(db: &TransactionDB, date: DateKey) -> Result<DaySequence, StorageError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        let txn = db.transaction_opt(&write_opts, &TransactionOptions::default());

        let key = Self::day_key(date);
        let counter = match txn
            .get_for_update(key.as_bytes(), true)
            .map_err(map_rocksdb_err)?
        {
            Some(bytes) => Self::decode(date, &bytes)?.counter,
            None => 0,
        };

        let next = counter.checked_add(1).ok_or_else(|| StorageError::Corrupt {
            date,
            detail: "counter overflow".into(),
        })?;

        let row = DaySequence {
            date,
            counter: next,
            updated_at: Some(Utc::now()),
        };
        txn.put(key.as_bytes(), Self::encode(&row)?)
            .map_err(map_rocksdb_err)?;
        txn.commit().map_err(map_rocksdb_err)?;

        Ok(row)
    }

    fn get_blocking(db: &TransactionDB, date: DateKey) -> Result<Option<DaySequence>, StorageError> {
        match db.get(Self::day_key(date).as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::decode(date, &bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(map_rocksdb_err(e)),
        }
    }

    /// Runs a blocking RocksDB call off the async runtime.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&TransactionDB) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StorageError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

impl DaySequenceStore for RocksDbSequenceStore {
    async fn increment(&self, date: DateKey) -> Result<DaySequence, StorageError> {
        self.run_blocking(move |db| Self::increment_blocking(db, date))
            .await
    }

    async fn get(&self, date: DateKey) -> Result<Option<DaySequence>, StorageError> {
        self.run_blocking(move |db| Self::get_blocking(db, date)).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.run_blocking(|db| {
            db.get(b"ping").map(|_| ()).map_err(map_rocksdb_err)
        })
        .await
    }

    fn store_info(&self) -> StoreInfo {
        StoreInfo {
            storage_type: "rocksdb".into(),
            location: self.path.display().to_string(),
        }
    }
}

/// Classifies RocksDB errors. Lock waits and busy transactions roll back, so
/// they are conflicts; everything else leaves the store in doubt.
fn map_rocksdb_err(e: rocksdb::Error) -> StorageError {
    match e.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain | ErrorKind::Expired => {
            StorageError::Conflict(e.to_string())
        }
        ErrorKind::IOError => StorageError::Io(e.to_string()),
        _ => StorageError::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksDbSequenceStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksDbSequenceStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn first_increment_inserts_one() {
        let (store, _dir) = create_test_store();
        let d = date("20251031");

        assert_eq!(store.get(d).await.unwrap(), None);

        let row = store.increment(d).await.unwrap();
        assert_eq!(row.date, d);
        assert_eq!(row.counter, 1);
        assert!(row.updated_at.is_some());
    }

    #[tokio::test]
    async fn increments_are_sequential() {
        let (store, _dir) = create_test_store();
        let d = date("20251031");

        for expected in 1..=20 {
            assert_eq!(store.increment(d).await.unwrap().counter, expected);
        }
        assert_eq!(store.get(d).await.unwrap().unwrap().counter, 20);
    }

    #[tokio::test]
    async fn days_are_isolated() {
        let (store, _dir) = create_test_store();
        let d1 = date("20251031");
        let d2 = date("20251101");

        store.increment(d1).await.unwrap();
        store.increment(d1).await.unwrap();
        assert_eq!(store.increment(d2).await.unwrap().counter, 1);
        assert_eq!(store.get(d1).await.unwrap().unwrap().counter, 2);
    }

    #[tokio::test]
    async fn undecodable_row_is_reported_as_corrupt() {
        let (store, _dir) = create_test_store();
        let d = date("20251031");
        store
            .db
            .put(RocksDbSequenceStore::day_key(d).as_bytes(), b"\xff\x01")
            .unwrap();

        let err = store.increment(d).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { date, .. } if date == d));

        // The failed transaction must not have rewritten the row.
        let raw = store
            .db
            .get(RocksDbSequenceStore::day_key(d).as_bytes())
            .unwrap();
        assert_eq!(raw.as_deref(), Some(&b"\xff\x01"[..]));
    }

    #[tokio::test]
    async fn row_under_wrong_key_is_corrupt() {
        let (store, _dir) = create_test_store();
        let d = date("20251031");
        let other = DaySequence {
            date: date("20240101"),
            counter: 9,
            updated_at: None,
        };
        store
            .db
            .put(
                RocksDbSequenceStore::day_key(d).as_bytes(),
                RocksDbSequenceStore::encode(&other).unwrap(),
            )
            .unwrap();

        assert!(matches!(
            store.get(d).await.unwrap_err(),
            StorageError::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_store() {
        let (store, _dir) = create_test_store();
        store.ping().await.unwrap();
        assert_eq!(store.store_info().storage_type, "rocksdb");
    }

    #[test]
    fn second_open_of_same_dir_fails() {
        let (_store, dir) = create_test_store();
        assert!(RocksDbSequenceStore::open(dir.path()).is_err());
    }
}
