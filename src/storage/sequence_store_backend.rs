//! Unified sequence store supporting both Postgres and RocksDB.

use crate::contracts::{DateKey, DaySequence, DaySequenceStore, StorageError, StoreInfo};
use crate::storage::{PostgresSequenceStore, RocksDbSequenceStore};

/// Durable store selected at startup.
pub enum SequenceStoreBackend {
    /// Shared database, safe across processes and hosts
    Postgres(PostgresSequenceStore),
    /// Embedded store, one process per data directory
    RocksDb(RocksDbSequenceStore),
}

impl SequenceStoreBackend {
    pub fn postgres(store: PostgresSequenceStore) -> Self {
        Self::Postgres(store)
    }

    pub fn rocksdb(store: RocksDbSequenceStore) -> Self {
        Self::RocksDb(store)
    }

    /// Returns whether multiple processes may share this store.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }
}

impl DaySequenceStore for SequenceStoreBackend {
    async fn increment(&self, date: DateKey) -> Result<DaySequence, StorageError> {
        match self {
            Self::Postgres(s) => s.increment(date).await,
            Self::RocksDb(s) => s.increment(date).await,
        }
    }

    async fn get(&self, date: DateKey) -> Result<Option<DaySequence>, StorageError> {
        match self {
            Self::Postgres(s) => s.get(date).await,
            Self::RocksDb(s) => s.get(date).await,
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        match self {
            Self::Postgres(s) => s.ping().await,
            Self::RocksDb(s) => s.ping().await,
        }
    }

    fn store_info(&self) -> StoreInfo {
        match self {
            Self::Postgres(s) => s.store_info(),
            Self::RocksDb(s) => s.store_info(),
        }
    }
}
