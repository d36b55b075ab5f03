use std::future::Future;

use serde::Serialize;

use crate::contracts::error::StorageError;
use crate::contracts::{DateKey, DaySequence};

/// Information about the configured sequence store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    /// Backend identifier ("postgres", "rocksdb")
    pub storage_type: String,
    /// Connection target with credentials stripped, or the data directory
    pub location: String,
}

/// Durable per-day counter storage.
///
/// # Invariants
/// - `increment` is one indivisible read-increment-or-insert: two concurrent
///   callers for the same date never observe the same resulting counter.
/// - A failed `increment` returning `Conflict` did not commit.
/// - Rows are created on first use and never deleted.
pub trait DaySequenceStore: Send + Sync {
    /// Atomically bumps the counter for `date`, inserting it at 1 if absent.
    /// Returns the row as it stands after this caller's increment.
    fn increment(
        &self,
        date: DateKey,
    ) -> impl Future<Output = Result<DaySequence, StorageError>> + Send;

    /// Reads the row for `date`, if any.
    fn get(
        &self,
        date: DateKey,
    ) -> impl Future<Output = Result<Option<DaySequence>, StorageError>> + Send;

    /// Round-trips to the store.
    fn ping(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn store_info(&self) -> StoreInfo;
}
