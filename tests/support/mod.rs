//! Test doubles shared by the integration test binaries.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use trackseq::allocator::{AllocatorConfig, DurableAllocator};
use trackseq::contracts::{
    DateKey, DaySequence, DaySequenceStore, ManualClock, StorageError, StoreInfo,
};
use trackseq::storage::{RetryConfig, RocksDbSequenceStore};

/// Wraps a real store and can cut it off, the way a dropped network link
/// would: while offline every call fails before reaching the store.
pub struct SwitchableStore<S> {
    inner: S,
    offline: AtomicBool,
    delay: Option<Duration>,
    pub increments_attempted: AtomicUsize,
}

impl<S: DaySequenceStore> SwitchableStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            delay: None,
            increments_attempted: AtomicUsize::new(0),
        }
    }

    /// Every increment sleeps `delay` before touching the store.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl<S: DaySequenceStore> DaySequenceStore for SwitchableStore<S> {
    async fn increment(&self, date: DateKey) -> Result<DaySequence, StorageError> {
        self.increments_attempted.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.inner.increment(date).await
    }

    async fn get(&self, date: DateKey) -> Result<Option<DaySequence>, StorageError> {
        self.check()?;
        self.inner.get(date).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()?;
        self.inner.ping().await
    }

    fn store_info(&self) -> StoreInfo {
        self.inner.store_info()
    }
}

/// Noon UTC on 2025-10-31.
pub fn halloween_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap(),
    ))
}

pub fn date(s: &str) -> DateKey {
    s.parse().unwrap()
}

pub fn open_rocksdb() -> (RocksDbSequenceStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = RocksDbSequenceStore::open(dir.path()).unwrap();
    (store, dir)
}

/// Durable allocator on a fresh RocksDB directory with a pinned clock.
pub fn rocksdb_allocator(
    clock: Arc<ManualClock>,
) -> (DurableAllocator<RocksDbSequenceStore>, TempDir) {
    let (store, dir) = open_rocksdb();
    let allocator = DurableAllocator::new(Arc::new(store), AllocatorConfig::default())
        .with_clock(clock)
        .with_retry(fast_retry());
    (allocator, dir)
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        initial_delay_ms: 1,
        max_delay_ms: 10,
    }
}

/// Checks `^PREFIX-\d{8}-\d{4,}$` without pulling in a regex engine.
pub fn matches_format(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    let Some((date, counter)) = rest.split_once('-') else {
        return false;
    };
    date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && counter.len() >= 4
        && counter.bytes().all(|b| b.is_ascii_digit())
}
