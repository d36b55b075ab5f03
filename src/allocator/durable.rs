use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;

use crate::allocator::AllocatorConfig;
use crate::contracts::{
    AllocatorError, AllocatorKind, Clock, DateKey, DaySequence, DaySequenceStore, Prefix,
    StorageError, SystemClock, TrackingId, TrackingIdAllocator,
};
use crate::storage::RetryConfig;

/// Allocator backed by a shared `DaySequenceStore`.
///
/// Holds no lock of its own. Each `generate()` is exactly one atomic
/// `increment` on the store, so uniqueness across threads, processes and
/// hosts is whatever the store guarantees for that call.
pub struct DurableAllocator<S: DaySequenceStore> {
    store: Arc<S>,
    config: AllocatorConfig,
    retry: RetryConfig,
    clock: Arc<dyn Clock>,
    conflict_retries: AtomicU64,
}

impl<S: DaySequenceStore> DurableAllocator<S> {
    pub fn new(store: Arc<S>, config: AllocatorConfig) -> Self {
        Self {
            store,
            config,
            retry: RetryConfig::default(),
            clock: Arc::new(SystemClock),
            conflict_retries: AtomicU64::new(0),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Increments the day row, retrying only rolled-back conflicts.
    async fn increment_with_retry(&self, date: DateKey) -> Result<DaySequence, StorageError> {
        let store = self.store.as_ref();
        let retries = &self.conflict_retries;
        (move || async move { store.increment(date).await })
            .retry(self.retry.backoff())
            .when(StorageError::is_conflict)
            .notify(move |err: &StorageError, dur: Duration| {
                retries.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    date = %date,
                    error = %err,
                    retry_in = ?dur,
                    "Sequence increment conflicted, retrying"
                );
            })
            .await
    }
}

impl<S: DaySequenceStore> TrackingIdAllocator for DurableAllocator<S> {
    async fn generate(&self) -> Result<TrackingId, AllocatorError> {
        let date = self.today();

        let row = self.increment_with_retry(date).await.map_err(|e| {
            tracing::error!(date = %date, error = %e, "Failed to allocate tracking id");
            AllocatorError::from(e)
        })?;

        if row.date != date || row.counter == 0 {
            return Err(AllocatorError::MalformedState {
                date,
                detail: format!(
                    "store returned counter {} for {} after incrementing {}",
                    row.counter, row.date, date
                ),
            });
        }

        let id = TrackingId::new(self.config.prefix.clone(), date, row.counter);
        tracing::debug!(tracking_id = %id, "Allocated tracking id");
        Ok(id)
    }

    async fn current(&self, date: DateKey) -> Result<Option<DaySequence>, AllocatorError> {
        Ok(self.store.get(date).await?)
    }

    async fn ping(&self) -> Result<(), AllocatorError> {
        Ok(self.store.ping().await?)
    }

    fn today(&self) -> DateKey {
        self.config.date_key(self.clock.as_ref())
    }

    fn prefix(&self) -> &Prefix {
        &self.config.prefix
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Durable
    }

    fn conflict_retries(&self) -> u64 {
        self.conflict_retries.load(Ordering::Relaxed)
    }
}
