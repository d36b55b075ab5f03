use std::sync::Arc;

use dashmap::DashMap;

use crate::allocator::AllocatorConfig;
use crate::contracts::{
    AllocatorError, AllocatorKind, Clock, DateKey, DaySequence, Prefix, SystemClock, TrackingId,
    TrackingIdAllocator,
};

/// Process-local allocator for development and tests.
///
/// Counters live only as long as this instance. A restart starts every date
/// over at 1, and two instances never see each other's counters, so ids from
/// this allocator are not authoritative.
pub struct InMemoryAllocator {
    /// Per-date counters; the entry guard serializes same-day increments
    counters: DashMap<DateKey, u64>,
    config: AllocatorConfig,
    clock: Arc<dyn Clock>,
}

impl InMemoryAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            counters: DashMap::new(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read-increment-write under the shard lock for `date`. Never yields.
    fn bump(&self, date: DateKey) -> Result<u64, AllocatorError> {
        let mut counter = self.counters.entry(date).or_insert(0);
        let next = counter
            .checked_add(1)
            .ok_or_else(|| AllocatorError::MalformedState {
                date,
                detail: "counter overflow".into(),
            })?;
        *counter = next;
        Ok(next)
    }
}

impl Default for InMemoryAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl TrackingIdAllocator for InMemoryAllocator {
    async fn generate(&self) -> Result<TrackingId, AllocatorError> {
        let date = self.today();
        let counter = self.bump(date)?;
        Ok(TrackingId::new(self.config.prefix.clone(), date, counter))
    }

    async fn current(&self, date: DateKey) -> Result<Option<DaySequence>, AllocatorError> {
        Ok(self.counters.get(&date).map(|counter| DaySequence {
            date,
            counter: *counter,
            updated_at: None,
        }))
    }

    async fn ping(&self) -> Result<(), AllocatorError> {
        Ok(())
    }

    fn today(&self) -> DateKey {
        self.config.date_key(self.clock.as_ref())
    }

    fn prefix(&self) -> &Prefix {
        &self.config.prefix
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::InMemory
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::contracts::ManualClock;

    fn clock_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn first_three_ids_on_halloween() {
        let alloc = InMemoryAllocator::default().with_clock(clock_at(2025, 10, 31, 9, 0));
        assert_eq!(alloc.generate().await.unwrap().to_string(), "SK-20251031-0001");
        assert_eq!(alloc.generate().await.unwrap().to_string(), "SK-20251031-0002");
        assert_eq!(alloc.generate().await.unwrap().to_string(), "SK-20251031-0003");
    }

    #[tokio::test]
    async fn counter_resets_after_midnight() {
        let clock = clock_at(2025, 10, 31, 23, 59);
        let alloc = InMemoryAllocator::default().with_clock(clock.clone());

        for _ in 0..5 {
            alloc.generate().await.unwrap();
        }
        clock.advance(Duration::minutes(2));

        let id = alloc.generate().await.unwrap();
        assert_eq!(id.to_string(), "SK-20251101-0001");

        let yesterday: DateKey = "20251031".parse().unwrap();
        assert_eq!(alloc.current(yesterday).await.unwrap().unwrap().counter, 5);
    }

    #[tokio::test]
    async fn instances_do_not_share_counters() {
        let clock = clock_at(2025, 10, 31, 12, 0);
        let a = InMemoryAllocator::default().with_clock(clock.clone());
        let b = InMemoryAllocator::default().with_clock(clock);

        a.generate().await.unwrap();
        a.generate().await.unwrap();
        assert_eq!(b.generate().await.unwrap().counter(), 1);
        assert_eq!(a.generate().await.unwrap().counter(), 3);
    }

    #[tokio::test]
    async fn uses_configured_prefix_and_offset() {
        let config = AllocatorConfig::from_lookup(|key| match key {
            "TRACKSEQ_PREFIX" => Some("ORD".into()),
            "TRACKSEQ_UTC_OFFSET_MINUTES" => Some("120".into()),
            _ => None,
        })
        .unwrap();
        // 23:00 UTC is already the next day at UTC+2.
        let alloc = InMemoryAllocator::new(config).with_clock(clock_at(2025, 10, 31, 23, 0));
        assert_eq!(alloc.generate().await.unwrap().to_string(), "ORD-20251101-0001");
    }

    #[tokio::test]
    async fn concurrent_tasks_get_distinct_counters() {
        let alloc = Arc::new(InMemoryAllocator::default().with_clock(clock_at(2025, 10, 31, 12, 0)));
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                tokio::spawn(async move { alloc.generate().await.unwrap().counter() })
            })
            .collect();

        let mut counters = Vec::new();
        for h in handles {
            counters.push(h.await.unwrap());
        }
        counters.sort_unstable();
        assert_eq!(counters, (1..=64).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn ping_always_succeeds() {
        let alloc = InMemoryAllocator::default();
        alloc.ping().await.unwrap();
        assert_eq!(alloc.kind(), AllocatorKind::InMemory);
    }
}
