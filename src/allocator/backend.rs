//! Allocator selected at startup.

use crate::allocator::{DurableAllocator, InMemoryAllocator};
use crate::contracts::{
    AllocatorError, AllocatorKind, DateKey, DaySequence, DaySequenceStore, Prefix, StoreInfo,
    TrackingId, TrackingIdAllocator,
};
use crate::storage::SequenceStoreBackend;

/// Either allocator behind one concrete type, so the HTTP layer is not generic
/// over the deployment mode.
pub enum AllocatorBackend {
    Durable(DurableAllocator<SequenceStoreBackend>),
    InMemory(InMemoryAllocator),
}

impl AllocatorBackend {
    pub fn durable(allocator: DurableAllocator<SequenceStoreBackend>) -> Self {
        Self::Durable(allocator)
    }

    pub fn in_memory(allocator: InMemoryAllocator) -> Self {
        Self::InMemory(allocator)
    }

    /// Describes the backing store, if any.
    pub fn store_info(&self) -> Option<StoreInfo> {
        match self {
            Self::Durable(a) => Some(a.store().store_info()),
            Self::InMemory(_) => None,
        }
    }
}

impl TrackingIdAllocator for AllocatorBackend {
    async fn generate(&self) -> Result<TrackingId, AllocatorError> {
        match self {
            Self::Durable(a) => a.generate().await,
            Self::InMemory(a) => a.generate().await,
        }
    }

    async fn current(&self, date: DateKey) -> Result<Option<DaySequence>, AllocatorError> {
        match self {
            Self::Durable(a) => a.current(date).await,
            Self::InMemory(a) => a.current(date).await,
        }
    }

    async fn ping(&self) -> Result<(), AllocatorError> {
        match self {
            Self::Durable(a) => a.ping().await,
            Self::InMemory(a) => a.ping().await,
        }
    }

    fn today(&self) -> DateKey {
        match self {
            Self::Durable(a) => a.today(),
            Self::InMemory(a) => a.today(),
        }
    }

    fn prefix(&self) -> &Prefix {
        match self {
            Self::Durable(a) => a.prefix(),
            Self::InMemory(a) => a.prefix(),
        }
    }

    fn kind(&self) -> AllocatorKind {
        match self {
            Self::Durable(a) => a.kind(),
            Self::InMemory(a) => a.kind(),
        }
    }

    fn conflict_retries(&self) -> u64 {
        match self {
            Self::Durable(a) => a.conflict_retries(),
            Self::InMemory(a) => a.conflict_retries(),
        }
    }
}
