use std::future::Future;

use serde::Serialize;

use crate::contracts::error::AllocatorError;
use crate::contracts::{DateKey, DaySequence, Prefix, TrackingId};

/// Which implementation is serving identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorKind {
    /// Counters live in a shared store and survive restarts.
    Durable,
    /// Counters live in this process only. Not authoritative.
    InMemory,
}

/// Issues tracking identifiers, one per new order.
///
/// # Invariants
/// - Within one date key, counters run 1, 2, 3, ... with no gaps or repeats,
///   regardless of how many callers race.
/// - A new date key starts again at 1; earlier dates are never revisited.
/// - On storage failure an error is returned, never a guessed identifier.
pub trait TrackingIdAllocator: Send + Sync {
    /// Issues the next identifier for the current date.
    fn generate(&self) -> impl Future<Output = Result<TrackingId, AllocatorError>> + Send;

    /// Returns the counter state for `date` without incrementing it.
    fn current(
        &self,
        date: DateKey,
    ) -> impl Future<Output = Result<Option<DaySequence>, AllocatorError>> + Send;

    /// Checks that the backing store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), AllocatorError>> + Send;

    /// Date key the next `generate()` call would use.
    fn today(&self) -> DateKey;

    fn prefix(&self) -> &Prefix;

    fn kind(&self) -> AllocatorKind;

    /// Increments retried after a rolled-back conflict, since startup.
    fn conflict_retries(&self) -> u64 {
        0
    }
}
