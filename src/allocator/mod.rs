//! Tracking-ID allocators.
//!
//! `DurableAllocator` delegates atomicity to a `DaySequenceStore` and is the
//! only authoritative implementation. `InMemoryAllocator` keeps counters in
//! this process and exists for development and tests. The two never reconcile:
//! switching a deployment from in-memory to durable mid-day restarts numbering
//! at 1 and can reissue identifiers already handed out in memory.

mod backend;
mod durable;
mod memory;

use chrono::{FixedOffset, Offset, Utc};

use crate::contracts::{Clock, ConfigError, DateKey, Prefix};

pub use backend::AllocatorBackend;
pub use durable::DurableAllocator;
pub use memory::InMemoryAllocator;

/// Settings shared by both allocator implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Brand code rendered at the front of every identifier.
    pub prefix: Prefix,
    /// Timezone used to decide which calendar day a call falls on.
    pub utc_offset: FixedOffset,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            prefix: Prefix::default(),
            utc_offset: utc(),
        }
    }
}

impl AllocatorConfig {
    /// Reads allocator settings from the environment.
    ///
    /// - `TRACKSEQ_PREFIX`: brand code (default: `SK`)
    /// - `TRACKSEQ_UTC_OFFSET_MINUTES`: offset east of UTC for date keys (default: 0)
    ///
    /// Both shape issued identifiers, so invalid values are rejected rather
    /// than defaulted.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let prefix = match lookup("TRACKSEQ_PREFIX") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "TRACKSEQ_PREFIX",
                reason: format!("{}", e),
            })?,
            None => Prefix::default(),
        };

        let utc_offset = match lookup("TRACKSEQ_UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes: i32 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: "TRACKSEQ_UTC_OFFSET_MINUTES",
                    reason: format!("{:?} is not an integer: {}", raw, e),
                })?;
                offset_from_minutes(minutes).ok_or_else(|| ConfigError::Invalid {
                    var: "TRACKSEQ_UTC_OFFSET_MINUTES",
                    reason: format!("{} is outside -1439..=1439", minutes),
                })?
            }
            None => utc(),
        };

        Ok(Self { prefix, utc_offset })
    }

    /// Resolves the date key for the clock's current instant.
    pub fn date_key(&self, clock: &dyn Clock) -> DateKey {
        DateKey::from_instant(clock.now(), self.utc_offset)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    if minutes.unsigned_abs() >= 24 * 60 {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}
