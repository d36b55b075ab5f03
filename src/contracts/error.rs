use thiserror::Error;

use crate::contracts::DateKey;

/// Errors returned by a tracking-ID allocator.
///
/// Callers must abort order creation on any of these; there is no fallback
/// identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed sequence state for {date}: {detail}")]
    MalformedState { date: DateKey, detail: String },
}

impl AllocatorError {
    /// Short machine-readable code, used by the HTTP layer and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            AllocatorError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AllocatorError::MalformedState { .. } => "MALFORMED_STATE",
        }
    }
}

impl From<StorageError> for AllocatorError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Corrupt { date, detail } => AllocatorError::MalformedState { date, detail },
            other => AllocatorError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Errors raised by a `DaySequenceStore` backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store could not be reached, or the outcome of the operation is unknown.
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    /// The atomic increment lost a race and was rolled back. Safe to retry.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Corrupt counter for {date}: {detail}")]
    Corrupt { date: DateKey, detail: String },

    #[error("IO error: {0}")]
    Io(String),
}

impl StorageError {
    /// Returns true when the failed operation is known not to have committed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

/// Errors from parsing tracking identifiers, date keys and prefixes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid prefix {0:?}: expected 1-8 uppercase letters or digits")]
    InvalidPrefix(String),

    #[error("Invalid date key {0:?}: expected YYYYMMDD")]
    InvalidDate(String),

    #[error("Invalid counter {0:?}: expected at least 4 digits and a value >= 1")]
    InvalidCounter(String),

    #[error("Invalid tracking id {0:?}: expected PREFIX-YYYYMMDD-NNNN")]
    InvalidFormat(String),
}

/// Invalid startup configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
