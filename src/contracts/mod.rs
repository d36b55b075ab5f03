pub mod clock;
pub mod env;
pub mod error;
pub mod sequence;
pub mod storage;
pub mod tracking_id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AllocatorError, ConfigError, ParseError, StorageError};
pub use sequence::{AllocatorKind, TrackingIdAllocator};
pub use storage::{DaySequenceStore, StoreInfo};
pub use tracking_id::{DateKey, DaySequence, Prefix, TrackingId, COUNTER_WIDTH, MAX_PREFIX_LEN};
