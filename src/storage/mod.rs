mod postgres;
mod retry;
mod rocksdb;
mod sequence_store_backend;

pub use postgres::{PostgresConfig, PostgresSequenceStore};
pub use retry::RetryConfig;
pub use rocksdb::RocksDbSequenceStore;
pub use sequence_store_backend::SequenceStoreBackend;
