//! View-scoped index storage
//!
//! Typed lists and maps stored in one key/value space, read through
//! snapshots, written through forks, and traversed by iterators that fail
//! fast when the index changes underneath them.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod proofs;
pub mod storage;
pub mod test_utils;
pub mod transaction;

pub use config::{Config, ConfigError, DatabaseConfig};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use storage::{
    IndexAddress, IndexType, ListIndex, MapIndex, MemoryDb, ModificationTracker, StorageError,
    StorageResult, View, ViewKind,
};
pub use transaction::{ExecutionError, Transaction, TransactionContext, TransactionExecutor};
