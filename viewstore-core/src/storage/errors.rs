/*
    errors.rs - Error types for the storage subsystem

    Defines all error types that can occur in:
    - View access control
    - List and map index operations
    - Iterators and streams over indices
    - The in-memory storage engine
*/

use crate::storage::address::IndexType;
use thiserror::Error;

/// Errors that can occur in the storage subsystem
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A mutating operation was called on a read-only view
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Position is not smaller than the collection size
    #[error("Index out of bounds: index {index}, size {size}")]
    OutOfBounds { index: u64, size: u64 },

    /// The operation needs at least one element
    #[error("Collection is empty: {0}")]
    EmptyCollection(String),

    /// An argument was absent or out of its valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The index changed under an open iterator or stream
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A view was used after it had been released
    #[error("Resource misuse: {0}")]
    ResourceMisuse(String),

    /// The address is already used by an index of a different type
    #[error("Index type mismatch for '{name}': expected {expected}, found {actual}")]
    IndexTypeMismatch {
        name: String,
        expected: IndexType,
        actual: IndexType,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
