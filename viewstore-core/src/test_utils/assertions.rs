//! Assertion helpers with readable failure messages

use crate::storage::errors::{StorageError, StorageResult};
use std::fmt::Debug;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that a Result is Err and return the error
pub fn assert_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
        Err(e) => e,
    }
}

/// Assert that a storage call failed with a concurrent modification
pub fn assert_concurrent_modification<T: Debug>(result: StorageResult<T>) {
    match result {
        Err(StorageError::ConcurrentModification(_)) => {}
        other => panic!("Expected ConcurrentModification, got {:?}", other),
    }
}

/// Assert that the next pull of a traversal fails with a concurrent
/// modification and that the traversal is finished afterwards
pub fn assert_invalidated<T: Debug, I>(iter: &mut I)
where
    I: Iterator<Item = StorageResult<T>>,
{
    match iter.next() {
        Some(result) => assert_concurrent_modification(result),
        None => panic!("Expected ConcurrentModification, traversal ended"),
    }
    if let Some(next) = iter.next() {
        panic!("Expected the traversal to stay finished, got {:?}", next);
    }
}

/// Drain a traversal, panicking on the first error
pub fn collect_ok<T: Debug, I>(iter: I) -> Vec<T>
where
    I: Iterator<Item = StorageResult<T>>,
{
    assert_ok(iter.collect::<StorageResult<Vec<T>>>())
}
