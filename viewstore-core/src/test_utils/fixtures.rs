//! Fixtures for databases, views and populated indexes

use crate::storage::database::MemoryDb;
use crate::storage::errors::StorageResult;
use crate::storage::indices::ListIndex;
use crate::storage::tracker::ModificationTracker;
use crate::storage::value::StorageValue;
use crate::storage::view::View;
use std::sync::Arc;

/// Database with its own modification tracker
pub fn isolated_db() -> MemoryDb {
    MemoryDb::with_tracker(Arc::new(ModificationTracker::new()))
}

/// Open `name` over `view` and append `values`
pub fn list_with<V: StorageValue>(name: &str, view: &View, values: Vec<V>) -> StorageResult<ListIndex<V>> {
    let list = ListIndex::new(name, view)?;
    list.extend(values)?;
    Ok(list)
}

/// Commit a list with `values` and return a snapshot over it
pub fn committed_list<V: StorageValue>(db: &MemoryDb, name: &str, values: Vec<V>) -> StorageResult<View> {
    let fork = db.create_fork();
    list_with(name, &fork, values)?;
    db.merge(fork)?;
    Ok(db.create_snapshot())
}

/// `count` distinct string values: "v1", "v2", ...
pub fn string_values(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("v{}", i)).collect()
}
