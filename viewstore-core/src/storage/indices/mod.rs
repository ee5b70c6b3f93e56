/*
    Index proxies - typed collections bound to a view

    Every proxy holds a handle to its view and its address; it never caches
    modification state. Writes go through `IndexHandle::notify_modified`,
    which rejects read-only and released views before anything is counted or
    written. The index type recorded for an address is checked both when a
    proxy is opened and on every write, since another proxy may have claimed
    the address in between.
*/

pub mod cursor;
pub mod list;
pub mod map;

pub use cursor::{Cursor, CursorSource};
pub use list::{ListIndex, ListIter};
pub use map::{MapIndex, MapIter};

use crate::storage::address::{IndexAddress, IndexType};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::value::StorageValue;
use crate::storage::view::View;
use tracing::trace;

/// Suffix tag of element entries
pub(crate) const ITEM_TAG: u8 = 1;

/// State shared by all index proxies
#[derive(Debug, Clone)]
pub(crate) struct IndexHandle {
    view: View,
    address: IndexAddress,
    prefix: Vec<u8>,
}

impl IndexHandle {
    /// Validate the address and bind it to `view`
    ///
    /// Fails if the name is invalid or the address was already used by an
    /// index of another type.
    pub(crate) fn open(view: &View, address: IndexAddress) -> StorageResult<Self> {
        view.check_usable()?;
        address.validate(view.config().max_index_name_len)?;
        check_recorded_type(view, &address)?;
        let prefix = address.data_prefix();
        Ok(IndexHandle {
            view: view.clone(),
            address,
            prefix,
        })
    }

    pub(crate) fn view(&self) -> &View {
        &self.view
    }

    pub(crate) fn address(&self) -> &IndexAddress {
        &self.address
    }

    pub(crate) fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Key of an entry of this index
    pub(crate) fn key(&self, tag: u8, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + 1 + suffix.len());
        key.extend_from_slice(&self.prefix);
        key.push(tag);
        key.extend_from_slice(suffix);
        key
    }

    pub(crate) fn check_can_modify(&self) -> StorageResult<()> {
        self.view.check_can_modify()
    }

    /// Count one modification of this index and record its type
    ///
    /// Fails with `IndexTypeMismatch`, counting nothing, if an index of
    /// another type has written to the address since this proxy was opened.
    pub(crate) fn notify_modified(&self, operation: &'static str) -> StorageResult<()> {
        let recorded = check_recorded_type(&self.view, &self.address)?;
        let count = self.view.tracker().notify_modified(&self.view, &self.address)?;
        trace!(index = %self.address, view = %self.view.id(), operation, count, "index modified");
        if !recorded {
            self.view
                .put(self.address.metadata_key(), self.address.index_type().to_bytes()?)?;
        }
        Ok(())
    }
}

/// Whether a type is recorded for `address`; fails if it is another type
fn check_recorded_type(view: &View, address: &IndexAddress) -> StorageResult<bool> {
    let Some(bytes) = view.get(&address.metadata_key())? else {
        return Ok(false);
    };
    let actual = IndexType::from_bytes(&bytes)?;
    if actual != address.index_type() {
        return Err(StorageError::IndexTypeMismatch {
            name: address.name().to_string(),
            expected: address.index_type(),
            actual,
        });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::MemoryDb;
    use crate::storage::tracker::ModificationTracker;
    use std::sync::Arc;

    #[test]
    fn test_type_is_recorded_on_first_write() {
        let db = MemoryDb::with_tracker(Arc::new(ModificationTracker::new()));
        let fork = db.create_fork();

        let list: ListIndex<String> = ListIndex::new("things", &fork).unwrap();
        // Opening alone records nothing.
        assert!(MapIndex::<String, String>::new("things", &fork).is_ok());

        list.push("v1".to_string()).unwrap();

        let result = MapIndex::<String, String>::new("things", &fork);
        assert!(matches!(
            result,
            Err(StorageError::IndexTypeMismatch {
                expected: IndexType::Map,
                actual: IndexType::List,
                ..
            })
        ));
    }

    #[test]
    fn test_write_through_stale_proxy_is_rejected() {
        let tracker = Arc::new(ModificationTracker::new());
        let db = MemoryDb::with_tracker(tracker.clone());
        let fork = db.create_fork();
        let map: MapIndex<u64, String> = MapIndex::new("things", &fork).unwrap();
        let list: ListIndex<String> = ListIndex::new("things", &fork).unwrap();
        list.push("v1".to_string()).unwrap();

        let result = map.put(&0, "other".to_string());

        assert!(matches!(
            result,
            Err(StorageError::IndexTypeMismatch {
                expected: IndexType::Map,
                actual: IndexType::List,
                ..
            })
        ));
        let map_address = IndexAddress::new(IndexType::Map, "things");
        assert_eq!(tracker.current_count(fork.id(), &map_address), 0);
    }

    #[test]
    fn test_type_survives_clear_and_merge() {
        let db = MemoryDb::with_tracker(Arc::new(ModificationTracker::new()));
        let fork = db.create_fork();
        let list: ListIndex<u64> = ListIndex::new("numbers", &fork).unwrap();
        list.push(1).unwrap();
        list.clear().unwrap();
        db.merge(fork).unwrap();

        let snapshot = db.create_snapshot();
        assert!(MapIndex::<u64, u64>::new("numbers", &snapshot).is_err());
        assert!(ListIndex::<u64>::new("numbers", &snapshot).is_ok());
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let db = MemoryDb::with_tracker(Arc::new(ModificationTracker::new()));
        let fork = db.create_fork();
        assert!(matches!(
            ListIndex::<u64>::new("no spaces", &fork),
            Err(StorageError::InvalidArgument(_))
        ));
    }
}
