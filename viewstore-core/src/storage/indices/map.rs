/*
    map.rs - Key/value map ordered by encoded key

    Entries live under ITEM_TAG ++ encoded key, so traversal order is the
    byte order of `StorageKey::encode_key`.
*/

use super::cursor::{Cursor, CursorSource};
use super::{IndexHandle, ITEM_TAG};
use crate::storage::address::{IndexAddress, IndexType};
use crate::storage::errors::StorageResult;
use crate::storage::value::{StorageKey, StorageValue};
use crate::storage::view::View;
use std::fmt;
use std::iter;
use std::marker::PhantomData;
use std::ops::Bound;

/// Iterator or stream over the entries of a map index
pub type MapIter<K, V> = Cursor<MapSource<K, V>>;

/// Iterator over the keys of a map index
pub type MapKeys<K, V> = iter::Map<MapIter<K, V>, fn(StorageResult<(K, V)>) -> StorageResult<K>>;

/// Iterator over the values of a map index
pub type MapValues<K, V> = iter::Map<MapIter<K, V>, fn(StorageResult<(K, V)>) -> StorageResult<V>>;

/// A map stored in a view
pub struct MapIndex<K, V> {
    handle: IndexHandle,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: StorageKey, V: StorageValue> MapIndex<K, V> {
    pub fn new(name: impl Into<String>, view: &View) -> StorageResult<Self> {
        Self::with_address(IndexAddress::new(IndexType::Map, name), view)
    }

    /// Open a member of the map family `name`
    pub fn in_family(
        name: impl Into<String>,
        family_id: impl AsRef<[u8]>,
        view: &View,
    ) -> StorageResult<Self> {
        Self::with_address(IndexAddress::in_family(IndexType::Map, name, family_id), view)
    }

    fn with_address(address: IndexAddress, view: &View) -> StorageResult<Self> {
        Ok(MapIndex {
            handle: IndexHandle::open(view, address)?,
            _marker: PhantomData,
        })
    }

    pub fn address(&self) -> &IndexAddress {
        self.handle.address()
    }

    pub fn view(&self) -> &View {
        self.handle.view()
    }

    fn entry_key(&self, key: &K) -> Vec<u8> {
        self.handle.key(ITEM_TAG, &key.encode_key())
    }

    fn entries_prefix(&self) -> Vec<u8> {
        self.handle.key(ITEM_TAG, &[])
    }

    pub fn get(&self, key: &K) -> StorageResult<Option<V>> {
        self.view()
            .get(&self.entry_key(key))?
            .map(|bytes| V::from_bytes(&bytes))
            .transpose()
    }

    pub fn contains(&self, key: &K) -> StorageResult<bool> {
        self.view().contains(&self.entry_key(key))
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self
            .view()
            .next_entry(&self.entries_prefix(), Bound::Unbounded)?
            .is_none())
    }

    /// Insert or replace the value under `key`
    pub fn put(&self, key: &K, value: V) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        let bytes = value.to_bytes()?;
        self.handle.notify_modified("put")?;
        self.view().put(self.entry_key(key), bytes)
    }

    /// Remove `key`; removing an absent key changes nothing
    pub fn remove(&self, key: &K) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        let entry_key = self.entry_key(key);
        if !self.view().contains(&entry_key)? {
            return Ok(());
        }
        self.handle.notify_modified("remove")?;
        self.view().remove(&entry_key)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        if self.is_empty()? {
            return Ok(());
        }
        self.handle.notify_modified("clear")?;
        self.view().remove_prefix(self.handle.prefix())
    }

    /// Entries in key order, bound to the map as it is now
    pub fn iter(&self) -> StorageResult<MapIter<K, V>> {
        self.bound_cursor(None)
    }

    /// Entries with keys not smaller than `from`, in key order
    pub fn iter_from(&self, from: &K) -> StorageResult<MapIter<K, V>> {
        self.bound_cursor(Some(from.encode_key()))
    }

    pub fn keys(&self) -> StorageResult<MapKeys<K, V>> {
        let key_of: fn(StorageResult<(K, V)>) -> StorageResult<K> = |entry| entry.map(|(k, _)| k);
        Ok(self.iter()?.map(key_of))
    }

    pub fn values(&self) -> StorageResult<MapValues<K, V>> {
        let value_of: fn(StorageResult<(K, V)>) -> StorageResult<V> = |entry| entry.map(|(_, v)| v);
        Ok(self.iter()?.map(value_of))
    }

    /// Late-binding stream over the entries; binds on the first pull
    pub fn stream(&self) -> MapIter<K, V> {
        Cursor::late(
            self.view().clone(),
            self.address().clone(),
            MapSource::new(self.entries_prefix(), None),
        )
    }

    fn bound_cursor(&self, start: Option<Vec<u8>>) -> StorageResult<MapIter<K, V>> {
        Cursor::bound(
            self.view().clone(),
            self.address().clone(),
            MapSource::new(self.entries_prefix(), start),
        )
    }
}

impl<K, V> fmt::Debug for MapIndex<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapIndex")
            .field("address", self.handle.address())
            .field("view", &self.handle.view().id())
            .finish()
    }
}

/// Entry source for map traversals
pub struct MapSource<K, V> {
    prefix: Vec<u8>,
    position: Position,
    _marker: PhantomData<fn() -> (K, V)>,
}

enum Position {
    Start,
    /// Inclusive start at an encoded key
    From(Vec<u8>),
    /// Full store key of the last entry returned
    After(Vec<u8>),
}

impl<K, V> MapSource<K, V> {
    fn new(prefix: Vec<u8>, start: Option<Vec<u8>>) -> Self {
        let position = match start {
            Some(encoded) => {
                let mut key = prefix.clone();
                key.extend_from_slice(&encoded);
                Position::From(key)
            }
            None => Position::Start,
        };
        MapSource {
            prefix,
            position,
            _marker: PhantomData,
        }
    }
}

impl<K: StorageKey, V: StorageValue> CursorSource for MapSource<K, V> {
    type Item = (K, V);

    fn bind(&mut self, _view: &View) -> StorageResult<()> {
        Ok(())
    }

    fn next_item(&mut self, view: &View) -> StorageResult<Option<(K, V)>> {
        let from = match &self.position {
            Position::Start => Bound::Unbounded,
            Position::From(key) => Bound::Included(key.as_slice()),
            Position::After(key) => Bound::Excluded(key.as_slice()),
        };
        let Some((raw_key, raw_value)) = view.next_entry(&self.prefix, from)? else {
            return Ok(None);
        };
        let key = K::decode_key(&raw_key[self.prefix.len()..])?;
        let value = V::from_bytes(&raw_value)?;
        self.position = Position::After(raw_key);
        Ok(Some((key, value)))
    }
}
