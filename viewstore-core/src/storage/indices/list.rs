/*
    list.rs - Dense, zero-indexed list of values

    Layout under the index prefix:
    - LEN_TAG             -> number of elements (u64)
    - ITEM_TAG ++ u64 BE  -> element at that position
*/

use super::cursor::{Cursor, CursorSource};
use super::{IndexHandle, ITEM_TAG};
use crate::storage::address::{IndexAddress, IndexType};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::value::StorageValue;
use crate::storage::view::View;
use std::fmt;
use std::marker::PhantomData;

const LEN_TAG: u8 = 0;

/// Iterator or stream over a list index
pub type ListIter<V> = Cursor<ListSource<V>>;

/// A list of values stored in a view
///
/// Reads work on any view; writes require a fork. Several `ListIndex`
/// values may be opened with the same name over the same view: they share
/// the data and invalidate each other's iterators.
pub struct ListIndex<V> {
    handle: IndexHandle,
    _marker: PhantomData<fn() -> V>,
}

impl<V: StorageValue> ListIndex<V> {
    /// Open the list called `name` in `view`
    pub fn new(name: impl Into<String>, view: &View) -> StorageResult<Self> {
        Self::with_address(IndexAddress::new(IndexType::List, name), view)
    }

    /// Open a member of the list family `name`
    pub fn in_family(
        name: impl Into<String>,
        family_id: impl AsRef<[u8]>,
        view: &View,
    ) -> StorageResult<Self> {
        Self::with_address(IndexAddress::in_family(IndexType::List, name, family_id), view)
    }

    fn with_address(address: IndexAddress, view: &View) -> StorageResult<Self> {
        Ok(ListIndex {
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

    fn len_key(&self) -> Vec<u8> {
        self.handle.key(LEN_TAG, &[])
    }

    fn item_key(&self, index: u64) -> Vec<u8> {
        item_key(&self.handle, index)
    }

    fn write_len(&self, len: u64) -> StorageResult<()> {
        self.view().put(self.len_key(), len.to_bytes()?)
    }

    /// Number of elements
    pub fn len(&self) -> StorageResult<u64> {
        read_len(&self.handle)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Element at `index`; `OutOfBounds` if `index >= len`
    pub fn get(&self, index: u64) -> StorageResult<V> {
        let len = self.len()?;
        if index >= len {
            return Err(StorageError::OutOfBounds { index, size: len });
        }
        read_item(&self.handle, index)
    }

    /// Last element; `EmptyCollection` if the list is empty
    pub fn last(&self) -> StorageResult<V> {
        match self.len()? {
            0 => Err(StorageError::EmptyCollection(format!("{} has no last element", self.address()))),
            len => read_item(&self.handle, len - 1),
        }
    }

    /// Append a value
    pub fn push(&self, value: V) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        let bytes = value.to_bytes()?;
        let len = self.len()?;
        self.handle.notify_modified("push")?;
        self.view().put(self.item_key(len), bytes)?;
        self.write_len(len + 1)
    }

    /// Append all values in order
    ///
    /// Accepts plain values as well as `Option`s. If any element is `None`
    /// the call fails with `InvalidArgument` and the list is left untouched.
    /// An empty input changes nothing and is not counted as a modification.
    pub fn extend<I, T>(&self, values: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<V>>,
    {
        self.handle.check_can_modify()?;
        let mut encoded = Vec::new();
        for (position, value) in values.into_iter().enumerate() {
            match value.into() {
                Some(value) => encoded.push(value.to_bytes()?),
                None => {
                    return Err(StorageError::InvalidArgument(format!(
                        "element {} of the appended sequence is absent",
                        position
                    )))
                }
            }
        }
        if encoded.is_empty() {
            return Ok(());
        }

        let len = self.len()?;
        self.handle.notify_modified("extend")?;
        let added = encoded.len() as u64;
        for (offset, bytes) in encoded.into_iter().enumerate() {
            self.view().put(self.item_key(len + offset as u64), bytes)?;
        }
        self.write_len(len + added)
    }

    /// Replace the element at `index`
    ///
    /// Never appends: `OutOfBounds` if `index >= len`, including on an empty
    /// list. A replacement counts as a modification for open iterators.
    pub fn set(&self, index: u64, value: V) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        let len = self.len()?;
        if index >= len {
            return Err(StorageError::OutOfBounds { index, size: len });
        }
        let bytes = value.to_bytes()?;
        self.handle.notify_modified("set")?;
        self.view().put(self.item_key(index), bytes)
    }

    /// Remove and return the last element
    pub fn pop(&self) -> StorageResult<V> {
        self.handle.check_can_modify()?;
        let len = self.len()?;
        if len == 0 {
            return Err(StorageError::EmptyCollection(format!("cannot pop from empty {}", self.address())));
        }
        let last = read_item(&self.handle, len - 1)?;
        self.handle.notify_modified("pop")?;
        self.view().remove(&self.item_key(len - 1))?;
        self.write_len(len - 1)?;
        Ok(last)
    }

    /// Shrink the list to at most `new_len` elements
    ///
    /// A negative target fails with `InvalidArgument`; a target not smaller
    /// than the current length leaves the list as it is.
    pub fn truncate<N>(&self, new_len: N) -> StorageResult<()>
    where
        N: TryInto<u64> + Copy + fmt::Display,
    {
        self.handle.check_can_modify()?;
        let new_len: u64 = new_len.try_into().map_err(|_| {
            StorageError::InvalidArgument(format!("cannot truncate to negative size {}", new_len))
        })?;
        let len = self.len()?;
        if new_len >= len {
            return Ok(());
        }
        self.handle.notify_modified("truncate")?;
        for index in new_len..len {
            self.view().remove(&self.item_key(index))?;
        }
        self.write_len(new_len)
    }

    /// Remove all elements; clearing an empty list changes nothing
    pub fn clear(&self) -> StorageResult<()> {
        self.handle.check_can_modify()?;
        if self.is_empty()? {
            return Ok(());
        }
        self.handle.notify_modified("clear")?;
        self.view().remove_prefix(self.handle.prefix())
    }

    /// Iterator bound to the list as it is now
    ///
    /// Any later modification of the list, through this proxy or an alias,
    /// makes the next call to `next` fail with `ConcurrentModification`.
    pub fn iter(&self) -> StorageResult<ListIter<V>> {
        Cursor::bound(
            self.view().clone(),
            self.address().clone(),
            ListSource::new(self.handle.clone()),
        )
    }

    /// Late-binding stream over the list
    ///
    /// Nothing is read until the first pull; the stream then binds to the
    /// list length and modification counter at that moment and reads each
    /// element live.
    pub fn stream(&self) -> ListIter<V> {
        Cursor::late(
            self.view().clone(),
            self.address().clone(),
            ListSource::new(self.handle.clone()),
        )
    }
}

impl<V> fmt::Debug for ListIndex<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListIndex")
            .field("address", self.handle.address())
            .field("view", &self.handle.view().id())
            .finish()
    }
}

fn item_key(handle: &IndexHandle, index: u64) -> Vec<u8> {
    handle.key(ITEM_TAG, &index.to_be_bytes())
}

fn read_len(handle: &IndexHandle) -> StorageResult<u64> {
    match handle.view().get(&handle.key(LEN_TAG, &[]))? {
        Some(bytes) => u64::from_bytes(&bytes),
        None => Ok(0),
    }
}

fn read_item<V: StorageValue>(handle: &IndexHandle, index: u64) -> StorageResult<V> {
    match handle.view().get(&item_key(handle, index))? {
        Some(bytes) => V::from_bytes(&bytes),
        None => Err(StorageError::Internal(format!(
            "{} has no element at {} below its length",
            handle.address(),
            index
        ))),
    }
}

/// Element source for list traversals
pub struct ListSource<V> {
    handle: IndexHandle,
    len: u64,
    position: u64,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ListSource<V> {
    fn new(handle: IndexHandle) -> Self {
        ListSource {
            handle,
            len: 0,
            position: 0,
            _marker: PhantomData,
        }
    }
}

impl<V: StorageValue> CursorSource for ListSource<V> {
    type Item = V;

    fn bind(&mut self, _view: &View) -> StorageResult<()> {
        self.len = read_len(&self.handle)?;
        Ok(())
    }

    fn next_item(&mut self, _view: &View) -> StorageResult<Option<V>> {
        if self.position >= self.len {
            return Ok(None);
        }
        let item = read_item(&self.handle, self.position)?;
        self.position += 1;
        Ok(Some(item))
    }
}
