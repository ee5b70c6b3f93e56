/*
    cursor.rs - Lazy traversals guarded by the modification tracker

    A cursor pulls one element at a time from the live index. Before every
    pull it compares the tracker counter of its (view, address) pair with the
    value captured when it was bound:
    - iterators bind when they are created
    - streams bind on the first pull, so changes made between creation and
      evaluation are visible

    The first drift fails the traversal with ConcurrentModification; the
    cursor is fused afterwards and never resumes.
*/

use crate::metrics::{names, record_counter};
use crate::storage::address::IndexAddress;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::view::View;
use std::fmt;
use tracing::debug;

/// Element source of a cursor
pub trait CursorSource {
    type Item;

    /// Capture whatever the traversal needs from the index (e.g. its length)
    fn bind(&mut self, view: &View) -> StorageResult<()>;

    /// Read the next element from the live index
    fn next_item(&mut self, view: &View) -> StorageResult<Option<Self::Item>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Unbound,
    Bound { expected: u64 },
    Done,
}

/// Forward-only, non-restartable traversal over an index
pub struct Cursor<S> {
    view: View,
    address: IndexAddress,
    state: CursorState,
    source: S,
}

impl<S: CursorSource> Cursor<S> {
    /// Cursor bound right away
    pub(crate) fn bound(view: View, address: IndexAddress, mut source: S) -> StorageResult<Self> {
        view.check_usable()?;
        let expected = view.tracker().current_count(view.id(), &address);
        source.bind(&view)?;
        Ok(Cursor {
            view,
            address,
            state: CursorState::Bound { expected },
            source,
        })
    }

    /// Cursor that binds on its first pull
    pub(crate) fn late(view: View, address: IndexAddress, source: S) -> Self {
        Cursor {
            view,
            address,
            state: CursorState::Unbound,
            source,
        }
    }

    pub fn address(&self) -> &IndexAddress {
        &self.address
    }

    fn validate(&mut self) -> StorageResult<()> {
        self.view.check_usable()?;
        let current = self.view.tracker().current_count(self.view.id(), &self.address);
        match self.state {
            CursorState::Unbound => {
                self.source.bind(&self.view)?;
                self.state = CursorState::Bound { expected: current };
                Ok(())
            }
            CursorState::Bound { expected } if expected == current => Ok(()),
            CursorState::Bound { expected } => {
                record_counter(names::CURSORS_INVALIDATED, 1);
                debug!(
                    index = %self.address,
                    view = %self.view.id(),
                    expected,
                    current,
                    "traversal invalidated"
                );
                Err(StorageError::ConcurrentModification(format!(
                    "{} was modified during traversal (counter {} -> {})",
                    self.address, expected, current
                )))
            }
            CursorState::Done => Ok(()),
        }
    }
}

impl<S: CursorSource> Iterator for Cursor<S> {
    type Item = StorageResult<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == CursorState::Done {
            return None;
        }
        if let Err(err) = self.validate() {
            self.state = CursorState::Done;
            return Some(Err(err));
        }
        match self.source.next_item(&self.view) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.state = CursorState::Done;
                None
            }
            Err(err) => {
                self.state = CursorState::Done;
                Some(Err(err))
            }
        }
    }
}

impl<S: CursorSource> std::iter::FusedIterator for Cursor<S> {}

impl<S> fmt::Debug for Cursor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("view", &self.view.id())
            .field("address", &self.address)
            .field("state", &self.state)
            .finish()
    }
}
