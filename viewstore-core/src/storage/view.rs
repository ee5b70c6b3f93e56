/*
    view.rs - Snapshot and fork handles over the store

    A view is either a read-only Snapshot of the committed state or a Fork
    that stages uncommitted changes on top of it. Views are cheap to clone:
    every clone is a handle to the same underlying view, sharing its identity
    and its release state.

    Fork layout:
    - base:    committed tree at the time the fork was created
    - changes: staged puts (Some) and deletions (None), applied on merge
*/

use crate::config::DatabaseConfig;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::tracker::ModificationTracker;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Committed key/value tree
pub(crate) type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// Staged changes of a fork
pub(crate) type Changes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Helper to convert poison errors into StorageError
fn handle_poison<T>(_err: PoisonError<T>) -> StorageError {
    StorageError::Internal("Lock poisoned: a thread panicked while holding the lock".to_string())
}

/// Process-unique identity of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Kind of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Immutable point-in-time view
    Snapshot,
    /// Read-write view staging uncommitted changes
    Fork,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Snapshot => write!(f, "snapshot"),
            ViewKind::Fork => write!(f, "fork"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ViewState {
    pub(crate) base: Arc<Tree>,
    pub(crate) changes: Changes,
    /// Saved change sets, oldest first, tagged with their checkpoint id
    checkpoints: Vec<(u64, Changes)>,
    next_checkpoint: u64,
}

/// Save point of a fork, returned by [`View::checkpoint`]
///
/// A checkpoint is consumed by rolling back to it or discarding it. It cannot
/// be copied, so only its creator can use it.
#[derive(Debug, PartialEq, Eq)]
pub struct Checkpoint {
    view: ViewId,
    id: u64,
}

struct ViewInner {
    id: ViewId,
    db_id: u64,
    kind: ViewKind,
    released: AtomicBool,
    state: RwLock<ViewState>,
    tracker: Arc<ModificationTracker>,
    config: Arc<DatabaseConfig>,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        self.tracker.forget_view(self.id);
    }
}

/// Handle to a snapshot or a fork
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

impl View {
    pub(crate) fn new(
        id: ViewId,
        db_id: u64,
        kind: ViewKind,
        base: Arc<Tree>,
        tracker: Arc<ModificationTracker>,
        config: Arc<DatabaseConfig>,
    ) -> Self {
        View {
            inner: Arc::new(ViewInner {
                id,
                db_id,
                kind,
                released: AtomicBool::new(false),
                state: RwLock::new(ViewState {
                    base,
                    changes: Changes::new(),
                    checkpoints: Vec::new(),
                    next_checkpoint: 0,
                }),
                tracker,
                config,
            }),
        }
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn kind(&self) -> ViewKind {
        self.inner.kind
    }

    pub fn is_fork(&self) -> bool {
        self.inner.kind == ViewKind::Fork
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub(crate) fn db_id(&self) -> u64 {
        self.inner.db_id
    }

    /// Tracker shared by all indexes opened over this view
    pub fn tracker(&self) -> &Arc<ModificationTracker> {
        &self.inner.tracker
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Release the view; every later use through any handle fails
    ///
    /// Releasing twice is a no-op.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(view = %self.id(), kind = %self.kind(), "view released");
        crate::metrics::record_counter(crate::metrics::names::VIEWS_RELEASED, 1);
        if self.inner.config.forget_released_views {
            self.inner.tracker.forget_view(self.id());
        }
    }

    /// Fails with `ResourceMisuse` once the view has been released
    pub fn check_usable(&self) -> StorageResult<()> {
        if self.is_released() {
            return Err(StorageError::ResourceMisuse(format!(
                "{} ({}) has been released",
                self.id(),
                self.kind()
            )));
        }
        Ok(())
    }

    /// Fails unless the view is a live fork
    pub fn check_can_modify(&self) -> StorageResult<()> {
        self.check_usable()?;
        if self.kind() != ViewKind::Fork {
            return Err(StorageError::UnsupportedOperation(format!(
                "{} is a read-only snapshot",
                self.id()
            )));
        }
        Ok(())
    }

    fn read_state(&self) -> StorageResult<RwLockReadGuard<'_, ViewState>> {
        self.check_usable()?;
        self.inner.state.read().map_err(handle_poison)
    }

    fn write_state(&self) -> StorageResult<RwLockWriteGuard<'_, ViewState>> {
        self.check_can_modify()?;
        self.inner.state.write().map_err(handle_poison)
    }

    /// Remove and return the staged changes; used by merge
    pub(crate) fn take_changes(&self) -> StorageResult<Changes> {
        let mut state = self.write_state()?;
        state.checkpoints.clear();
        Ok(std::mem::take(&mut state.changes))
    }

    // --- checkpoints ---

    /// Remember the current staged changes of a fork
    ///
    /// Checkpoints nest: each call pushes a new save point on top of the
    /// earlier ones.
    pub fn checkpoint(&self) -> StorageResult<Checkpoint> {
        let mut state = self.write_state()?;
        let id = state.next_checkpoint;
        state.next_checkpoint += 1;
        let saved = state.changes.clone();
        state.checkpoints.push((id, saved));
        debug!(view = %self.id(), checkpoint = id, depth = state.checkpoints.len(), "checkpoint created");
        Ok(Checkpoint { view: self.id(), id })
    }

    /// Revert a fork to its most recent checkpoint, or drop all staged
    /// changes when there is none
    ///
    /// The checkpoint stays in place. Every index of the view is considered
    /// modified afterwards.
    pub fn rollback(&self) -> StorageResult<()> {
        {
            let mut state = self.write_state()?;
            let restored = state
                .checkpoints
                .last()
                .map(|(_, changes)| changes.clone())
                .unwrap_or_default();
            state.changes = restored;
        }
        self.inner.tracker.notify_view_modified(self.id());
        warn!(view = %self.id(), "fork rolled back");
        Ok(())
    }

    /// Revert a fork to `checkpoint`, dropping it and every later checkpoint
    ///
    /// Fails with `InvalidArgument` if the checkpoint belongs to another view
    /// or was already consumed.
    pub fn rollback_to(&self, checkpoint: Checkpoint) -> StorageResult<()> {
        {
            let mut state = self.write_state()?;
            let position = self.checkpoint_position(&state, &checkpoint)?;
            let mut dropped = state.checkpoints.split_off(position);
            state.changes = dropped.swap_remove(0).1;
        }
        self.inner.tracker.notify_view_modified(self.id());
        warn!(view = %self.id(), checkpoint = checkpoint.id, "fork rolled back to checkpoint");
        Ok(())
    }

    /// Keep the staged changes and forget `checkpoint` and every later one
    pub fn discard_checkpoint(&self, checkpoint: Checkpoint) -> StorageResult<()> {
        let mut state = self.write_state()?;
        let position = self.checkpoint_position(&state, &checkpoint)?;
        state.checkpoints.truncate(position);
        debug!(view = %self.id(), checkpoint = checkpoint.id, "checkpoint discarded");
        Ok(())
    }

    fn checkpoint_position(&self, state: &ViewState, checkpoint: &Checkpoint) -> StorageResult<usize> {
        if checkpoint.view != self.id() {
            return Err(StorageError::InvalidArgument(format!(
                "checkpoint of {} used on {}",
                checkpoint.view,
                self.id()
            )));
        }
        state
            .checkpoints
            .iter()
            .position(|(id, _)| *id == checkpoint.id)
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!(
                    "checkpoint {} of {} was already consumed",
                    checkpoint.id,
                    self.id()
                ))
            })
    }

    // --- raw byte-level access ---

    /// Value stored under `key`
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let state = self.read_state()?;
        Ok(match state.changes.get(key) {
            Some(staged) => staged.clone(),
            None => state.base.get(key).cloned(),
        })
    }

    pub fn contains(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Stage a value; fork only
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.write_state()?.changes.insert(key, Some(value));
        Ok(())
    }

    /// Stage a deletion; fork only
    pub fn remove(&self, key: &[u8]) -> StorageResult<()> {
        self.write_state()?.changes.insert(key.to_vec(), None);
        Ok(())
    }

    /// Stage deletion of every key starting with `prefix`; fork only
    pub fn remove_prefix(&self, prefix: &[u8]) -> StorageResult<()> {
        let mut state = self.write_state()?;
        let mut keys: Vec<Vec<u8>> = prefixed_keys(&state.base, prefix);
        keys.extend(
            state
                .changes
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .filter(|(_, v)| v.is_some())
                .map(|(k, _)| k.clone()),
        );
        for key in keys {
            state.changes.insert(key, None);
        }
        Ok(())
    }

    /// First entry whose key starts with `prefix` and lies after `from`
    ///
    /// `Bound::Unbounded` starts at the beginning of the prefix.
    pub fn next_entry(
        &self,
        prefix: &[u8],
        from: Bound<&[u8]>,
    ) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let state = self.read_state()?;
        let lower = match from {
            Bound::Included(key) => Bound::Included(key.to_vec()),
            Bound::Excluded(key) => Bound::Excluded(key.to_vec()),
            Bound::Unbounded => Bound::Included(prefix.to_vec()),
        };
        let range = (lower, Bound::Unbounded);

        let from_base = state
            .base
            .range::<Vec<u8>, _>(range.clone())
            .take_while(|(k, _)| k.starts_with(prefix))
            .find(|(k, _)| !matches!(state.changes.get(*k), Some(None)))
            .map(|(k, v)| (k.clone(), v.clone()));

        let from_changes = state
            .changes
            .range::<Vec<u8>, _>(range)
            .take_while(|(k, _)| k.starts_with(prefix))
            .find_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())));

        // A staged overwrite of a base key is always found in `changes` first.
        Ok(match (from_base, from_changes) {
            (Some(b), Some(c)) => Some(if c.0 <= b.0 { c } else { b }),
            (b, None) => b,
            (None, c) => c,
        })
    }
}

fn prefixed_keys(tree: &Tree, prefix: &[u8]) -> Vec<Vec<u8>> {
    tree.range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("released", &self.is_released())
            .finish()
    }
}
