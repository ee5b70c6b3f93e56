/*
    database.rs - In-memory storage engine

    Owns the committed key/value tree and hands out views over it:
    - create_snapshot: read-only view of the tree as of now
    - create_fork:     read-write view staging changes on top of it
    - merge:           apply a fork's staged changes to the tree

    Snapshots share the committed tree through an Arc; merging copies the
    tree on write when a snapshot still holds the previous version, so a
    snapshot never observes later merges.
*/

use crate::config::DatabaseConfig;
use crate::metrics::{names, record_counter, Timer};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::tracker::ModificationTracker;
use crate::storage::view::{Tree, View, ViewId, ViewKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Helper to convert poison errors into StorageError
fn handle_poison<T>(_err: PoisonError<T>) -> StorageError {
    StorageError::Internal("Lock poisoned: a thread panicked while holding the lock".to_string())
}

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory database handing out snapshots and forks
pub struct MemoryDb {
    id: u64,
    committed: RwLock<Arc<Tree>>,
    tracker: Arc<ModificationTracker>,
    config: Arc<DatabaseConfig>,
}

impl MemoryDb {
    /// Create an empty database using the process-wide tracker
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default(), ModificationTracker::global())
    }

    /// Create an empty database with its own tracker
    pub fn with_tracker(tracker: Arc<ModificationTracker>) -> Self {
        Self::with_config(DatabaseConfig::default(), tracker)
    }

    pub fn with_config(config: DatabaseConfig, tracker: Arc<ModificationTracker>) -> Self {
        let id = NEXT_DB_ID.fetch_add(1, Ordering::Relaxed);
        info!(db = id, "database created");
        MemoryDb {
            id,
            committed: RwLock::new(Arc::new(Tree::new())),
            tracker,
            config: Arc::new(config),
        }
    }

    pub fn tracker(&self) -> &Arc<ModificationTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Read-only view of the committed state
    pub fn create_snapshot(&self) -> View {
        self.create_view(ViewKind::Snapshot)
    }

    /// Read-write view on top of the committed state
    pub fn create_fork(&self) -> View {
        self.create_view(ViewKind::Fork)
    }

    fn create_view(&self, kind: ViewKind) -> View {
        let base = Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner));
        let id = ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed));
        debug!(db = self.id, view = %id, kind = %kind, "view created");
        record_counter(names::VIEWS_CREATED, 1);
        View::new(
            id,
            self.id,
            kind,
            base,
            Arc::clone(&self.tracker),
            Arc::clone(&self.config),
        )
    }

    /// Apply the changes staged in `fork` and release it
    ///
    /// Fails with `UnsupportedOperation` for a snapshot, `ResourceMisuse` for
    /// a released fork and `InvalidArgument` for a fork of another database.
    pub fn merge(&self, fork: View) -> StorageResult<()> {
        if fork.db_id() != self.id {
            return Err(StorageError::InvalidArgument(format!(
                "{} belongs to another database",
                fork.id()
            )));
        }
        let timer = Timer::new(names::MERGE_DURATION);
        let changes = fork.take_changes()?;
        let change_count = changes.len();
        {
            let mut committed = self.committed.write().map_err(handle_poison)?;
            let tree = Arc::make_mut(&mut *committed);
            for (key, value) in changes {
                match value {
                    Some(value) => {
                        tree.insert(key, value);
                    }
                    None => {
                        tree.remove(&key);
                    }
                }
            }
        }
        fork.release();
        timer.stop();
        record_counter(names::VIEWS_MERGED, 1);
        debug!(db = self.id, view = %fork.id(), changes = change_count, "fork merged");
        Ok(())
    }

    /// Number of committed entries
    pub fn committed_len(&self) -> usize {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}
