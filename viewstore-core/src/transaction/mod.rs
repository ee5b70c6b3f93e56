/*
    Transaction execution over a fork

    The executor checkpoints the fork before running a transaction and rolls
    it back to that checkpoint when the transaction fails, so a failed
    transaction leaves no trace in the fork. Transactions may take their own
    checkpoints; those nest above the executor's and are dropped with it.
    Rolling back counts as a modification of every index touched in the
    fork: open iterators over them fail on their next pull.
*/

use crate::metrics::{names, record_counter, Timer};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::indices::{ListIndex, MapIndex};
use crate::storage::value::{StorageKey, StorageValue};
use crate::storage::view::View;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failure of a transaction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

impl ExecutionError {
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecutionError::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A unit of work applied to a fork
pub trait Transaction {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn execute(&self, context: &TransactionContext) -> Result<(), ExecutionError>;
}

/// What a running transaction may access
#[derive(Debug)]
pub struct TransactionContext {
    fork: View,
}

impl TransactionContext {
    pub fn fork(&self) -> &View {
        &self.fork
    }

    pub fn list<V: StorageValue>(&self, name: &str) -> StorageResult<ListIndex<V>> {
        ListIndex::new(name, &self.fork)
    }

    pub fn map<K: StorageKey, V: StorageValue>(&self, name: &str) -> StorageResult<MapIndex<K, V>> {
        MapIndex::new(name, &self.fork)
    }
}

/// Runs transactions against one fork
#[derive(Debug)]
pub struct TransactionExecutor {
    context: TransactionContext,
}

impl TransactionExecutor {
    /// Executor over `fork`; fails with `UnsupportedOperation` for a snapshot
    pub fn new(fork: View) -> StorageResult<Self> {
        fork.check_can_modify()?;
        Ok(TransactionExecutor {
            context: TransactionContext { fork },
        })
    }

    pub fn fork(&self) -> &View {
        self.context.fork()
    }

    /// Run `tx`; on failure revert every change it made and return its error
    pub fn execute(&self, tx: &dyn Transaction) -> Result<(), ExecutionError> {
        let fork = self.context.fork();
        let checkpoint = fork.checkpoint()?;
        let timer = Timer::new(names::TX_DURATION);

        let result = tx.execute(&self.context);
        timer.stop();

        match result {
            Ok(()) => {
                fork.discard_checkpoint(checkpoint)?;
                record_counter(names::TX_EXECUTED, 1);
                debug!(tx = tx.name(), view = %fork.id(), "transaction executed");
                Ok(())
            }
            Err(err) => {
                warn!(tx = tx.name(), view = %fork.id(), error = %err, "transaction failed, rolling back");
                if let Err(rollback_err) = fork.rollback_to(checkpoint) {
                    error!(tx = tx.name(), error = %rollback_err, "rollback failed");
                    return Err(rollback_err.into());
                }
                record_counter(names::TX_ROLLED_BACK, 1);
                Err(err)
            }
        }
    }
}

/// Clears the given indexes, then always fails
///
/// The executor must restore everything it cleared.
#[derive(Debug, Clone)]
pub struct ClearAllThenFail {
    lists: Vec<String>,
    maps: Vec<String>,
    seed: u64,
}

impl ClearAllThenFail {
    pub fn new(lists: Vec<String>, maps: Vec<String>, seed: u64) -> Self {
        ClearAllThenFail { lists, maps, seed }
    }
}

impl Transaction for ClearAllThenFail {
    fn name(&self) -> &str {
        "clear_all_then_fail"
    }

    fn execute(&self, context: &TransactionContext) -> Result<(), ExecutionError> {
        // Values are never read, so the element type does not matter.
        for name in &self.lists {
            context.list::<Vec<u8>>(name)?.clear()?;
        }
        for name in &self.maps {
            context.map::<Vec<u8>, Vec<u8>>(name)?.clear()?;
        }
        Err(ExecutionError::failed(
            self.name(),
            format!("always fails after clearing (seed {})", self.seed),
        ))
    }
}
