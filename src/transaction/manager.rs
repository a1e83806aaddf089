// Transaction Coordinator
//
// Wraps a unit of work in one storage transaction. Nested units join the
// outermost one; there are no savepoints, so a failure anywhere in the nest
// rolls back the whole unit.

use std::cell::Cell;

use log::Level;

use crate::common::logging::{EventCategory, LogEvent};
use crate::query::executor::engine::ExecutionEngine;
use crate::query::executor::result::QueryError;

/// Transaction ID type
pub type TxnId = u64;

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction is open; statements autocommit
    Idle,
    /// A transaction is open
    Active,
    /// A nested unit failed; the outermost unit can only roll back
    RollbackOnly,
}

/// Tracks the transaction open on one connection
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: Cell<TxnId>,
    /// Nesting depth of `run` calls
    depth: Cell<u32>,
    /// Set when a nested unit failed
    rollback_only: Cell<bool>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: Cell::new(1),
            depth: Cell::new(0),
            rollback_only: Cell::new(false),
        }
    }

    pub fn state(&self) -> TransactionState {
        match (self.depth.get(), self.rollback_only.get()) {
            (0, _) => TransactionState::Idle,
            (_, true) => TransactionState::RollbackOnly,
            (_, false) => TransactionState::Active,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.depth.get() > 0
    }

    /// Run `body` inside a transaction on `engine`.
    ///
    /// The outermost call begins the transaction, commits when `body` returns
    /// `Ok` and rolls back when it returns `Err` or panics. Inner calls only run
    /// their body; an inner failure marks the unit rollback-only.
    pub fn run<R, E, F>(&self, engine: &ExecutionEngine, body: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<QueryError>,
    {
        if self.in_transaction() {
            self.depth.set(self.depth.get() + 1);
            let result = body();
            self.depth.set(self.depth.get() - 1);
            if result.is_err() {
                self.rollback_only.set(true);
            }
            return result;
        }

        let txn_id = self.next_txn_id.get();
        self.next_txn_id.set(txn_id + 1);
        engine.execute_control("BEGIN")?;
        self.depth.set(1);
        self.rollback_only.set(false);

        let mut guard = ScopeGuard { manager: self, engine, txn_id, armed: true };
        let result = body();
        guard.armed = false;
        drop(guard);

        let rollback_only = self.rollback_only.replace(false);
        self.depth.set(0);

        match result {
            Ok(value) if !rollback_only => match engine.execute_control("COMMIT") {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.rollback(engine, txn_id, "commit failed");
                    Err(e.into())
                }
            },
            Ok(_) => {
                self.rollback(engine, txn_id, "nested unit failed");
                Err(QueryError::TransactionError(format!(
                    "transaction {} rolled back because a nested unit failed",
                    txn_id
                ))
                .into())
            }
            Err(e) => {
                self.rollback(engine, txn_id, "body failed");
                Err(e)
            }
        }
    }

    fn rollback(&self, engine: &ExecutionEngine, txn_id: TxnId, reason: &str) {
        // The engine may already have rolled back on its own (e.g. SQLITE_FULL)
        if engine.is_autocommit() {
            return;
        }
        if let Err(e) = engine.execute_control("ROLLBACK") {
            engine.emit(LogEvent::new(
                Level::Error,
                EventCategory::Transaction,
                format!("rollback of transaction {} failed: {}", txn_id, e),
            ));
            return;
        }
        engine.emit(LogEvent::new(
            Level::Warn,
            EventCategory::Transaction,
            format!("transaction {} rolled back: {}", txn_id, reason),
        ));
    }
}

// Rolls back if the body unwinds
struct ScopeGuard<'a> {
    manager: &'a TransactionManager,
    engine: &'a ExecutionEngine,
    txn_id: TxnId,
    armed: bool,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.depth.set(0);
            self.manager.rollback_only.set(false);
            self.manager.rollback(self.engine, self.txn_id, "body panicked");
        }
    }
}
