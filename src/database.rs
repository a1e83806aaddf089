//! Database handle
//!
//! A [`Database`] owns exactly one storage connection together with the
//! transaction state of that connection. It is `Send` but not `Sync`: move it
//! to another thread if needed, but open one handle per thread for concurrent
//! work.

use std::sync::Arc;

use crate::catalog::entity::Entity;
use crate::catalog::schema_management::{LiveColumn, Policy, SchemaReconciler};
use crate::catalog::table::Table;
use crate::common::config::DatabaseConfig;
use crate::common::logging::{LogFacade, LogSink};
use crate::query::executor::engine::ExecutionEngine;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::handle::Query;
use crate::transaction::TransactionManager;

pub struct Database {
    engine: ExecutionEngine,
    transactions: TransactionManager,
}

impl Database {
    /// Open a database whose events go to the `log` facade
    pub fn open(config: &DatabaseConfig) -> QueryResult<Self> {
        Self::open_with_log(config, Arc::new(LogFacade))
    }

    /// Open a database whose events go to the given sink
    pub fn open_with_log(config: &DatabaseConfig, log: Arc<dyn LogSink>) -> QueryResult<Self> {
        Ok(Database {
            engine: ExecutionEngine::open(config, log)?,
            transactions: TransactionManager::new(),
        })
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Create or reconcile the table for `T` under `policy` and return its handle
    pub fn create<T: Entity>(&self, policy: Policy) -> QueryResult<Query<'_, T>> {
        let table = Table::resolve::<T>()?;
        self.reconciler().create_or_reconcile(&table, policy)?;
        Ok(Query::new(self, table))
    }

    /// Like [`Database::create`], with `primary_key` overriding the declared key.
    ///
    /// The override lives only in the returned handle. [`Database::table`] and
    /// joins that reach `T` as a child keep using the declared key, which also
    /// decides how joined children are told apart. Keep the returned handle for
    /// queries that depend on the override.
    pub fn create_with_primary_key<T: Entity>(&self, primary_key: &[&str], policy: Policy) -> QueryResult<Query<'_, T>> {
        let table = Table::resolve_with_primary_key::<T>(primary_key)?;
        self.reconciler().create_or_reconcile(&table, policy)?;
        Ok(Query::new(self, table))
    }

    /// Handle on the table for `T`. The table itself is not checked.
    pub fn table<T: Entity>(&self) -> QueryResult<Query<'_, T>> {
        Ok(Query::new(self, Table::resolve::<T>()?))
    }

    /// Run `body` as one atomic unit, returning its value on commit
    pub fn run_in_transaction<R, E, F>(&self, body: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<QueryError>,
    {
        self.transactions.run(&self.engine, body)
    }

    /// Columns of `table_name` as the storage engine has them
    pub fn live_columns(&self, table_name: &str) -> QueryResult<Vec<LiveColumn>> {
        self.reconciler().live_columns(table_name)
    }

    pub fn table_exists(&self, table_name: &str) -> QueryResult<bool> {
        self.reconciler().table_exists(table_name)
    }

    /// Flush the injected log sink
    pub fn flush_log(&self) {
        self.engine.log().flush();
    }

    fn reconciler(&self) -> SchemaReconciler<'_> {
        SchemaReconciler::new(&self.engine, &self.transactions)
    }
}
