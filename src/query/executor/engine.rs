// Statement Execution Engine
//
// Binds parameters positionally, runs statements against the storage
// connection and hands back raw rows or affected-row counts.

use std::sync::Arc;
use std::time::Instant;

use log::Level;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::common::config::DatabaseConfig;
use crate::common::logging::{EventCategory, LogEvent, LogSink};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, ResultRow};

/// What a statement is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows
    Query,
    /// Returns an affected-row count
    Command,
    /// Changes the schema
    Ddl,
}

impl StatementKind {
    fn category(self) -> EventCategory {
        match self {
            StatementKind::Query => EventCategory::Query,
            StatementKind::Command => EventCategory::Command,
            StatementKind::Ddl => EventCategory::Ddl,
        }
    }
}

/// SQL text plus its ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<DataValue>,
    pub kind: StatementKind,
}

impl SqlStatement {
    pub fn query(sql: impl Into<String>, params: Vec<DataValue>) -> Self {
        SqlStatement { sql: sql.into(), params, kind: StatementKind::Query }
    }

    pub fn command(sql: impl Into<String>, params: Vec<DataValue>) -> Self {
        SqlStatement { sql: sql.into(), params, kind: StatementKind::Command }
    }

    pub fn ddl(sql: impl Into<String>) -> Self {
        SqlStatement { sql: sql.into(), params: Vec::new(), kind: StatementKind::Ddl }
    }
}

/// Executes statements on the single connection owned by a database handle
pub struct ExecutionEngine {
    connection: Connection,
    log: Arc<dyn LogSink>,
}

impl ExecutionEngine {
    /// Open the connection described by `config` and apply its pragmas
    pub fn open(config: &DatabaseConfig, log: Arc<dyn LogSink>) -> QueryResult<Self> {
        let connection = match &config.path {
            Some(path) => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| QueryError::execution("open", e))?;

        connection
            .busy_timeout(config.busy_timeout())
            .map_err(|e| QueryError::execution("PRAGMA busy_timeout", e))?;
        connection
            .pragma_update_and_check(None, "journal_mode", config.journal_mode.pragma_value(), |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| QueryError::execution("PRAGMA journal_mode", e))?;
        connection
            .pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(|e| QueryError::execution("PRAGMA foreign_keys", e))?;

        log.record(LogEvent::new(
            Level::Info,
            EventCategory::Transaction,
            format!(
                "opened {}",
                config.path.as_ref().map_or("in-memory database".to_string(), |p| p.display().to_string())
            ),
        ));

        Ok(ExecutionEngine { connection, log })
    }

    pub fn log(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    pub(crate) fn emit(&self, event: LogEvent) {
        self.log.record(event);
    }

    /// Run a row-returning statement, handing each row to `on_row` as it arrives
    pub fn query_each<F>(&self, statement: &SqlStatement, mut on_row: F) -> QueryResult<()>
    where
        F: FnMut(ResultRow) -> QueryResult<()>,
    {
        let started = Instant::now();
        let mut prepared = self.prepare(statement)?;
        let column_count = prepared.column_count();
        let mut rows = prepared
            .query(params_from_iter(statement.params.iter()))
            .map_err(|e| QueryError::execution(&statement.sql, e))?;

        let mut row_count = 0usize;
        while let Some(row) = rows.next().map_err(|e| QueryError::execution(&statement.sql, e))? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(|e| QueryError::execution(&statement.sql, e))?;
                values.push(DataValue::from_value_ref(value)?);
            }
            row_count += 1;
            on_row(ResultRow::new(values))?;
        }

        self.trace(statement, format!("{} rows in {:?}", row_count, started.elapsed()));
        Ok(())
    }

    /// Run a row-returning statement and collect its rows
    pub fn query(&self, statement: &SqlStatement) -> QueryResult<Vec<ResultRow>> {
        let mut rows = Vec::new();
        self.query_each(statement, |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Run a statement that returns a single integer, such as a count
    pub fn query_scalar(&self, statement: &SqlStatement) -> QueryResult<i64> {
        let rows = self.query(statement)?;
        match rows.first().and_then(|r| r.get(0)) {
            Some(DataValue::Integer(i)) => Ok(*i),
            Some(other) => Err(QueryError::DecodingError(format!(
                "expected integer scalar, found {}",
                other.type_name()
            ))),
            None => Err(QueryError::DecodingError("scalar query returned no rows".to_string())),
        }
    }

    /// Run a command or DDL statement, returning the affected-row count
    pub fn execute(&self, statement: &SqlStatement) -> QueryResult<usize> {
        let started = Instant::now();
        let mut prepared = self.prepare(statement)?;
        let changed = prepared
            .execute(params_from_iter(statement.params.iter()))
            .map_err(|e| QueryError::execution(&statement.sql, e))?;
        self.trace(statement, format!("{} rows affected in {:?}", changed, started.elapsed()));
        Ok(changed)
    }

    /// Run parameterless control statements such as `BEGIN` or `COMMIT`
    pub(crate) fn execute_control(&self, sql: &str) -> QueryResult<()> {
        self.connection
            .execute_batch(sql)
            .map_err(|e| QueryError::execution(sql, e))?;
        self.emit(LogEvent::new(Level::Debug, EventCategory::Transaction, sql));
        Ok(())
    }

    pub(crate) fn is_autocommit(&self) -> bool {
        self.connection.is_autocommit()
    }

    fn prepare(&self, statement: &SqlStatement) -> QueryResult<rusqlite::CachedStatement<'_>> {
        let prepared = self
            .connection
            .prepare_cached(&statement.sql)
            .map_err(|e| QueryError::execution(&statement.sql, e))?;
        let expected = prepared.parameter_count();
        if expected != statement.params.len() {
            self.emit(
                LogEvent::new(Level::Error, statement.kind.category(), "parameter count mismatch")
                    .with_statement(&statement.sql, &statement.params),
            );
            return Err(QueryError::BindingError {
                expected,
                actual: statement.params.len(),
            });
        }
        Ok(prepared)
    }

    fn trace(&self, statement: &SqlStatement, outcome: String) {
        let level = match statement.kind {
            StatementKind::Ddl => Level::Info,
            _ => Level::Debug,
        };
        self.emit(
            LogEvent::new(level, statement.kind.category(), outcome)
                .with_statement(&statement.sql, &statement.params),
        );
    }
}
