// Bayun CRUD: typed records over an embedded SQL engine

pub mod common;
pub mod query;
pub mod transaction;
pub mod catalog;
pub mod database;

// Re-export key items for convenient access
pub use catalog::{ColumnType, Entity, FieldDef, Policy, Relation, RowReader};
pub use common::{DatabaseConfig, JournalMode, LogCollector, LogEvent, LogFacade, LogSink};
pub use database::Database;
pub use query::ast::{ColumnRef, Expr, PatternMatch, all, any, col, field};
pub use query::executor::engine::ExecutionEngine;
pub use query::executor::result::{DataValue, QueryError, QueryResult};
pub use query::handle::Query;
