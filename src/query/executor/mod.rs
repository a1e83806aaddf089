// Query Executor Module
//
// Statement generation, execution against the storage connection, and
// decoding of result rows into records.

pub mod engine;
pub mod result;
pub mod ddl_executor;
pub mod dml_executor;
pub mod hydrate;

// Export key types
pub use self::engine::{ExecutionEngine, SqlStatement, StatementKind};
pub use self::result::{DataValue, QueryError, QueryResult, ResultRow};
