// Query Module
//
// Expression tree, SQL planning, statement execution and the typed query
// handle that ties them together.

pub mod ast;
pub mod planner;
pub mod executor;
pub mod handle;

// Export key public interfaces
pub use ast::{ColumnRef, Expr, col, field};
pub use executor::engine::ExecutionEngine;
pub use executor::result::QueryResult;
pub use handle::Query;
