// Transaction Management Module

pub mod manager;

// Public exports
pub use manager::{TransactionManager, TransactionState, TxnId};
