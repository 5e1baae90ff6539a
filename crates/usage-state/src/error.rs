//! Error types for the usage ledger.

use thiserror::Error;

/// Result type alias for usage ledger operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while opening or reading the usage ledger.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("malformed usage record: expected {expected} value bytes, found {found}")]
    MalformedRecord { expected: usize, found: usize },
}
