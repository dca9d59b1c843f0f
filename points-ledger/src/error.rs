//! Error types for the points ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Unknown user (no aggregate exists)
    #[error("User not found: {0}")]
    NotFound(String),

    /// Bad input: unknown source, non-positive amount, etc.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Spend larger than the current balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Points the caller tried to spend
        requested: u64,
        /// Redeemable balance at the time of the call
        available: u64,
    },

    /// Retryable failure: lock timeout or commit failure after retries
    #[error("Transient error: {0}")]
    Transient(String),

    /// Audit replay disagreed with the stored aggregate
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may safely retry the operation as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transient("lock timeout".to_string()).is_transient());
        assert!(!Error::NotFound("u-1".to_string()).is_transient());
        assert!(!Error::InsufficientBalance {
            requested: 100,
            available: 20
        }
        .is_transient());
    }
}
