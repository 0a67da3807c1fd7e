//! Error types for the wallet store

use thiserror::Error;

/// Result type for wallet store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Wallet not provisioned for this user
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Wallet already provisioned for this user
    #[error("Wallet already exists: {0}")]
    WalletExists(String),

    /// Ledger entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Compare-and-swap lost to a concurrent committed mutation
    #[error("Version conflict for {user_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Wallet owner
        user_id: String,
        /// Version the caller read its snapshot at
        expected: u64,
        /// Version actually stored
        actual: u64,
    },

    /// External reference already settled
    #[error("Duplicate external ref: {0}")]
    DuplicateExternalRef(String),

    /// Entry or wallet fields rejected by store-side validation
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
