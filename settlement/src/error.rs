//! Error types for the settlement engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Wallet store error
    #[error("Ledger error: {0}")]
    Ledger(#[from] wallet_core::Error),

    /// Non-positive or malformed amount, rejected before touching the store
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Debit exceeds the balance; no mutation occurred
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Spendable balance at the checked snapshot
        available: Decimal,
        /// Price the debit asked for
        requested: Decimal,
    },

    /// External reference already settled with a different outcome
    #[error("Duplicate payment reference: {0}")]
    DuplicatePayment(String),

    /// Lost a concurrency race beyond the retry budget
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service id not present in the catalog
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Service exists but is not currently sold
    #[error("Service not active: {0}")]
    ServiceInactive(String),

    /// Quantity outside the service bounds
    #[error("Quantity {quantity} outside [{min}, {max}] for {service}")]
    QuantityOutOfRange {
        /// Service id
        service: String,
        /// Requested quantity
        quantity: u32,
        /// Minimum allowed
        min: u32,
        /// Maximum allowed
        max: u32,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller may retry with fresh data
    ///
    /// `WalletNotFound` is a provisioning fault upstream and is never
    /// transient; everything storage- or race-shaped is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Conflict(_) | Error::Ledger(wallet_core::Error::Storage(_))
        )
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Conflict("lost race".to_string()).is_transient());
        assert!(Error::Ledger(wallet_core::Error::Storage("io".to_string())).is_transient());
        assert!(
            !Error::Ledger(wallet_core::Error::WalletNotFound("u1".to_string())).is_transient()
        );
        assert!(!Error::InvalidAmount(Decimal::ZERO).is_transient());
    }
}
