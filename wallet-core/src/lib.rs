//! PanelPay Wallet Core
//!
//! Durable prepaid-wallet bookkeeping: one wallet per user, an append-only
//! ledger of monetary entries, and orders created atomically with the debit
//! that paid for them.
//!
//! # Architecture
//!
//! - **Compare-and-swap**: the wallet row is the only mutable state and is
//!   mutated exclusively through a version-checked swap
//! - **Append-only ledger**: entries are never modified or deleted
//! - **Atomic commits**: wallet update, ledger entry, and order land in one
//!   RocksDB write batch or not at all
//!
//! # Invariants
//!
//! - `balance == total_added - total_spent` between operations
//! - `balance` never goes negative
//! - Σ(credits) − Σ(debits) over completed entries equals the balance
//! - At most one committed mutation proceeds from a given wallet version

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use storage::LedgerStore;
pub use types::{
    EntryFilter, EntryKind, EntryStatus, EntrySummary, LedgerEntry, Order, OrderFilter,
    OrderStatus, UserId, WalletAccount, WalletFields,
};
