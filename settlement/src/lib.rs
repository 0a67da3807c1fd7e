//! Settlement Engine
//!
//! Atomic wallet settlement for the PanelPay storefront: crediting
//! gateway-confirmed funds and debiting for placed orders.
//!
//! # Architecture
//!
//! 1. **Guard**: per-user lock serializes a user's mutations
//! 2. **Snapshot**: wallet is read and validated at one version
//! 3. **Commit**: wallet update + ledger entry (+ order) land in one batch,
//!    accepted only if the version still matches
//! 4. **Replay**: an already-settled payment reference returns its prior
//!    receipt instead of applying twice
//!
//! # Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use settlement::{Config, CreditRequest, SettlementEngine, UserId};
//!
//! #[tokio::main]
//! async fn main() -> settlement::Result<()> {
//!     let engine = SettlementEngine::new(Config::default())?;
//!
//!     let user = UserId::new("user-1");
//!     engine.create_wallet(&user).await?;
//!
//!     let receipt = engine
//!         .credit_funds(
//!             CreditRequest::new(user.clone(), Decimal::new(10000, 2), "Wallet Top-up")
//!                 .with_external_ref("PP_1"),
//!         )
//!         .await?;
//!     println!("balance: {}", receipt.wallet.balance);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod idempotency;
pub mod types;

// Re-exports
pub use catalog::{Catalog, Service};
pub use config::Config;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use types::*;
