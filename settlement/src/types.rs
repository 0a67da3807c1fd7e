//! Core types for the settlement engine

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wallet_core::types::{LedgerEntry, Order, OrderStatus, WalletAccount};

/// User identifier
pub type UserId = wallet_core::types::UserId;

/// A funds top-up request from the payment collaborator
///
/// The gateway has already confirmed the payment when this is submitted;
/// `external_ref` is its confirmation id and makes the credit idempotent
/// under retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    /// Wallet to credit
    pub user_id: UserId,

    /// Amount to add (positive)
    pub amount: Decimal,

    /// Ledger entry description, e.g. "Wallet Top-up via Credit Card"
    pub description: String,

    /// Gateway confirmation id (idempotency reference)
    pub external_ref: Option<String>,

    /// Payment method label, e.g. "card"
    pub payment_method: Option<String>,
}

impl CreditRequest {
    /// New credit request
    pub fn new(user_id: UserId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            external_ref: None,
            payment_method: None,
        }
    }

    /// Attach the gateway confirmation id
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Attach the payment method label
    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }
}

/// Result of a committed (or replayed) credit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReceipt {
    /// Wallet after the credit
    pub wallet: WalletAccount,

    /// The settled ledger entry
    pub entry: LedgerEntry,

    /// True when the reference was already settled and nothing was applied
    pub replayed: bool,
}

/// An order about to be placed, as submitted by the order collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Catalog service id, e.g. "ig-followers"
    pub service: String,

    /// Units ordered
    pub quantity: u32,

    /// Profile or post the service is delivered to
    pub target_url: String,

    /// Price to debit (positive)
    pub price: Decimal,

    /// Optional label for the debit entry; defaults to the service id
    pub description: Option<String>,
}

impl OrderDraft {
    /// New order draft
    pub fn new(
        service: impl Into<String>,
        quantity: u32,
        target_url: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            service: service.into(),
            quantity,
            target_url: target_url.into(),
            price,
            description: None,
        }
    }

    /// Attach a human-readable label for the debit entry
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Materialize the pending order this draft describes
    pub fn to_order(&self, user_id: UserId) -> Order {
        Order {
            order_id: Uuid::now_v7(),
            user_id,
            service: self.service.clone(),
            quantity: self.quantity,
            target_url: self.target_url.clone(),
            price: self.price,
            status: OrderStatus::Pending,
            start_count: 0,
            remains: self.quantity,
            created_at: Utc::now(),
        }
    }
}

/// Result of a committed debit: the order and the money trail behind it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitReceipt {
    /// The created order, status `Pending`
    pub order: Order,

    /// Wallet after the debit
    pub wallet: WalletAccount,

    /// The debit ledger entry referencing the order
    pub entry: LedgerEntry,
}
