//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Append-only history (entries are immutable once written)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier, as issued by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's prepaid wallet
///
/// Created once at signup with a zero balance and mutated only through
/// [`crate::LedgerStore::compare_and_swap_wallet`] or the atomic
/// `commit_*` variants. `version` is the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAccount {
    /// Owning user (unique key)
    pub user_id: UserId,

    /// Current spendable amount
    pub balance: Decimal,

    /// Lifetime sum of credits
    pub total_added: Decimal,

    /// Lifetime sum of debits
    pub total_spent: Decimal,

    /// Monotonic mutation counter; bumped by every committed write
    pub version: u64,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// Fresh zero wallet for a newly signed-up user
    pub fn new(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            total_added: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            version: 0,
            updated_at: at,
        }
    }

    /// Check the balance identity: `balance == total_added - total_spent`
    pub fn is_consistent(&self) -> bool {
        self.balance == self.total_added - self.total_spent
    }

    /// Fields after applying a credit to this snapshot
    pub fn credited(&self, amount: Decimal, at: DateTime<Utc>) -> WalletFields {
        WalletFields {
            balance: self.balance + amount,
            total_added: self.total_added + amount,
            total_spent: self.total_spent,
            updated_at: at,
        }
    }

    /// Fields after applying a debit to this snapshot
    pub fn debited(&self, amount: Decimal, at: DateTime<Utc>) -> WalletFields {
        WalletFields {
            balance: self.balance - amount,
            total_added: self.total_added,
            total_spent: self.total_spent + amount,
            updated_at: at,
        }
    }
}

/// The mutable portion of a wallet, as submitted to a compare-and-swap
///
/// The store re-checks the balance identity and sign before accepting it,
/// and assigns the next version itself.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletFields {
    /// New spendable amount
    pub balance: Decimal,

    /// New lifetime credit sum
    pub total_added: Decimal,

    /// New lifetime debit sum
    pub total_spent: Decimal,

    /// Mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Funds added to the wallet
    Credit = 1,
    /// Funds spent from the wallet
    Debit = 2,
}

impl EntryKind {
    /// Lowercase name as stored by the reporting collaborator
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }
}

/// Outcome recorded on a ledger entry
///
/// Entries are written only after the outcome is known; there is no
/// pending state for money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// The wallet mutation committed
    Completed = 1,
    /// The payment was denied upstream; no wallet mutation occurred
    Failed = 2,
}

/// One immutable monetary event tied to a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Wallet this entry belongs to
    pub user_id: UserId,

    /// Credit or debit
    pub kind: EntryKind,

    /// Positive magnitude; sign implied by `kind`
    pub amount: Decimal,

    /// Human-readable description, e.g. "Instagram Followers - Order ..."
    pub description: String,

    /// Outcome; only `Completed` entries count toward the balance
    pub status: EntryStatus,

    /// Payment/idempotency reference from the gateway, unique when present
    pub external_ref: Option<String>,

    /// Payment method label, e.g. "card"
    pub payment_method: Option<String>,

    /// Order paid for by this entry (debits only)
    pub order_id: Option<Uuid>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// New completed credit entry
    pub fn credit(user_id: UserId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            user_id,
            kind: EntryKind::Credit,
            amount,
            description: description.into(),
            status: EntryStatus::Completed,
            external_ref: None,
            payment_method: None,
            order_id: None,
            created_at: Utc::now(),
        }
    }

    /// New completed debit entry paying for `order_id`
    pub fn debit(
        user_id: UserId,
        amount: Decimal,
        description: impl Into<String>,
        order_id: Uuid,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            user_id,
            kind: EntryKind::Debit,
            amount,
            description: description.into(),
            status: EntryStatus::Completed,
            external_ref: None,
            payment_method: None,
            order_id: Some(order_id),
            created_at: Utc::now(),
        }
    }

    /// Attach the gateway reference
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Attach the payment method label
    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    /// Mark the entry as a denied payment (audit row, no wallet mutation)
    pub fn declined(mut self) -> Self {
        self.status = EntryStatus::Failed;
        self
    }

    /// Amount signed by kind: positive for credits, negative for debits
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            EntryKind::Credit => self.amount,
            EntryKind::Debit => -self.amount,
        }
    }

    /// Whether this entry counts toward the balance
    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }
}

/// Order lifecycle status
///
/// Transitions past `Pending` are driven by the fulfilment collaborator;
/// the settlement core only ever creates `Pending` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    /// Created, not yet picked up by fulfilment
    Pending = 1,
    /// Being delivered
    Processing = 2,
    /// Fully delivered (terminal)
    Completed = 3,
    /// Cancelled (terminal)
    Cancelled = 4,
}

impl OrderStatus {
    /// Check if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Lowercase name as shown by the storefront
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A placed order, created atomically with the debit that paid for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (UUIDv7)
    pub order_id: Uuid,

    /// Ordering user
    pub user_id: UserId,

    /// Catalog service id, e.g. "ig-followers"
    pub service: String,

    /// Units ordered
    pub quantity: u32,

    /// Profile or post the service is delivered to
    pub target_url: String,

    /// Price paid, as debited from the wallet
    pub price: Decimal,

    /// Lifecycle status
    pub status: OrderStatus,

    /// Follower/view count at delivery start
    pub start_count: u32,

    /// Units still to deliver
    pub remains: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Filter for ledger entry listings
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Only entries of this kind
    pub kind: Option<EntryKind>,

    /// Only entries with this status
    pub status: Option<EntryStatus>,

    /// Only entries created at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// At most this many entries (applied newest-first)
    pub limit: Option<usize>,
}

impl EntryFilter {
    /// Filter down to completed entries only
    pub fn completed() -> Self {
        Self {
            status: Some(EntryStatus::Completed),
            ..Self::default()
        }
    }

    /// Check a single entry against the filter (ignores `limit`)
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.kind.map_or(true, |kind| entry.kind == kind)
            && self.status.map_or(true, |status| entry.status == status)
            && self.since.map_or(true, |since| entry.created_at >= since)
    }
}

/// Filter for order listings
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Only orders with this status
    pub status: Option<OrderStatus>,

    /// At most this many orders (applied newest-first)
    pub limit: Option<usize>,
}

impl OrderFilter {
    /// Check a single order against the filter (ignores `limit`)
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |status| order.status == status)
    }
}

/// Aggregate of completed entries over a period, for the wallet stats panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// Sum of completed credit amounts
    pub added: Decimal,

    /// Sum of completed debit amounts
    pub spent: Decimal,

    /// Number of completed entries
    pub count: u64,
}

impl EntrySummary {
    /// Net movement over the period
    pub fn net(&self) -> Decimal {
        self.added - self.spent
    }
}
