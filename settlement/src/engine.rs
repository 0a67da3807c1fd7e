//! Main settlement engine
//!
//! Orchestrates the two money-moving workflows, crediting funds and
//! debiting for an order, as atomic units against the wallet store.
//!
//! Every mutation follows the same shape: acquire the user's guard, read a
//! wallet snapshot, validate against that exact snapshot, and commit the
//! wallet update together with its ledger entry (and order) in one batch.
//! A losing writer surfaces as a version conflict and retries with a fresh
//! snapshot; it never applies a stale delta.

use crate::{
    catalog::Catalog,
    config::Config,
    guard::UserGuard,
    idempotency::IdempotencyIndex,
    types::{CreditReceipt, CreditRequest, DebitReceipt, OrderDraft},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use uuid::Uuid;
use wallet_core::{
    metrics::Metrics,
    types::{
        EntryFilter, EntryKind, EntryStatus, EntrySummary, LedgerEntry, Order, OrderFilter,
        UserId, WalletAccount,
    },
    LedgerStore,
};

/// Settlement engine
pub struct SettlementEngine {
    /// Wallet store
    store: Arc<LedgerStore>,

    /// Per-user serialization of mutations
    guard: UserGuard,

    /// External reference lookup
    idempotency: IdempotencyIndex,

    /// Read-only service catalog
    catalog: Catalog,

    /// Settlement metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl SettlementEngine {
    /// Create new settlement engine
    pub fn new(config: Config) -> Result<Self> {
        let ledger_config = wallet_core::Config {
            data_dir: config.ledger_data_dir.clone(),
            ..Default::default()
        };
        let store = Arc::new(LedgerStore::open(&ledger_config)?);

        let idempotency = IdempotencyIndex::new(store.clone());
        let metrics =
            Metrics::new().map_err(|e| Error::Other(format!("Metrics registry: {}", e)))?;

        Ok(Self {
            store,
            guard: UserGuard::new(),
            idempotency,
            catalog: Catalog::storefront(),
            metrics,
            config,
        })
    }

    /// Replace the stock catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Settlement metrics, for the scraping collaborator
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The service catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Provision a zero wallet at signup
    pub async fn create_wallet(&self, user_id: &UserId) -> Result<WalletAccount> {
        let wallet = self
            .with_store_retry(|| self.store.create_wallet(user_id))
            .await?;
        Ok(wallet)
    }

    /// Credit funds confirmed by the payment gateway
    ///
    /// Idempotent under `external_ref`: presenting an already-settled
    /// reference with the same amount returns the prior receipt with
    /// `replayed = true` and applies nothing. The same reference with a
    /// different amount fails with `DuplicatePayment`.
    pub async fn credit_funds(&self, request: CreditRequest) -> Result<CreditReceipt> {
        if request.amount <= Decimal::ZERO {
            self.metrics.record_rejection();
            return Err(Error::InvalidAmount(request.amount));
        }

        let _serial = self.guard.acquire(&request.user_id).await;

        if let Some(reference) = request.external_ref.clone() {
            if let Some(prior) = self.idempotency.lookup(&reference)? {
                return self.replay_credit(&request, &reference, prior).await;
            }
        }

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let wallet = self
                .with_store_retry(|| self.store.get_wallet(&request.user_id))
                .await?;
            let fields = wallet.credited(request.amount, Utc::now());

            let mut entry = LedgerEntry::credit(
                request.user_id.clone(),
                request.amount,
                request.description.clone(),
            );
            if let Some(reference) = &request.external_ref {
                entry = entry.with_external_ref(reference.clone());
            }
            if let Some(method) = &request.payment_method {
                entry = entry.with_payment_method(method.clone());
            }

            let committed = self
                .with_store_retry(|| {
                    self.store.commit_credit(
                        &request.user_id,
                        wallet.version,
                        fields.clone(),
                        &entry,
                    )
                })
                .await;

            match committed {
                Ok(updated) => {
                    if let Some(reference) = &request.external_ref {
                        self.idempotency.record(reference, entry.entry_id);
                    }
                    self.metrics.record_credit(started.elapsed().as_secs_f64());
                    tracing::info!(
                        user = %request.user_id,
                        amount = %request.amount,
                        entry = %entry.entry_id,
                        balance = %updated.balance,
                        "Credit committed"
                    );
                    return Ok(CreditReceipt {
                        wallet: updated,
                        entry,
                        replayed: false,
                    });
                }
                Err(wallet_core::Error::VersionConflict { .. })
                    if attempts <= self.config.retry.max_cas_retries =>
                {
                    self.metrics.record_conflict();
                    tracing::debug!(
                        user = %request.user_id,
                        attempts,
                        "Credit lost version race, retrying with fresh snapshot"
                    );
                }
                Err(wallet_core::Error::VersionConflict { .. }) => {
                    return Err(Error::Conflict(format!(
                        "credit for {} exhausted {} attempts",
                        request.user_id, attempts
                    )));
                }
                Err(wallet_core::Error::DuplicateExternalRef(reference)) => {
                    // A racing retry settled the reference first
                    match self.idempotency.lookup(&reference)? {
                        Some(prior) => {
                            return self.replay_credit(&request, &reference, prior).await
                        }
                        None => return Err(Error::DuplicatePayment(reference)),
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Record a payment the gateway denied, as an audit row
    ///
    /// Writes a `Failed` entry and never touches the balance. The denied
    /// reference stays claimed: the gateway will not re-present a denied
    /// confirmation id as a success.
    pub async fn record_declined_credit(
        &self,
        request: CreditRequest,
        reason: &str,
    ) -> Result<LedgerEntry> {
        if request.amount <= Decimal::ZERO {
            self.metrics.record_rejection();
            return Err(Error::InvalidAmount(request.amount));
        }

        let _serial = self.guard.acquire(&request.user_id).await;

        let mut entry = LedgerEntry::credit(
            request.user_id.clone(),
            request.amount,
            format!("{} ({})", request.description, reason),
        )
        .declined();
        if let Some(reference) = &request.external_ref {
            entry = entry.with_external_ref(reference.clone());
        }
        if let Some(method) = &request.payment_method {
            entry = entry.with_payment_method(method.clone());
        }

        match self.with_store_retry(|| self.store.append_entry(&entry)).await {
            Ok(()) => {
                tracing::warn!(
                    user = %request.user_id,
                    amount = %request.amount,
                    reason,
                    "Declined credit recorded"
                );
                Ok(entry)
            }
            Err(wallet_core::Error::DuplicateExternalRef(reference)) => {
                Err(Error::DuplicatePayment(reference))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Debit the wallet to pay for an order, creating the order with it
    ///
    /// The balance check and the decrement are evaluated against the same
    /// wallet snapshot; the commit is rejected if any other mutation got in
    /// between, and the engine re-reads and re-checks before retrying.
    pub async fn debit_for_order(
        &self,
        user_id: &UserId,
        draft: OrderDraft,
    ) -> Result<DebitReceipt> {
        if draft.price <= Decimal::ZERO {
            self.metrics.record_rejection();
            return Err(Error::InvalidAmount(draft.price));
        }

        let _serial = self.guard.acquire(user_id).await;

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let wallet = self
                .with_store_retry(|| self.store.get_wallet(user_id))
                .await?;

            if wallet.balance < draft.price {
                self.metrics.record_rejection();
                tracing::info!(
                    user = %user_id,
                    balance = %wallet.balance,
                    price = %draft.price,
                    "Debit rejected: insufficient balance"
                );
                return Err(Error::InsufficientBalance {
                    available: wallet.balance,
                    requested: draft.price,
                });
            }

            // Order and entry derive from the snapshot the check ran on
            let order = draft.to_order(user_id.clone());
            let label = draft
                .description
                .clone()
                .unwrap_or_else(|| draft.service.clone());
            let entry = LedgerEntry::debit(
                user_id.clone(),
                draft.price,
                format!("{} - Order {}", label, order.order_id),
                order.order_id,
            );
            let fields = wallet.debited(draft.price, Utc::now());

            let committed = self
                .with_store_retry(|| {
                    self.store.commit_debit(
                        user_id,
                        wallet.version,
                        fields.clone(),
                        &order,
                        &entry,
                    )
                })
                .await;

            match committed {
                Ok(updated) => {
                    self.metrics.record_debit(started.elapsed().as_secs_f64());
                    tracing::info!(
                        user = %user_id,
                        order = %order.order_id,
                        price = %draft.price,
                        balance = %updated.balance,
                        "Debit committed, order created"
                    );
                    return Ok(DebitReceipt {
                        order,
                        wallet: updated,
                        entry,
                    });
                }
                Err(wallet_core::Error::VersionConflict { .. })
                    if attempts <= self.config.retry.max_cas_retries =>
                {
                    self.metrics.record_conflict();
                    tracing::debug!(
                        user = %user_id,
                        attempts,
                        "Debit lost version race, retrying with fresh snapshot"
                    );
                }
                Err(wallet_core::Error::VersionConflict { .. }) => {
                    return Err(Error::Conflict(format!(
                        "debit for {} exhausted {} attempts",
                        user_id, attempts
                    )));
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Quote, draft, and debit in one call, the way the storefront orders
    pub async fn place_order(
        &self,
        user_id: &UserId,
        service_id: &str,
        quantity: u32,
        target_url: impl Into<String>,
    ) -> Result<DebitReceipt> {
        let price = self.catalog.quote(service_id, quantity)?;
        let name = self
            .catalog
            .get(service_id)
            .map(|service| service.name.clone())
            .unwrap_or_else(|| service_id.to_string());

        let draft = OrderDraft::new(service_id, quantity, target_url, price)
            .with_description(name);
        self.debit_for_order(user_id, draft).await
    }

    /// Price a quantity of a service without ordering
    pub fn quote(&self, service_id: &str, quantity: u32) -> Result<Decimal> {
        self.catalog.quote(service_id, quantity)
    }

    // Read-only queries; these reflect only committed state

    /// Current wallet snapshot
    pub async fn wallet(&self, user_id: &UserId) -> Result<WalletAccount> {
        let wallet = self
            .with_store_retry(|| self.store.get_wallet(user_id))
            .await?;
        Ok(wallet)
    }

    /// Ledger entries, newest first
    pub async fn entries(
        &self,
        user_id: &UserId,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = self
            .with_store_retry(|| self.store.list_entries(user_id, &filter))
            .await?;
        Ok(entries)
    }

    /// Added/spent/count over completed entries since `since`
    pub async fn activity_summary(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<EntrySummary> {
        let summary = self
            .with_store_retry(|| self.store.summarize_entries(user_id, since))
            .await?;
        Ok(summary)
    }

    /// A single order
    pub async fn order(&self, order_id: Uuid) -> Result<Order> {
        let order = self
            .with_store_retry(|| self.store.get_order(order_id))
            .await?;
        Ok(order)
    }

    /// Orders, newest first
    pub async fn orders(&self, user_id: &UserId, filter: OrderFilter) -> Result<Vec<Order>> {
        let orders = self
            .with_store_retry(|| self.store.list_orders(user_id, &filter))
            .await?;
        Ok(orders)
    }

    // Internals

    /// Return the prior receipt for an already-settled reference
    async fn replay_credit(
        &self,
        request: &CreditRequest,
        reference: &str,
        prior: LedgerEntry,
    ) -> Result<CreditReceipt> {
        let matches_prior = prior.kind == EntryKind::Credit
            && prior.status == EntryStatus::Completed
            && prior.user_id == request.user_id
            && prior.amount == request.amount;
        if !matches_prior {
            self.metrics.record_rejection();
            return Err(Error::DuplicatePayment(reference.to_string()));
        }

        let wallet = self
            .with_store_retry(|| self.store.get_wallet(&request.user_id))
            .await?;
        tracing::info!(
            user = %request.user_id,
            reference,
            "Credit replayed from settled reference"
        );
        Ok(CreditReceipt {
            wallet,
            entry: prior,
            replayed: true,
        })
    }

    /// Run a store call with bounded retry and linear backoff
    ///
    /// Only storage-level failures are retried; contract errors (not found,
    /// version conflict, duplicate ref) pass straight through.
    async fn with_store_retry<T, F>(&self, mut operation: F) -> wallet_core::Result<T>
    where
        F: FnMut() -> wallet_core::Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            match operation() {
                Err(wallet_core::Error::Storage(message))
                    if attempt + 1 < self.config.retry.store_attempts =>
                {
                    attempt += 1;
                    tracing::warn!(attempt, %message, "Storage unavailable, backing off");
                    sleep(Duration::from_millis(
                        self.config.retry.store_backoff_ms * u64::from(attempt),
                    ))
                    .await;
                }
                other => return other,
            }
        }
    }
}
