//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - One account row per user (key: user_id)
//! - `entries` - Append-only ledger entries (key: entry_id)
//! - `orders` - Orders created with their paying debit (key: order_id)
//! - `refs` - External payment references (key: external_ref, value: entry_id)
//! - `indices` - Per-user secondary indices for listing
//!
//! All wallet mutation goes through compare-and-swap: the caller submits the
//! version its snapshot was read at, and the write is rejected when a newer
//! version has been committed in between. The compare step and the batch
//! write run under a short per-user mutex, so a read-then-write race becomes
//! a detectable `VersionConflict` instead of a lost update.

use crate::{
    error::{Error, Result},
    types::{
        EntryFilter, EntrySummary, LedgerEntry, Order, OrderFilter, UserId, WalletAccount,
        WalletFields,
    },
    Config,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_ENTRIES: &str = "entries";
const CF_ORDERS: &str = "orders";
const CF_REFS: &str = "refs";
const CF_INDICES: &str = "indices";

/// Index key tags, between the user id and the row id
const TAG_ENTRY: &[u8] = b"|e|";
const TAG_ORDER: &[u8] = b"|o|";

/// Durable wallet + ledger store
#[derive(Debug)]
pub struct LedgerStore {
    db: Arc<DB>,

    /// Per-user write locks; held only for a single read-compare-write
    write_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl LedgerStore {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_wallets()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_ORDERS, Self::cf_options_orders()),
            ColumnFamilyDescriptor::new(CF_REFS, Self::cf_options_refs()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened wallet store");

        Ok(Self {
            db: Arc::new(db),
            write_locks: DashMap::new(),
        })
    }

    // Column family options

    fn cf_options_wallets() -> Options {
        let mut opts = Options::default();
        // Hot point lookups, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_orders() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_refs() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Per-user lock for read-compare-write sections
    fn user_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Wallet operations

    /// Provision a zero wallet at signup
    pub fn create_wallet(&self, user_id: &UserId) -> Result<WalletAccount> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let cf = self.cf_handle(CF_WALLETS)?;
        if self.db.get_cf(cf, user_id.as_str().as_bytes())?.is_some() {
            return Err(Error::WalletExists(user_id.to_string()));
        }

        let wallet = WalletAccount::new(user_id.clone(), Utc::now());
        let value = bincode::serialize(&wallet)?;
        self.db.put_cf(cf, user_id.as_str().as_bytes(), &value)?;

        tracing::info!(user = %user_id, "Wallet provisioned");

        Ok(wallet)
    }

    /// Get wallet by user ID
    pub fn get_wallet(&self, user_id: &UserId) -> Result<WalletAccount> {
        let cf = self.cf_handle(CF_WALLETS)?;

        let value = self
            .db
            .get_cf(cf, user_id.as_str().as_bytes())?
            .ok_or_else(|| Error::WalletNotFound(user_id.to_string()))?;

        let wallet: WalletAccount = bincode::deserialize(&value)?;
        Ok(wallet)
    }

    /// Compare-and-swap the wallet row
    ///
    /// The sole single-record mutation path. Fails with `VersionConflict`
    /// when the stored version no longer matches `expected_version`; the
    /// caller re-reads and retries or gives up.
    pub fn compare_and_swap_wallet(
        &self,
        user_id: &UserId,
        expected_version: u64,
        fields: WalletFields,
    ) -> Result<WalletAccount> {
        Self::validate_fields(user_id, &fields)?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let updated = self.checked_wallet_update(user_id, expected_version, fields)?;
        let cf = self.cf_handle(CF_WALLETS)?;
        let value = bincode::serialize(&updated)?;
        self.db.put_cf(cf, user_id.as_str().as_bytes(), &value)?;

        Ok(updated)
    }

    /// Append a standalone ledger entry
    ///
    /// Used for audit rows that move no money (declined payments). Entries
    /// with a non-null `external_ref` that already exists are rejected,
    /// never silently skipped.
    pub fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        Self::validate_entry(entry)?;

        let lock = self.user_lock(&entry.user_id);
        let _guard = lock.lock();

        self.check_ref_free(entry)?;

        let mut batch = WriteBatch::default();
        self.batch_entry(&mut batch, entry)?;
        self.db.write(batch)?;

        tracing::debug!(
            entry = %entry.entry_id,
            user = %entry.user_id,
            kind = entry.kind.as_str(),
            "Entry appended"
        );

        Ok(())
    }

    /// Commit a credit: CAS the wallet and append the entry as one batch
    pub fn commit_credit(
        &self,
        user_id: &UserId,
        expected_version: u64,
        fields: WalletFields,
        entry: &LedgerEntry,
    ) -> Result<WalletAccount> {
        Self::validate_entry(entry)?;
        Self::validate_fields(user_id, &fields)?;
        if entry.kind != crate::types::EntryKind::Credit || entry.user_id != *user_id {
            return Err(Error::InvalidEntry(
                "credit commit requires a credit entry for the same user".to_string(),
            ));
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let updated = self.checked_wallet_update(user_id, expected_version, fields)?;
        self.check_ref_free(entry)?;

        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, &updated)?;
        self.batch_entry(&mut batch, entry)?;
        self.db.write(batch)?;

        Ok(updated)
    }

    /// Commit a debit: CAS the wallet, create the order, and append the
    /// entry as one batch
    pub fn commit_debit(
        &self,
        user_id: &UserId,
        expected_version: u64,
        fields: WalletFields,
        order: &Order,
        entry: &LedgerEntry,
    ) -> Result<WalletAccount> {
        Self::validate_entry(entry)?;
        Self::validate_fields(user_id, &fields)?;
        if entry.kind != crate::types::EntryKind::Debit
            || entry.user_id != *user_id
            || order.user_id != *user_id
            || entry.order_id != Some(order.order_id)
        {
            return Err(Error::InvalidEntry(
                "debit commit requires a debit entry referencing the order, same user".to_string(),
            ));
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let updated = self.checked_wallet_update(user_id, expected_version, fields)?;
        self.check_ref_free(entry)?;

        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, &updated)?;
        self.batch_entry(&mut batch, entry)?;

        let cf_orders = self.cf_handle(CF_ORDERS)?;
        let order_value = bincode::serialize(order)?;
        batch.put_cf(cf_orders, order.order_id.as_bytes(), &order_value);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key(user_id, TAG_ORDER, order.order_id);
        batch.put_cf(cf_indices, &idx, b"");

        self.db.write(batch)?;

        Ok(updated)
    }

    // Entry reads

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Look up the entry settled under an external reference
    pub fn entry_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        let cf = self.cf_handle(CF_REFS)?;

        let value = match self.db.get_cf(cf, external_ref.as_bytes())? {
            Some(value) => value,
            None => return Ok(None),
        };

        let entry_id = Uuid::from_slice(&value)
            .map_err(|_| Error::Storage(format!("Corrupt ref index for {}", external_ref)))?;
        self.get_entry(entry_id).map(Some)
    }

    /// List a user's entries, newest first
    pub fn list_entries(&self, user_id: &UserId, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        let ids = self.scan_index(user_id, TAG_ENTRY)?;

        let mut entries = Vec::with_capacity(ids.len());
        for entry_id in ids {
            let entry = self.get_entry(entry_id)?;
            if filter.matches(&entry) {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| (b.created_at, b.entry_id).cmp(&(a.created_at, a.entry_id)));
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }

    /// Aggregate completed entries since `since` (all time when `None`)
    pub fn summarize_entries(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<EntrySummary> {
        let filter = EntryFilter {
            status: Some(crate::types::EntryStatus::Completed),
            since,
            ..EntryFilter::default()
        };
        let entries = self.list_entries(user_id, &filter)?;

        let mut summary = EntrySummary {
            added: Decimal::ZERO,
            spent: Decimal::ZERO,
            count: 0,
        };
        for entry in entries {
            match entry.kind {
                crate::types::EntryKind::Credit => summary.added += entry.amount,
                crate::types::EntryKind::Debit => summary.spent += entry.amount,
            }
            summary.count += 1;
        }

        Ok(summary)
    }

    // Order reads

    /// Get order by ID
    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        let cf = self.cf_handle(CF_ORDERS)?;

        let value = self
            .db
            .get_cf(cf, order_id.as_bytes())?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;

        let order: Order = bincode::deserialize(&value)?;
        Ok(order)
    }

    /// List a user's orders, newest first
    pub fn list_orders(&self, user_id: &UserId, filter: &OrderFilter) -> Result<Vec<Order>> {
        let ids = self.scan_index(user_id, TAG_ORDER)?;

        let mut orders = Vec::with_capacity(ids.len());
        for order_id in ids {
            let order = self.get_order(order_id)?;
            if filter.matches(&order) {
                orders.push(order);
            }
        }

        orders.sort_by(|a, b| (b.created_at, b.order_id).cmp(&(a.created_at, a.order_id)));
        if let Some(limit) = filter.limit {
            orders.truncate(limit);
        }

        Ok(orders)
    }

    // Internals

    /// Version check + next wallet value; caller holds the user lock
    fn checked_wallet_update(
        &self,
        user_id: &UserId,
        expected_version: u64,
        fields: WalletFields,
    ) -> Result<WalletAccount> {
        let current = self.get_wallet(user_id)?;
        if current.version != expected_version {
            return Err(Error::VersionConflict {
                user_id: user_id.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }

        Ok(WalletAccount {
            user_id: current.user_id,
            balance: fields.balance,
            total_added: fields.total_added,
            total_spent: fields.total_spent,
            version: expected_version + 1,
            updated_at: fields.updated_at,
        })
    }

    /// Reject an entry whose external reference is already settled
    fn check_ref_free(&self, entry: &LedgerEntry) -> Result<()> {
        if let Some(external_ref) = entry.external_ref.as_deref() {
            let cf = self.cf_handle(CF_REFS)?;
            if self.db.get_cf(cf, external_ref.as_bytes())?.is_some() {
                return Err(Error::DuplicateExternalRef(external_ref.to_string()));
            }
        }
        Ok(())
    }

    fn batch_wallet(&self, batch: &mut WriteBatch, wallet: &WalletAccount) -> Result<()> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let value = bincode::serialize(wallet)?;
        batch.put_cf(cf, wallet.user_id.as_str().as_bytes(), &value);
        Ok(())
    }

    fn batch_entry(&self, batch: &mut WriteBatch, entry: &LedgerEntry) -> Result<()> {
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let value = bincode::serialize(entry)?;
        batch.put_cf(cf_entries, entry.entry_id.as_bytes(), &value);

        if let Some(external_ref) = entry.external_ref.as_deref() {
            let cf_refs = self.cf_handle(CF_REFS)?;
            batch.put_cf(cf_refs, external_ref.as_bytes(), entry.entry_id.as_bytes());
        }

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key(&entry.user_id, TAG_ENTRY, entry.entry_id);
        batch.put_cf(cf_indices, &idx, b"");

        Ok(())
    }

    /// Collect row ids from a user's index subspace, in key order
    fn scan_index(&self, user_id: &UserId, tag: &[u8]) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let mut prefix = user_id.as_str().as_bytes().to_vec();
        prefix.extend_from_slice(tag);

        let iter = self.db.prefix_iterator_cf(cf, &prefix);

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id_bytes = &key[prefix.len()..];
            let id = Uuid::from_slice(id_bytes)
                .map_err(|_| Error::Storage(format!("Corrupt index key for {}", user_id)))?;
            ids.push(id);
        }

        Ok(ids)
    }

    fn index_key(user_id: &UserId, tag: &[u8], id: Uuid) -> Vec<u8> {
        let mut key = user_id.as_str().as_bytes().to_vec();
        key.extend_from_slice(tag);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn validate_entry(entry: &LedgerEntry) -> Result<()> {
        if entry.amount <= Decimal::ZERO {
            return Err(Error::InvalidEntry(
                "entry amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Store-side backstop for the core invariants: the identity must hold
    /// and a debit may never drive the balance negative.
    fn validate_fields(user_id: &UserId, fields: &WalletFields) -> Result<()> {
        if fields.balance < Decimal::ZERO {
            return Err(Error::InvalidEntry(format!(
                "wallet {} balance would go negative",
                user_id
            )));
        }
        if fields.balance != fields.total_added - fields.total_spent {
            return Err(Error::InvalidEntry(format!(
                "wallet {} balance identity violated",
                user_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryKind, OrderStatus};
    use tempfile::TempDir;

    fn test_store() -> (LedgerStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (LedgerStore::open(&config).unwrap(), temp_dir)
    }

    fn test_order(user_id: &UserId, price: Decimal) -> Order {
        Order {
            order_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            service: "ig-followers".to_string(),
            quantity: 1000,
            target_url: "https://instagram.com/example".to_string(),
            price,
            status: OrderStatus::Pending,
            start_count: 0,
            remains: 1000,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_get_wallet() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");

        let wallet = store.create_wallet(&user).unwrap();
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.version, 0);

        let retrieved = store.get_wallet(&user).unwrap();
        assert_eq!(retrieved, wallet);

        assert!(matches!(
            store.create_wallet(&user),
            Err(Error::WalletExists(_))
        ));
        assert!(matches!(
            store.get_wallet(&UserId::new("missing")),
            Err(Error::WalletNotFound(_))
        ));
    }

    #[test]
    fn test_cas_bumps_version_and_detects_conflict() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        let amount = Decimal::new(10000, 2);
        let updated = store
            .compare_and_swap_wallet(&user, wallet.version, wallet.credited(amount, Utc::now()))
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.balance, amount);

        // Stale snapshot loses
        let stale = store.compare_and_swap_wallet(
            &user,
            wallet.version,
            wallet.credited(amount, Utc::now()),
        );
        assert!(matches!(
            stale,
            Err(Error::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));

        // And nothing was applied on the losing path
        assert_eq!(store.get_wallet(&user).unwrap().balance, amount);
    }

    #[test]
    fn test_cas_rejects_inconsistent_fields() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        let negative = wallet.debited(Decimal::new(100, 2), Utc::now());
        assert!(matches!(
            store.compare_and_swap_wallet(&user, wallet.version, negative),
            Err(Error::InvalidEntry(_))
        ));

        let broken = WalletFields {
            balance: Decimal::new(100, 2),
            total_added: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            updated_at: Utc::now(),
        };
        assert!(matches!(
            store.compare_and_swap_wallet(&user, wallet.version, broken),
            Err(Error::InvalidEntry(_))
        ));
    }

    #[test]
    fn test_commit_credit_atomic_and_ref_unique() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        let amount = Decimal::new(10000, 2);
        let entry =
            LedgerEntry::credit(user.clone(), amount, "Wallet Top-up").with_external_ref("PP_1");
        let updated = store
            .commit_credit(
                &user,
                wallet.version,
                wallet.credited(amount, Utc::now()),
                &entry,
            )
            .unwrap();
        assert_eq!(updated.balance, amount);
        assert_eq!(updated.total_added, amount);

        // Entry, ref index, and user index all landed
        let by_ref = store.entry_by_external_ref("PP_1").unwrap().unwrap();
        assert_eq!(by_ref.entry_id, entry.entry_id);
        assert_eq!(store.list_entries(&user, &EntryFilter::default()).unwrap().len(), 1);

        // Same ref again is rejected, not skipped
        let replay =
            LedgerEntry::credit(user.clone(), amount, "Wallet Top-up").with_external_ref("PP_1");
        let result = store.commit_credit(
            &user,
            updated.version,
            updated.credited(amount, Utc::now()),
            &replay,
        );
        assert!(matches!(result, Err(Error::DuplicateExternalRef(_))));

        // The losing commit applied nothing
        assert_eq!(store.get_wallet(&user).unwrap().balance, amount);
    }

    #[test]
    fn test_commit_debit_creates_order_atomically() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        store.create_wallet(&user).unwrap();

        let credit_amount = Decimal::new(10000, 2);
        let wallet = store.get_wallet(&user).unwrap();
        let entry = LedgerEntry::credit(user.clone(), credit_amount, "Wallet Top-up");
        let wallet = store
            .commit_credit(
                &user,
                wallet.version,
                wallet.credited(credit_amount, Utc::now()),
                &entry,
            )
            .unwrap();

        let price = Decimal::new(2500, 2);
        let order = test_order(&user, price);
        let debit = LedgerEntry::debit(
            user.clone(),
            price,
            "Instagram Followers - Order",
            order.order_id,
        );
        let updated = store
            .commit_debit(
                &user,
                wallet.version,
                wallet.debited(price, Utc::now()),
                &order,
                &debit,
            )
            .unwrap();

        assert_eq!(updated.balance, Decimal::new(7500, 2));
        assert_eq!(updated.total_spent, price);

        let stored_order = store.get_order(order.order_id).unwrap();
        assert_eq!(stored_order.status, OrderStatus::Pending);
        assert_eq!(stored_order.remains, 1000);

        let orders = store.list_orders(&user, &OrderFilter::default()).unwrap();
        assert_eq!(orders.len(), 1);
    }

    #[test]
    fn test_commit_debit_rejects_mismatched_rows() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        let price = Decimal::new(2500, 2);
        let order = test_order(&user, price);
        // Entry pointing at a different order
        let debit = LedgerEntry::debit(user.clone(), price, "order", Uuid::now_v7());
        let fields = WalletFields {
            balance: Decimal::ZERO,
            total_added: price,
            total_spent: price,
            updated_at: Utc::now(),
        };
        assert!(matches!(
            store.commit_debit(&user, wallet.version, fields, &order, &debit),
            Err(Error::InvalidEntry(_))
        ));
    }

    #[test]
    fn test_list_entries_newest_first_with_filters() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        store.create_wallet(&user).unwrap();

        for i in 1..=3i64 {
            let wallet = store.get_wallet(&user).unwrap();
            let amount = Decimal::new(i * 100, 2);
            let entry = LedgerEntry::credit(user.clone(), amount, format!("top-up {}", i));
            store
                .commit_credit(
                    &user,
                    wallet.version,
                    wallet.credited(amount, Utc::now()),
                    &entry,
                )
                .unwrap();
        }

        let entries = store.list_entries(&user, &EntryFilter::default()).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        // Newest first: the last credit leads
        assert_eq!(entries[0].amount, Decimal::new(300, 2));

        let limited = store
            .list_entries(
                &user,
                &EntryFilter {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].amount, Decimal::new(300, 2));

        let debits = store
            .list_entries(
                &user,
                &EntryFilter {
                    kind: Some(EntryKind::Debit),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(debits.is_empty());
    }

    #[test]
    fn test_append_declined_entry_and_summary() {
        let (store, _temp) = test_store();
        let user = UserId::new("u1");
        store.create_wallet(&user).unwrap();

        let wallet = store.get_wallet(&user).unwrap();
        let amount = Decimal::new(5000, 2);
        let entry = LedgerEntry::credit(user.clone(), amount, "Wallet Top-up");
        store
            .commit_credit(
                &user,
                wallet.version,
                wallet.credited(amount, Utc::now()),
                &entry,
            )
            .unwrap();

        // Declined payment leaves an audit row that moves no money
        let declined = LedgerEntry::credit(user.clone(), Decimal::new(9900, 2), "Wallet Top-up")
            .with_external_ref("PP_DENIED")
            .declined();
        store.append_entry(&declined).unwrap();

        let all = store.list_entries(&user, &EntryFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let summary = store.summarize_entries(&user, None).unwrap();
        assert_eq!(summary.added, amount);
        assert_eq!(summary.spent, Decimal::ZERO);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.net(), amount);

        // The failed row still claims its reference
        assert!(matches!(
            store.append_entry(
                &LedgerEntry::credit(user.clone(), amount, "retry").with_external_ref("PP_DENIED")
            ),
            Err(Error::DuplicateExternalRef(_))
        ));

        // And the wallet was never touched
        let wallet = store.get_wallet(&user).unwrap();
        assert_eq!(wallet.balance, amount);
        assert!(wallet.is_consistent());
    }
}
