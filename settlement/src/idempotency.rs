//! Deduplication of external payment references
//!
//! A credit retried over the network (or a duplicated webhook) presents the
//! same gateway confirmation id twice. The uniqueness of
//! `LedgerEntry.external_ref` in the store is the correctness mechanism;
//! this index is the read-path shortcut that resolves a seen reference to
//! its settled entry without rescanning.

use crate::Result;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;
use wallet_core::{types::LedgerEntry, LedgerStore};

/// Lookup of settled external references
#[derive(Debug)]
pub struct IdempotencyIndex {
    store: Arc<LedgerStore>,

    /// References settled by this process; misses fall through to the store
    seen: DashMap<String, Uuid>,
}

impl IdempotencyIndex {
    /// New index over a store
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self {
            store,
            seen: DashMap::new(),
        }
    }

    /// Resolve a reference to its settled entry, if any
    pub fn lookup(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        if let Some(entry_id) = self.seen.get(external_ref).map(|id| *id) {
            match self.store.get_entry(entry_id) {
                Ok(entry) => return Ok(Some(entry)),
                // Stale cache slot; fall through to the store
                Err(wallet_core::Error::EntryNotFound(_)) => {
                    self.seen.remove(external_ref);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.store.entry_by_external_ref(external_ref)? {
            Some(entry) => {
                self.seen
                    .insert(external_ref.to_string(), entry.entry_id);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Remember a reference settled by this process
    pub fn record(&self, external_ref: &str, entry_id: Uuid) {
        self.seen.insert(external_ref.to_string(), entry_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use wallet_core::{types::UserId, Config};

    fn test_index() -> (IdempotencyIndex, Arc<LedgerStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let store = Arc::new(LedgerStore::open(&config).unwrap());
        (IdempotencyIndex::new(store.clone()), store, temp_dir)
    }

    #[test]
    fn test_lookup_falls_through_to_store() {
        let (index, store, _temp) = test_index();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        assert!(index.lookup("PP_1").unwrap().is_none());

        let amount = Decimal::new(10000, 2);
        let entry =
            LedgerEntry::credit(user.clone(), amount, "Wallet Top-up").with_external_ref("PP_1");
        store
            .commit_credit(
                &user,
                wallet.version,
                wallet.credited(amount, Utc::now()),
                &entry,
            )
            .unwrap();

        // First hit populates the cache, second is served from it
        let found = index.lookup("PP_1").unwrap().unwrap();
        assert_eq!(found.entry_id, entry.entry_id);
        let again = index.lookup("PP_1").unwrap().unwrap();
        assert_eq!(again.entry_id, entry.entry_id);
    }

    #[test]
    fn test_record_primes_the_cache() {
        let (index, store, _temp) = test_index();
        let user = UserId::new("u1");
        let wallet = store.create_wallet(&user).unwrap();

        let amount = Decimal::new(5000, 2);
        let entry =
            LedgerEntry::credit(user.clone(), amount, "Wallet Top-up").with_external_ref("PP_2");
        store
            .commit_credit(
                &user,
                wallet.version,
                wallet.credited(amount, Utc::now()),
                &entry,
            )
            .unwrap();

        index.record("PP_2", entry.entry_id);
        let found = index.lookup("PP_2").unwrap().unwrap();
        assert_eq!(found.amount, amount);
    }
}
