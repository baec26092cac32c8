//! Read caches over ledger accounts.
//!
//! The engine never owns a global cache: a [`AccountCache`] is handed to
//! [`EngineBuilder::cache`](crate::EngineBuilder::cache). Writes only need the
//! [`CacheInvalidator`] half; reads go through `get`/`put`.
//!
//! Every invalidation bumps the key's generation. A reader takes the
//! generation before loading from the database and hands it back to `put`,
//! so a list loaded before a concurrent write is never stored.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LedgerAccount;

/// Default lifetime of a cached account list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Named read caches, one per ledger kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    CashRegisters,
    Banks,
    Customers,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [Self::CashRegisters, Self::Banks, Self::Customers];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashRegisters => "cashRegisters",
            Self::Banks => "banks",
            Self::Customers => "customers",
        }
    }
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache \"{0}\" is unavailable")]
    Unavailable(String),
}

/// Drops stale read caches after a committed write.
///
/// Invalidation is idempotent: removing a key that is not cached succeeds.
pub trait CacheInvalidator: Send + Sync + core::fmt::Debug {
    fn invalidate(&self, key: CacheKey) -> Result<(), CacheError>;
}

/// Read cache of account lists, keyed by ledger kind.
pub trait AccountCache: CacheInvalidator {
    fn get(&self, key: CacheKey) -> Option<Vec<LedgerAccount>>;
    /// Number of invalidations of `key` so far.
    fn generation(&self, key: CacheKey) -> u64;
    /// Stores `accounts` unless `key` was invalidated after `generation`
    /// was read.
    fn put(&self, key: CacheKey, generation: u64, accounts: Vec<LedgerAccount>);
}

#[derive(Clone, Debug)]
struct CacheEntry {
    accounts: Vec<LedgerAccount>,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    generations: HashMap<CacheKey, u64>,
}

/// Process-local cache whose entries expire after a fixed TTL.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Drops every cached list.
    pub fn invalidate_all(&self) -> Result<(), CacheError> {
        for key in CacheKey::ALL {
            self.invalidate(key)?;
        }
        Ok(())
    }

    /// Returns `true` if a live entry exists for `key`.
    pub fn contains(&self, key: CacheKey) -> bool {
        self.state
            .read()
            .map(|state| {
                state
                    .entries
                    .get(&key)
                    .is_some_and(|entry| entry.created_at.elapsed() <= self.ttl)
            })
            .unwrap_or(false)
    }
}

impl CacheInvalidator for MemoryCache {
    fn invalidate(&self, key: CacheKey) -> Result<(), CacheError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CacheError::Unavailable(key.as_str().to_string()))?;
        state.entries.remove(&key);
        *state.generations.entry(key).or_default() += 1;
        Ok(())
    }
}

impl AccountCache for MemoryCache {
    fn get(&self, key: CacheKey) -> Option<Vec<LedgerAccount>> {
        let state = self.state.read().ok()?;
        state
            .entries
            .get(&key)
            .filter(|entry| entry.created_at.elapsed() <= self.ttl)
            .map(|entry| entry.accounts.clone())
    }

    fn generation(&self, key: CacheKey) -> u64 {
        self.state
            .read()
            .map(|state| state.generations.get(&key).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn put(&self, key: CacheKey, generation: u64, accounts: Vec<LedgerAccount>) {
        // A poisoned lock only costs a cache miss on the next read.
        if let Ok(mut state) = self.state.write() {
            if state.generations.get(&key).copied().unwrap_or_default() != generation {
                return;
            }
            let ttl = self.ttl;
            state
                .entries
                .retain(|_, entry| entry.created_at.elapsed() <= ttl);
            state.entries.insert(
                key,
                CacheEntry {
                    accounts,
                    created_at: Instant::now(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Currency, LedgerKind};

    fn banks() -> Vec<LedgerAccount> {
        vec![LedgerAccount::new(
            LedgerKind::Bank,
            "Bank-1".to_string(),
            Currency::Tl,
        )]
    }

    #[test]
    fn put_then_get() {
        let cache = MemoryCache::default();
        cache.put(CacheKey::Banks, 0, banks());
        assert_eq!(cache.get(CacheKey::Banks).unwrap().len(), 1);
        assert!(cache.get(CacheKey::Customers).is_none());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let cache = MemoryCache::default();
        cache.put(CacheKey::Banks, 0, banks());
        cache.invalidate(CacheKey::Banks).unwrap();
        cache.invalidate(CacheKey::Banks).unwrap();
        assert!(!cache.contains(CacheKey::Banks));
    }

    #[test]
    fn invalidate_all_clears_every_key() {
        let cache = MemoryCache::default();
        cache.put(CacheKey::Banks, 0, banks());
        cache.put(CacheKey::CashRegisters, 0, Vec::new());
        cache.invalidate_all().unwrap();
        for key in CacheKey::ALL {
            assert!(!cache.contains(key));
        }
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.put(CacheKey::Banks, 0, banks());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(CacheKey::Banks).is_none());
    }

    #[test]
    fn list_read_before_an_invalidation_is_dropped() {
        let cache = MemoryCache::default();
        let generation = cache.generation(CacheKey::Banks);

        cache.invalidate(CacheKey::Banks).unwrap();
        cache.put(CacheKey::Banks, generation, banks());
        assert!(cache.get(CacheKey::Banks).is_none());

        let generation = cache.generation(CacheKey::Banks);
        assert_eq!(generation, 1);
        cache.put(CacheKey::Banks, generation, banks());
        assert!(cache.contains(CacheKey::Banks));
    }

    #[test]
    fn keys_have_stable_names() {
        assert_eq!(CacheKey::CashRegisters.as_str(), "cashRegisters");
        assert_eq!(CacheKey::Banks.to_string(), "banks");
        assert_eq!(CacheKey::Customers.as_str(), "customers");
    }
}
