use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use keel_core::{CoreError, Disposable, ServiceResult};
use serde_json::Value;

/// Key/value cache capability
#[async_trait]
pub trait Cache: Disposable {
    /// Cached value, `None` when absent or expired
    async fn get(&self, key: &str) -> ServiceResult<Option<Value>>;

    /// Store a value; `ttl` overrides the cache's default time-to-live
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> ServiceResult<()>;

    /// Remove a key, reporting whether a live entry existed
    async fn delete(&self, key: &str) -> ServiceResult<bool>;

    async fn clear(&self) -> ServiceResult<()>;

    async fn has(&self, key: &str) -> ServiceResult<bool> {
        match self.get(key).await {
            ServiceResult::Success { data, .. } => ServiceResult::ok_with(matches!(data, Some(Some(_)))),
            ServiceResult::Failure(err) => ServiceResult::Failure(err),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |exp| Instant::now() >= exp)
    }
}

/// In-memory cache with per-entry expiry
///
/// Expired entries are dropped lazily when read or on [`InMemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Option<Duration>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Some(ttl),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> ServiceResult<Option<Value>> {
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => None,
            None => return ServiceResult::ok_with(None),
        };

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        ServiceResult::ok_with(value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> ServiceResult<()> {
        // A time-to-live past the clock's range never expires.
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries.insert(key.to_string(), CacheEntry { value, expires_at });
        ServiceResult::ok()
    }

    async fn delete(&self, key: &str) -> ServiceResult<bool> {
        let removed = self
            .entries
            .remove(key)
            .map_or(false, |(_, entry)| !entry.is_expired());
        ServiceResult::ok_with(removed)
    }

    async fn clear(&self) -> ServiceResult<()> {
        self.entries.clear();
        ServiceResult::ok()
    }
}

#[async_trait]
impl Disposable for InMemoryCache {
    async fn dispose(&self) -> Result<(), CoreError> {
        tracing::debug!(entries = self.entries.len(), "Clearing in-memory cache");
        self.entries.clear();
        Ok(())
    }
}
