use super::entry::{CacheEntry, CacheOrigin, StoredEntry};
use super::key::CacheKey;
use super::memory::MemoryTier;
use super::shared::{DisabledTier, SharedTier};
use crate::stats::Payload;
use chrono::Utc;
use core::fmt::Display;
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

const LOG_TARGET: &str = "     cache";

/// Settings of a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub memory_capacity: u64,
    pub memory_ttl: Duration,
    pub stale_grace: Duration,
    pub shared_timeout: Duration,
}

impl CacheSettings {
    #[must_use]
    pub const fn from_config(config: &crate::config::Config) -> Self {
        Self {
            memory_capacity: config.memory_capacity,
            memory_ttl: config.memory_ttl(),
            stale_grace: config.stale_grace(),
            shared_timeout: config.shared_cache_timeout(),
        }
    }
}

/// Two-tier cache: a bounded in-process tier in front of a shared tier.
///
/// Cloning is cheap; clones share both tiers.
#[derive(Debug, Clone)]
pub struct CacheStore {
    memory: MemoryTier,
    shared: Arc<dyn SharedTier>,
    shared_timeout: Duration,
    bypass: bool,
}

impl CacheStore {
    #[must_use]
    pub fn new(settings: CacheSettings, shared: Arc<dyn SharedTier>) -> Self {
        Self {
            memory: MemoryTier::new(settings.memory_capacity, settings.memory_ttl, settings.stale_grace),
            shared,
            shared_timeout: settings.shared_timeout,
            bypass: false,
        }
    }

    /// A store with only the in-process tier.
    #[must_use]
    pub fn memory_only(settings: CacheSettings) -> Self {
        Self::new(settings, Arc::new(DisabledTier))
    }

    /// A view of the same tiers that skips lookups and always fetches.
    ///
    /// Fetched results are still written to both tiers, and an in-process copy is still
    /// served as stale if the fetch fails.
    #[must_use]
    pub fn with_bypass(&self) -> Self {
        Self {
            bypass: true,
            ..self.clone()
        }
    }

    /// Return the entry for `key`, fetching it if no tier has a usable copy.
    ///
    /// Lookup order is in-process tier, shared tier, then `fetch`. `fetch` is called at
    /// most once. A fetched payload is written to both tiers with `ttl`.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the fetch fails and no in-process copy, fresh or
    /// expired, exists
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &CacheKey, ttl: Duration, fetch: F) -> Result<CacheEntry, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Payload, E>>,
        E: Display,
    {
        let start = Instant::now();

        if !self.bypass {
            if let Some(hit) = self.memory.get(key).await
                && hit.is_fresh()
            {
                log::debug!(target: LOG_TARGET, "Memory hit for {key}");
                return Ok(CacheEntry::new(hit.entry, CacheOrigin::Memory, start.elapsed()));
            }

            if let Some(entry) = self.shared_get(key).await {
                log::debug!(target: LOG_TARGET, "Shared hit for {key}");
                let entry = Arc::new(entry);
                self.memory.insert(key.clone(), Arc::clone(&entry)).await;
                return Ok(CacheEntry::new(entry, CacheOrigin::Shared, start.elapsed()));
            }
        }

        log::debug!(target: LOG_TARGET, "Fetching {key}");
        let fetch_start = Instant::now();
        match fetch().await {
            Ok(payload) => {
                let entry = Arc::new(StoredEntry::new(payload, Utc::now(), ttl, fetch_start.elapsed()));
                self.memory.insert(key.clone(), Arc::clone(&entry)).await;
                self.shared_put(key, &entry).await;
                Ok(CacheEntry::new(entry, CacheOrigin::Fresh, start.elapsed()))
            }
            Err(e) => {
                if let Some(stale) = self.memory.get(key).await {
                    log::info!(target: LOG_TARGET, "Serving stale {key} after fetch failure: {e}");
                    return Ok(CacheEntry::stale(stale.entry, start.elapsed(), e.to_string()));
                }

                log::debug!(target: LOG_TARGET, "Fetch failed for {key} with nothing cached: {e}");
                Err(e)
            }
        }
    }

    /// Drop `key` from the in-process tier.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.memory.invalidate(key).await;
    }

    /// Approximate number of in-process entries.
    #[must_use]
    pub fn memory_entry_count(&self) -> u64 {
        self.memory.entry_count()
    }

    async fn shared_get(&self, key: &CacheKey) -> Option<StoredEntry> {
        match tokio::time::timeout(self.shared_timeout, self.shared.get(key)).await {
            Ok(Ok(Some(entry))) if !entry.is_expired(Utc::now()) => Some(entry),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                log::warn!(target: LOG_TARGET, "Shared cache ({}) read failed for {key}: {e:#}", self.shared.name());
                None
            }
            Err(_) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Shared cache ({}) read timed out for {key} after {}ms",
                    self.shared.name(),
                    self.shared_timeout.as_millis()
                );
                None
            }
        }
    }

    async fn shared_put(&self, key: &CacheKey, entry: &StoredEntry) {
        match tokio::time::timeout(self.shared_timeout, self.shared.put(key, entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!(target: LOG_TARGET, "Shared cache ({}) write failed for {key}: {e:#}", self.shared.name());
            }
            Err(_) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Shared cache ({}) write timed out for {key} after {}ms",
                    self.shared.name(),
                    self.shared_timeout.as_millis()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(memory_ttl: Duration) -> CacheSettings {
        CacheSettings {
            memory_capacity: 100,
            memory_ttl,
            stale_grace: Duration::from_secs(60),
            shared_timeout: Duration::from_millis(100),
        }
    }

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn read_after_write_hits_memory() {
        let store = CacheStore::memory_only(settings(Duration::from_secs(60)));
        let key = CacheKey::new("codeforces", "alice");

        let first = store
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!({"solved": 10})) })
            .await
            .unwrap();
        assert_eq!(first.origin(), CacheOrigin::Fresh);

        let second = store
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("must not be called".to_string()) })
            .await
            .unwrap();
        assert_eq!(second.origin(), CacheOrigin::Memory);
        assert_eq!(second.payload(), first.payload());
        assert!(Arc::ptr_eq(second.stored(), first.stored()));
    }

    #[tokio::test]
    async fn failure_with_prior_entry_serves_stale() {
        let store = CacheStore::memory_only(settings(Duration::ZERO));
        let key = CacheKey::new("leetcode", "alice");

        let _ = store
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!({"solved": 3})) })
            .await
            .unwrap();

        let entry = store
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("upstream timed out".to_string()) })
            .await
            .unwrap();
        assert_eq!(entry.origin(), CacheOrigin::Stale);
        assert_eq!(entry.payload(), &json!({"solved": 3}));
        assert_eq!(entry.stale_reason(), Some("upstream timed out"));
    }

    #[tokio::test]
    async fn failure_without_entry_returns_error() {
        let store = CacheStore::memory_only(settings(Duration::from_secs(60)));
        let key = CacheKey::new("leetcode", "nobody");

        let err = store
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("not found".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "not found");
    }

    #[tokio::test]
    async fn bypass_refetches_but_keeps_writing() {
        let store = CacheStore::memory_only(settings(Duration::from_secs(60)));
        let key = CacheKey::new("github", "octocat");

        let _ = store
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!({"followers": 1})) })
            .await
            .unwrap();

        let refreshed = store
            .with_bypass()
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!({"followers": 2})) })
            .await
            .unwrap();
        assert_eq!(refreshed.origin(), CacheOrigin::Fresh);

        let cached = store
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("unused".to_string()) })
            .await
            .unwrap();
        assert_eq!(cached.origin(), CacheOrigin::Memory);
        assert_eq!(cached.payload(), &json!({"followers": 2}));
    }

    #[tokio::test]
    async fn bypass_still_serves_stale() {
        let store = CacheStore::memory_only(settings(Duration::from_secs(60)));
        let key = CacheKey::new("github", "octocat");

        let _ = store
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!({"followers": 1})) })
            .await
            .unwrap();

        let entry = store
            .with_bypass()
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("rate limited".to_string()) })
            .await
            .unwrap();
        assert_eq!(entry.origin(), CacheOrigin::Stale);
    }

    #[tokio::test]
    async fn invalidate_forces_fetch() {
        let store = CacheStore::memory_only(settings(Duration::from_secs(60)));
        let key = CacheKey::new("atcoder", "alice");

        let _ = store
            .get_or_fetch(&key, TTL, || async { Ok::<_, String>(json!(1)) })
            .await
            .unwrap();
        store.invalidate(&key).await;

        let err = store
            .get_or_fetch(&key, TTL, || async { Err::<Payload, _>("gone".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "gone");
    }
}
