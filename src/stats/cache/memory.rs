//! The in-process tier: a bounded moka cache with per-entry expiry.

use super::entry::StoredEntry;
use super::key::CacheKey;
use chrono::Utc;
use core::time::Duration;
use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Instant;

/// What the in-process tier holds for one key.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub entry: Arc<StoredEntry>,
    pub fresh_until: Instant,
}

impl MemoryEntry {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.fresh_until
    }
}

/// Keeps an entry for its fresh period plus the stale grace window.
#[derive(Debug, Clone, Copy)]
struct GraceExpiry {
    stale_grace: Duration,
}

impl GraceExpiry {
    fn lifetime(self, value: &MemoryEntry, at: Instant) -> Duration {
        value.fresh_until.saturating_duration_since(at).saturating_add(self.stale_grace)
    }
}

impl Expiry<CacheKey, MemoryEntry> for GraceExpiry {
    fn expire_after_create(&self, _key: &CacheKey, value: &MemoryEntry, created_at: Instant) -> Option<Duration> {
        Some(self.lifetime(value, created_at))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &MemoryEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.lifetime(value, updated_at))
    }
}

/// Bounded LRU tier shared by every batch in the process.
#[derive(Debug, Clone)]
pub struct MemoryTier {
    cache: Cache<CacheKey, MemoryEntry>,
    ttl: Duration,
}

impl MemoryTier {
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration, stale_grace: Duration) -> Self {
        let cache = Cache::builder()
            .name("profile-rollup")
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(GraceExpiry { stale_grace })
            .build();

        Self { cache, ttl }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<MemoryEntry> {
        self.cache.get(key).await
    }

    /// Insert or replace. The entry is fresh for the shorter of the tier's TTL and what is
    /// left of the entry's own TTL.
    pub async fn insert(&self, key: CacheKey, entry: Arc<StoredEntry>) {
        let fresh_for = self.ttl.min(entry.remaining_ttl(Utc::now()));
        let fresh_until = Instant::now() + fresh_for;
        self.cache.insert(key, MemoryEntry { entry, fresh_until }).await;
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Approximate number of entries, including stale ones still inside their grace window.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(ttl: Duration) -> Arc<StoredEntry> {
        Arc::new(StoredEntry::new(json!({"solved": 5}), Utc::now(), ttl, Duration::ZERO))
    }

    #[tokio::test]
    async fn inserted_entry_is_fresh() {
        let tier = MemoryTier::new(10, Duration::from_secs(60), Duration::from_secs(60));
        let key = CacheKey::new("codeforces", "alice");
        tier.insert(key.clone(), stored(Duration::from_secs(600))).await;

        let hit = tier.get(&key).await.unwrap();
        assert!(hit.is_fresh());
        assert_eq!(hit.entry.payload, json!({"solved": 5}));
    }

    #[tokio::test]
    async fn entry_ttl_caps_freshness() {
        let tier = MemoryTier::new(10, Duration::from_secs(60), Duration::from_secs(60));
        let key = CacheKey::new("codeforces", "alice");
        tier.insert(key.clone(), stored(Duration::ZERO)).await;

        let hit = tier.get(&key).await.unwrap();
        assert!(!hit.is_fresh(), "an already expired entry is only kept for stale serving");
    }

    #[tokio::test]
    async fn entries_vanish_after_grace() {
        let tier = MemoryTier::new(10, Duration::ZERO, Duration::from_millis(30));
        let key = CacheKey::new("github", "bob");
        tier.insert(key.clone(), stored(Duration::from_secs(600))).await;
        assert!(tier.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        tier.run_pending_tasks().await;
        assert!(tier.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let tier = MemoryTier::new(10, Duration::from_secs(60), Duration::ZERO);
        let key = CacheKey::new("github", "bob");
        tier.insert(key.clone(), stored(Duration::from_secs(600))).await;
        tier.invalidate(&key).await;
        assert!(tier.get(&key).await.is_none());
    }
}
