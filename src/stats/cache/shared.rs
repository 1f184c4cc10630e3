//! The shared tier: a network cache visible to every process.
//!
//! Implementations report failures as errors; [`CacheStore`](super::CacheStore) turns
//! those into misses so that an unreachable shared cache only costs latency.

use super::entry::StoredEntry;
use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use core::fmt::Debug;
use core::time::Duration;
use ohno::IntoAppError;
use redis::aio::ConnectionManager;
use std::sync::Arc;

const LOG_TARGET: &str = "    shared";

#[async_trait]
pub trait SharedTier: Send + Sync + Debug {
    /// Short label used in log lines.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>>;

    /// Replace or insert `entry`; the tier expires it after `entry.ttl`.
    async fn put(&self, key: &CacheKey, entry: &StoredEntry) -> Result<()>;
}

/// Shared tier used when no shared cache is configured: always misses, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTier;

#[async_trait]
impl SharedTier for DisabledTier {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<StoredEntry>> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _entry: &StoredEntry) -> Result<()> {
        Ok(())
    }
}

/// Redis-backed shared tier. Entries are stored as JSON with a per-key expiry.
#[derive(Clone)]
pub struct RedisTier {
    connection: ConnectionManager,
    url: String,
}

impl Debug for RedisTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisTier").field("url", &self.url).finish_non_exhaustive()
    }
}

impl RedisTier {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server cannot be reached
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).into_app_err_with(|| format!("invalid shared cache URL '{url}'"))?;
        let connection = ConnectionManager::new(client)
            .await
            .into_app_err_with(|| format!("connecting to shared cache at '{url}'"))?;

        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SharedTier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let mut connection = self.connection.clone();
        let text: Option<String> = redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .into_app_err_with(|| format!("reading '{key}' from shared cache"))?;

        text.map(|text| serde_json::from_str(&text).into_app_err_with(|| format!("decoding '{key}' from shared cache")))
            .transpose()
    }

    async fn put(&self, key: &CacheKey, entry: &StoredEntry) -> Result<()> {
        let text = serde_json::to_string(entry).into_app_err("encoding shared cache entry")?;
        let ttl_ms = u64::try_from(entry.ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut connection = self.connection.clone();
        let () = redis::cmd("SET")
            .arg(key.as_str())
            .arg(text)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut connection)
            .await
            .into_app_err_with(|| format!("writing '{key}' to shared cache"))?;

        Ok(())
    }
}

/// Connect to the shared tier named by `url`, falling back to [`DisabledTier`].
///
/// Startup never fails because of the shared cache: a missing URL, a bad URL, an
/// unreachable server, or a connection that takes longer than `timeout` all yield the
/// disabled tier with a warning.
pub async fn connect_shared_tier(url: Option<&str>, timeout: Duration) -> Arc<dyn SharedTier> {
    let Some(url) = url else {
        log::debug!(target: LOG_TARGET, "No shared cache configured");
        return Arc::new(DisabledTier);
    };

    match tokio::time::timeout(timeout, RedisTier::connect(url)).await {
        Ok(Ok(tier)) => {
            log::info!(target: LOG_TARGET, "Using shared cache at {url}");
            Arc::new(tier)
        }
        Ok(Err(e)) => {
            log::warn!(target: LOG_TARGET, "Shared cache unavailable, continuing without it: {e:#}");
            Arc::new(DisabledTier)
        }
        Err(_) => {
            log::warn!(
                target: LOG_TARGET,
                "Shared cache at {url} did not answer within {}ms, continuing without it",
                timeout.as_millis()
            );
            Arc::new(DisabledTier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_tier_always_misses() {
        let tier = DisabledTier;
        let key = CacheKey::new("github", "octocat");
        let entry = StoredEntry::new(json!({}), Utc::now(), Duration::from_secs(1), Duration::ZERO);

        tier.put(&key, &entry).await.unwrap();
        assert!(tier.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_url_yields_disabled_tier() {
        let tier = connect_shared_tier(None, Duration::from_millis(50)).await;
        assert_eq!(tier.name(), "disabled");
    }

    #[tokio::test]
    async fn bad_url_yields_disabled_tier() {
        let tier = connect_shared_tier(Some("not a url"), Duration::from_millis(50)).await;
        assert_eq!(tier.name(), "disabled");
    }
}
