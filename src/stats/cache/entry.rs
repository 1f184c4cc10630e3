use crate::stats::Payload;
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;

/// A provider result as held by the cache tiers.
///
/// Entries are immutable once written. A new fetch produces a new entry which replaces
/// the old one in both tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub payload: Payload,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
    pub fetch_latency: Duration,
}

impl StoredEntry {
    #[must_use]
    pub fn new(payload: Payload, stored_at: DateTime<Utc>, ttl: Duration, fetch_latency: Duration) -> Self {
        Self {
            payload,
            stored_at,
            ttl,
            fetch_latency,
        }
    }

    /// Time left before the entry's own TTL runs out, zero once it has.
    ///
    /// A `stored_at` in the future (clock skew between writers) counts as just written.
    #[must_use]
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        let age = now.signed_duration_since(self.stored_at).to_std().unwrap_or(Duration::ZERO);
        self.ttl.saturating_sub(age)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ttl(now).is_zero()
    }
}

/// Where a served entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheOrigin {
    /// Fresh hit in the in-process tier.
    Memory,

    /// Hit in the shared tier.
    Shared,

    /// Just fetched from the provider.
    Fresh,

    /// Expired in-process copy served because the fetch failed.
    Stale,
}

/// The result of [`CacheStore::get_or_fetch`](super::CacheStore::get_or_fetch).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    stored: Arc<StoredEntry>,
    origin: CacheOrigin,
    elapsed: Duration,
    stale_reason: Option<Arc<str>>,
}

impl CacheEntry {
    pub(crate) const fn new(stored: Arc<StoredEntry>, origin: CacheOrigin, elapsed: Duration) -> Self {
        Self {
            stored,
            origin,
            elapsed,
            stale_reason: None,
        }
    }

    pub(crate) fn stale(stored: Arc<StoredEntry>, elapsed: Duration, reason: impl Into<Arc<str>>) -> Self {
        Self {
            stored,
            origin: CacheOrigin::Stale,
            elapsed,
            stale_reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.stored.payload
    }

    #[must_use]
    pub fn stored(&self) -> &Arc<StoredEntry> {
        &self.stored
    }

    #[must_use]
    pub const fn origin(&self) -> CacheOrigin {
        self.origin
    }

    /// Wall time spent inside `get_or_fetch`, fetch included.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The fetch error that caused a stale entry to be served.
    #[must_use]
    pub fn stale_reason(&self) -> Option<&str> {
        self.stale_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn entry(ttl_secs: u64) -> StoredEntry {
        let stored_at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        StoredEntry::new(json!({"solved": 1}), stored_at, Duration::from_secs(ttl_secs), Duration::from_millis(20))
    }

    #[test]
    fn remaining_ttl_counts_down_to_zero() {
        let e = entry(60);
        assert_eq!(e.remaining_ttl(e.stored_at), Duration::from_secs(60));
        assert_eq!(e.remaining_ttl(e.stored_at + TimeDelta::seconds(45)), Duration::from_secs(15));
        assert!(e.is_expired(e.stored_at + TimeDelta::seconds(60)));
        assert!(e.is_expired(e.stored_at + TimeDelta::days(3)));
    }

    #[test]
    fn future_timestamp_counts_as_just_written() {
        let e = entry(60);
        assert_eq!(e.remaining_ttl(e.stored_at - TimeDelta::seconds(30)), Duration::from_secs(60));
    }

    #[test]
    fn origin_names() {
        assert_eq!(CacheOrigin::Memory.to_string(), "memory");
        assert_eq!(serde_json::to_value(CacheOrigin::Stale).unwrap(), json!("stale"));
    }

    #[test]
    fn stored_entry_survives_json() {
        let e = entry(10);
        let text = serde_json::to_string(&e).unwrap();
        let back: StoredEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, e);
    }
}
