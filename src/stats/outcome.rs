use super::ProviderResult;
use super::aggregate::AggregateReport;
use super::cache::{CacheEntry, CacheOrigin};
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

/// Cache metadata of an outcome that was served through the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub origin: CacheOrigin,
    pub stored_at: DateTime<Utc>,
    pub fetch_latency_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
}

impl From<&CacheEntry> for CacheInfo {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            origin: entry.origin(),
            stored_at: entry.stored().stored_at,
            fetch_latency_ms: millis(entry.stored().fetch_latency),
            stale_reason: entry.stale_reason().map(str::to_string),
        }
    }
}

/// One slot of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub handle: String,
    pub result: ProviderResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheInfo>,

    /// Wall time spent on this slot.
    pub elapsed_ms: u64,
}

impl ProviderOutcome {
    #[must_use]
    pub fn new(handle: impl Into<String>, result: ProviderResult, cache: Option<CacheInfo>, elapsed: Duration) -> Self {
        Self {
            handle: handle.into(),
            result,
            cache,
            elapsed_ms: millis(elapsed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatchStatus {
    /// Every requested provider returned data.
    Success,

    /// Some providers returned data.
    Partial,

    /// No provider returned data.
    Failed,
}

impl BatchStatus {
    #[must_use]
    pub const fn from_counts(succeeded: usize, requested: usize) -> Self {
        if requested > 0 && succeeded == requested {
            Self::Success
        } else if succeeded > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: BatchStatus,
    pub results: BTreeMap<String, ProviderOutcome>,
    pub aggregate: AggregateReport,
    pub processing_time_ms: u64,
}

impl BatchResponse {
    #[must_use]
    pub fn new(results: BTreeMap<String, ProviderOutcome>, aggregate: AggregateReport, processing_time: Duration) -> Self {
        Self {
            status: BatchStatus::from_counts(aggregate.succeeded.len(), aggregate.requested),
            results,
            aggregate,
            processing_time_ms: millis(processing_time),
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
