//! Fetching, caching and aggregation of profile statistics
//!
//! This module gathers per-platform statistics for a user handle from many unreliable
//! upstream services and combines them into one [`BatchResponse`].
//!
//! # Implementation Model
//!
//! - **Providers** ([`Provider`]): one per platform, registered in a [`ProviderRegistry`].
//!   A provider turns a handle into a [`ProviderResult`]; "not found" and "rate limited"
//!   are ordinary results, never errors.
//! - **Transport** ([`RetryingTransport`]): per-attempt timeouts, bounded retry, and
//!   exponential backoff for every outbound call.
//! - **Cache** ([`CacheStore`]): a bounded in-process tier in front of a shared tier, with
//!   stale results served when a fresh fetch fails.
//! - **Collector** ([`Collector`]): runs a [`BatchRequest`] in bounded-size chunks so that
//!   one failing provider never aborts the batch.
//! - **Aggregation** ([`aggregate`]): totals, a unified activity calendar, and a
//!   data-quality score across all providers.

pub mod activity;
mod aggregate;
mod batch;
pub mod cache;
mod collector;
mod outcome;
mod progress;
mod provider;
mod provider_result;
pub mod providers;
pub mod resilient_http;

pub use activity::{ActivityCalendar, ActivitySeries, BusiestDay};
pub use aggregate::{AggregateReport, Totals, aggregate};
pub use batch::BatchRequest;
pub use cache::{CacheEntry, CacheKey, CacheOrigin, CacheSettings, CacheStore};
pub use collector::{Collector, CollectorSettings};
pub use outcome::{BatchResponse, BatchStatus, CacheInfo, ProviderOutcome};
pub use progress::{NoProgress, Progress};
pub use provider::{MetricFields, Provider, ProviderRegistry};
pub use provider_result::{Payload, ProviderResult};
pub use resilient_http::{RetryPolicy, RetryingTransport, TransportError};
