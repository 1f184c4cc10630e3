use super::aggregate::aggregate;
use super::cache::{CacheKey, CacheStore};
use super::outcome::{BatchResponse, CacheInfo, ProviderOutcome};
use super::progress::Progress;
use super::{BatchRequest, ProviderRegistry, ProviderResult};
use chrono::{NaiveDate, Utc};
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = " collector";

const CANCELLED: &str = "cancelled";
const DEADLINE_EXCEEDED: &str = "cancelled: batch deadline exceeded";

/// Scheduling knobs of a [`Collector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Provider calls in flight at once. Zero is treated as one.
    pub chunk_size: usize,

    /// Pause between two chunks.
    pub chunk_delay: Duration,

    /// TTL given to freshly fetched results.
    pub cache_ttl: Duration,

    /// Wall-clock budget of a whole batch.
    pub batch_deadline: Option<Duration>,

    pub activity_window_days: u32,
}

impl CollectorSettings {
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_delay: config.chunk_delay(),
            cache_ttl: config.cache_ttl(),
            batch_deadline: config.batch_deadline(),
            activity_window_days: config.activity_window_days,
        }
    }
}

/// Runs batches of provider calls through the cache, a bounded number at a time.
pub struct Collector {
    registry: ProviderRegistry,
    cache: CacheStore,
    settings: CollectorSettings,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for Collector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collector")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl Collector {
    #[must_use]
    pub fn new(registry: ProviderRegistry, cache: CacheStore, settings: CollectorSettings, progress: impl Progress + 'static) -> Self {
        Self {
            registry,
            cache,
            settings,
            progress: Arc::new(progress),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run `request` and aggregate the outcomes as of today (UTC).
    pub async fn collect(&self, request: &BatchRequest, cancel: &CancellationToken) -> BatchResponse {
        self.collect_at(request, cancel, Utc::now().date_naive()).await
    }

    /// Run `request` and aggregate the outcomes with `today` as the last calendar day.
    pub async fn collect_at(&self, request: &BatchRequest, cancel: &CancellationToken, today: NaiveDate) -> BatchResponse {
        let start = Instant::now();
        let outcomes = self.collect_outcomes(request, cancel, today).await;
        let report = aggregate(&outcomes, &self.registry.metric_rules(), today, self.settings.activity_window_days);
        let response = BatchResponse::new(outcomes, report, start.elapsed());

        log::info!(
            target: LOG_TARGET,
            "Batch of {} provider(s) finished in {}ms: {}",
            request.len(),
            response.processing_time_ms,
            response.status
        );

        response
    }

    /// Obtain one outcome per requested pair, with `today` as the end of each provider's activity window.
    ///
    /// Pairs are processed in chunks of `chunk_size`; a chunk starts only after the
    /// previous one has fully settled and the chunk delay has passed. Cancelling `cancel`
    /// or reaching the batch deadline fails every unsettled pair instead of waiting.
    pub async fn collect_outcomes(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
        today: NaiveDate,
    ) -> BTreeMap<String, ProviderOutcome> {
        let deadline = self.settings.batch_deadline.map(|d| tokio::time::Instant::now() + d);
        let total = request.len() as u64;
        let settled = Arc::new(AtomicU64::new(0));

        self.progress.set_phase("Fetching");
        let settled_for_progress = Arc::clone(&settled);
        self.progress.set_determinate(Box::new(move || {
            let current = settled_for_progress.load(Ordering::Relaxed);
            (total, current, format!("{current}/{total} providers"))
        }));

        let chunk_size = self.settings.chunk_size.max(1);
        let chunk_count = request.len().div_ceil(chunk_size);
        let mut outcomes = BTreeMap::new();
        let mut stopped: Option<&'static str> = None;

        for (index, chunk) in request.pairs().chunks(chunk_size).enumerate() {
            if stopped.is_none() {
                stopped = interruption(cancel, deadline);
            }

            if let Some(reason) = stopped {
                for (provider, handle) in chunk {
                    let _ = outcomes.insert(provider.clone(), ProviderOutcome::new(handle, ProviderResult::failed(reason), None, Duration::ZERO));
                }
                let _ = settled.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                continue;
            }

            log::debug!(target: LOG_TARGET, "Starting chunk {}/{chunk_count} with {} call(s)", index + 1, chunk.len());

            let calls = chunk.iter().map(|(provider, handle)| {
                let settled = Arc::clone(&settled);
                async move {
                    let start = Instant::now();
                    let outcome = tokio::select! {
                        outcome = self.fetch_one(provider, handle, today) => outcome,
                        reason = wait_for_interruption(cancel, deadline) => {
                            ProviderOutcome::new(handle.as_str(), ProviderResult::failed(reason), None, start.elapsed())
                        }
                    };
                    let _ = settled.fetch_add(1, Ordering::Relaxed);
                    (provider.clone(), outcome)
                }
            });

            outcomes.extend(join_all(calls).await);

            if index + 1 < chunk_count && !self.settings.chunk_delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.settings.chunk_delay) => {}
                    reason = wait_for_interruption(cancel, deadline) => stopped = Some(reason),
                }
            }
        }

        self.progress.done();
        outcomes
    }

    async fn fetch_one(&self, provider_name: &str, handle: &str, today: NaiveDate) -> ProviderOutcome {
        let start = Instant::now();

        let Some(provider) = self.registry.get(provider_name) else {
            return ProviderOutcome::new(handle, ProviderResult::failed("unknown provider"), None, start.elapsed());
        };

        if let Some(reason) = provider.unavailable_reason() {
            log::debug!(target: LOG_TARGET, "Skipping {provider_name}: {reason}");
            return ProviderOutcome::new(handle, ProviderResult::unavailable(reason), None, start.elapsed());
        }

        let key = CacheKey::new(provider_name, handle);
        let result = self
            .cache
            .get_or_fetch(&key, self.settings.cache_ttl, || async { provider.fetch(handle, today).await.into_payload() })
            .await;

        match result {
            Ok(entry) => {
                log::debug!(target: LOG_TARGET, "{key}: ok ({})", entry.origin());
                ProviderOutcome::new(
                    handle,
                    ProviderResult::Ok(entry.payload().clone()),
                    Some(CacheInfo::from(&entry)),
                    start.elapsed(),
                )
            }
            Err(result) => {
                log::debug!(target: LOG_TARGET, "{key}: {result}");
                ProviderOutcome::new(handle, result, None, start.elapsed())
            }
        }
    }
}

fn interruption(cancel: &CancellationToken, deadline: Option<tokio::time::Instant>) -> Option<&'static str> {
    if cancel.is_cancelled() {
        Some(CANCELLED)
    } else if deadline.is_some_and(|at| tokio::time::Instant::now() >= at) {
        Some(DEADLINE_EXCEEDED)
    } else {
        None
    }
}

async fn wait_for_interruption(cancel: &CancellationToken, deadline: Option<tokio::time::Instant>) -> &'static str {
    let deadline_reached = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => core::future::pending().await,
        }
    };

    tokio::select! {
        () = cancel.cancelled() => CANCELLED,
        () = deadline_reached => DEADLINE_EXCEEDED,
    }
}
