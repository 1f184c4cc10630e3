//! Cross-provider view of a completed batch.

use super::activity::{ActivityCalendar, ActivitySeries};
use super::outcome::ProviderOutcome;
use super::{MetricFields, Payload, ProviderResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub solved: u64,
    pub contests: u64,
    pub followers: u64,
}

/// Derived statistics over one batch. Rebuilt for every batch and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub requested: usize,
    pub succeeded: Vec<String>,

    /// Failed and rate-limited providers.
    pub failed: Vec<String>,

    pub unavailable: Vec<String>,
    pub totals: Totals,
    pub activity: ActivityCalendar,

    /// Fraction of requested providers that returned data, from 0 to 1.
    pub data_quality: f64,
}

/// Fold per-provider outcomes into an [`AggregateReport`].
///
/// Metrics are located through each provider's [`MetricFields`]; a missing rule, a
/// missing field, or a field that is not an unsigned integer contributes zero.
#[must_use]
pub fn aggregate(
    outcomes: &BTreeMap<String, ProviderOutcome>,
    rules: &BTreeMap<String, MetricFields>,
    today: NaiveDate,
    window_days: u32,
) -> AggregateReport {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut unavailable = Vec::new();
    let mut totals = Totals::default();
    let mut series = Vec::new();

    for (name, outcome) in outcomes {
        match &outcome.result {
            ProviderResult::Ok(payload) => {
                succeeded.push(name.clone());

                let fields = rules.get(name).copied().unwrap_or_default();
                totals.solved = totals.solved.saturating_add(metric(payload, fields.solved));
                totals.contests = totals.contests.saturating_add(metric(payload, fields.contests));
                totals.followers = totals.followers.saturating_add(metric(payload, fields.followers));

                if let Some(activity) = fields
                    .activity
                    .and_then(|pointer| payload.pointer(pointer))
                    .and_then(|value| serde_json::from_value::<ActivitySeries>(value.clone()).ok())
                {
                    series.push((name.as_str(), activity));
                }
            }
            ProviderResult::Failed(_) | ProviderResult::RateLimited(_) => failed.push(name.clone()),
            ProviderResult::Unavailable(_) => unavailable.push(name.clone()),
        }
    }

    let activity = ActivityCalendar::build(today, window_days, series.iter().map(|(name, s)| (*name, s)));

    let requested = outcomes.len();
    #[expect(clippy::cast_precision_loss, reason = "provider counts are tiny")]
    let data_quality = if requested == 0 {
        0.0
    } else {
        succeeded.len() as f64 / requested as f64
    };

    AggregateReport {
        requested,
        succeeded,
        failed,
        unavailable,
        totals,
        activity,
        data_quality,
    }
}

fn metric(payload: &Payload, pointer: Option<&str>) -> u64 {
    pointer.and_then(|p| payload.pointer(p)).and_then(serde_json::Value::as_u64).unwrap_or(0)
}
