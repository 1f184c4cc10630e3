//! Daily activity series and the unified calendar built from them.

use chrono::{DateTime, Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Estimated series never spread more than this many solves, whatever the reported total.
const MAX_ESTIMATED_EVENTS: u64 = 100_000;

/// Per-day activity counts reported by one provider.
///
/// Providers embed this under the `activity` key of their payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySeries {
    /// `true` when the counts were synthesized from a total rather than measured per day.
    #[serde(default)]
    pub estimated: bool,

    pub days: BTreeMap<NaiveDate, u32>,
}

impl ActivitySeries {
    #[must_use]
    pub const fn measured(days: BTreeMap<NaiveDate, u32>) -> Self {
        Self { estimated: false, days }
    }

    /// Count events per UTC day from Unix timestamps (seconds). Unrepresentable timestamps are skipped.
    #[must_use]
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = (i64, u32)>) -> Self {
        let mut days = BTreeMap::new();
        for (ts, count) in timestamps {
            if let Some(at) = DateTime::from_timestamp(ts, 0) {
                let slot = days.entry(at.date_naive()).or_insert(0u32);
                *slot = slot.saturating_add(count);
            }
        }
        Self::measured(days)
    }

    /// Spread `total` events over the `window_days` days ending at `today`.
    ///
    /// The placement is pseudo-random but depends only on `seed_key`, `total`, and the
    /// window, so the same handle always yields the same picture.
    #[must_use]
    pub fn estimate(seed_key: &str, total: u64, today: NaiveDate, window_days: u32) -> Self {
        let mut days = BTreeMap::new();
        if window_days == 0 {
            return Self { estimated: true, days };
        }

        let mut rng = StdRng::seed_from_u64(stable_seed(seed_key));
        for _ in 0..total.min(MAX_ESTIMATED_EVENTS) {
            let back = rng.random_range(0..u64::from(window_days));
            if let Some(day) = today.checked_sub_days(Days::new(back)) {
                *days.entry(day).or_insert(0u32) += 1;
            }
        }

        Self { estimated: true, days }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.days.values().map(|c| u64::from(*c)).sum()
    }
}

/// 64-bit FNV-1a (offset basis and prime below), so seeds do not change between toolchains.
fn stable_seed(key: &str) -> u64 {
    key.bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusiestDay {
    pub date: NaiveDate,
    pub count: u32,
}

/// Activity of every provider merged into one trailing window of days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCalendar {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: BTreeMap<NaiveDate, u32>,
    pub total: u64,
    pub active_days: u32,
    pub longest_streak: u32,

    /// Consecutive active days ending today, or ending yesterday when today has no activity yet.
    pub current_streak: u32,

    pub busiest_day: Option<BusiestDay>,

    /// Providers whose contribution was estimated rather than measured.
    pub estimated_sources: Vec<String>,
}

impl ActivityCalendar {
    /// Merge `series` into the `window_days` days ending at `today`, inclusive.
    ///
    /// Every day of the window is present, starting at zero. Days outside the window are ignored.
    #[must_use]
    pub fn build<'a>(today: NaiveDate, window_days: u32, series: impl IntoIterator<Item = (&'a str, &'a ActivitySeries)>) -> Self {
        let span = u64::from(window_days.max(1)) - 1;
        let start = today.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);

        let mut days: BTreeMap<NaiveDate, u32> = start.iter_days().take_while(|d| *d <= today).map(|d| (d, 0)).collect();
        let mut estimated_sources = Vec::new();

        for (source, s) in series {
            if s.estimated {
                estimated_sources.push(source.to_string());
            }
            for (date, count) in s.days.range(start..=today) {
                if let Some(slot) = days.get_mut(date) {
                    *slot = slot.saturating_add(*count);
                }
            }
        }

        let total = days.values().map(|c| u64::from(*c)).sum();
        let active_days = u32::try_from(days.values().filter(|c| **c > 0).count()).unwrap_or(u32::MAX);

        let mut longest_streak = 0;
        let mut run = 0;
        for count in days.values() {
            run = if *count > 0 { run + 1 } else { 0 };
            longest_streak = longest_streak.max(run);
        }

        let mut trailing = days.values().rev().peekable();
        if trailing.peek().is_some_and(|c| **c == 0) {
            let _ = trailing.next();
        }
        let current_streak = u32::try_from(trailing.take_while(|c| **c > 0).count()).unwrap_or(u32::MAX);

        // First of the maximal days wins ties.
        let busiest_day = days
            .iter()
            .filter(|(_, c)| **c > 0)
            .fold(None::<BusiestDay>, |best, (date, count)| match best {
                Some(b) if b.count >= *count => Some(b),
                _ => Some(BusiestDay { date: *date, count: *count }),
            });

        Self {
            start,
            end: today,
            days,
            total,
            active_days,
            longest_streak,
            current_streak,
            busiest_day,
            estimated_sources,
        }
    }
}
