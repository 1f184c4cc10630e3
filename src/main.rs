//! Gather competitive-programming profile statistics for one person from many platforms.
//!
//! # Overview
//!
//! `profile-rollup` asks Codeforces, LeetCode, GitHub, AtCoder, CodeChef and friends about a
//! set of handles, caches what they return in-process and optionally in Redis, and folds the
//! answers into one report with totals, a merged activity calendar and a data-quality score.
//! Upstream services are slow and flaky, so every request is retried with exponential backoff
//! and a provider that fails never takes the rest of the batch down with it.
//!
//! # Quick Start
//!
//! ```bash
//! profile-rollup fetch --handle codeforces=tourist --handle github=octocat
//! ```
//!
//! Use `--format json` for the full response, `--refresh` to skip the cache, and
//! `--request batch.json` to read the handles from a JSON object instead.
//!
//! # Configuration
//!
//! `profile-rollup init` writes `rollup.yml` with every knob documented. Any value can also be
//! set through a `ROLLUP_<FIELD>` environment variable, for example
//! `ROLLUP_SHARED_CACHE_URL=redis://localhost:6379`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use profile_rollup::{Host, run};
use std::io::Write;
use std::io::{stderr, stdout};

/// Default host that runs real OS commands.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() -> Result<(), ohno::AppError> {
    run(&mut RealHost, std::env::args()).await
}
