use super::Host;
use super::ProgressReporter;
use super::common::{ColorMode, LogLevel, init_logging, load_config};
use crate::Result;
use crate::config::Config;
use crate::reports::{generate_console, generate_json};
use crate::stats::cache::connect_shared_tier;
use crate::stats::providers::{ProviderOptions, standard_registry};
use crate::stats::{
    BatchRequest, BatchResponse, BatchStatus, CacheSettings, CacheStore, Collector, CollectorSettings, ProviderRegistry, RetryPolicy,
    RetryingTransport,
};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use std::fs;
use std::io::{IsTerminal, Write};
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "     fetch";

/// Output format of the `fetch` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Console,

    /// The full batch response as JSON
    Json,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// A `provider=handle` pair to query; repeat for several providers
    #[arg(long = "handle", short = 'H', value_name = "PROVIDER=HANDLE", required_unless_present = "request")]
    pub handles: Vec<String>,

    /// JSON file holding an object that maps provider names to handles
    #[arg(long, value_name = "PATH", conflicts_with = "handles")]
    pub request: Option<Utf8PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "console")]
    pub format: OutputFormat,

    /// Write the report to a file instead of the terminal
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Ignore cached results and fetch everything fresh
    #[arg(long)]
    pub refresh: bool,

    /// Path to configuration file (default is `rollup.toml` in the current directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Redis URL of the shared cache, overriding the configuration file
    #[arg(long, value_name = "URL", env = "ROLLUP_SHARED_CACHE_URL")]
    pub shared_cache_url: Option<String>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,

    /// Exit with status code 1 unless every provider returned data
    #[arg(long)]
    pub fail_on_partial: bool,
}

/// Split a `provider=handle` argument.
fn parse_handle_arg(arg: &str) -> Result<(String, String)> {
    let (provider, handle) = arg
        .split_once('=')
        .ok_or_else(|| app_err!("expected PROVIDER=HANDLE, found '{arg}'"))?;
    Ok((provider.trim().to_lowercase(), handle.to_string()))
}

fn build_request(args: &FetchArgs, registry: &ProviderRegistry) -> Result<BatchRequest> {
    if let Some(path) = &args.request {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading request from {path}"))?;
        return BatchRequest::parse(&text, registry).map_err(|e| e.enrich_with(|| format!("invalid request file {path}")));
    }

    if args.handles.is_empty() {
        bail!("nothing to fetch: pass --handle PROVIDER=HANDLE or --request PATH");
    }

    let pairs = args.handles.iter().map(|arg| parse_handle_arg(arg)).collect::<Result<Vec<_>>>()?;
    BatchRequest::from_pairs(pairs, registry)
}

fn build_registry(config: &Config, github_token: Option<&str>) -> Result<ProviderRegistry> {
    let transport = RetryingTransport::new(
        &config.user_agent,
        RetryPolicy {
            max_attempts: config.retry_attempts,
            base_delay: config.retry_base_delay(),
            attempt_timeout: config.request_timeout(),
        },
    )?;

    Ok(standard_registry(
        &transport,
        &ProviderOptions {
            github_token: github_token.map(str::to_string),
            activity_window_days: config.activity_window_days,
        },
    ))
}

/// Fetch statistics for the requested handles and report them.
///
/// # Errors
///
/// Returns an error if the configuration or the request is invalid, or the report cannot be written
pub async fn process_fetch<H: Host>(host: &mut H, args: &FetchArgs) -> Result<()> {
    init_logging(args.log_level);

    let mut config = load_config(host, args.config.as_ref())?;
    if let Some(url) = &args.shared_cache_url {
        config.shared_cache_url = Some(url.clone()).filter(|u| !u.trim().is_empty());
    }

    let registry = build_registry(&config, args.github_token.as_deref())?;
    let request = build_request(args, &registry)?;
    let response = fetch(&config, registry, &request, args).await;

    let use_colors = args.output.is_none() && args.color.use_colors(std::io::stdout().is_terminal());
    let mut report = String::new();
    match args.format {
        OutputFormat::Console => generate_console(&response, use_colors, &mut report)?,
        OutputFormat::Json => generate_json(&response, &mut report)?,
    }

    if let Some(path) = &args.output {
        fs::write(path, &report).into_app_err_with(|| format!("writing report to {path}"))?;
        let _ = writeln!(host.output(), "Report written to {path}");
    } else {
        let _ = write!(host.output(), "{report}");
    }

    if args.fail_on_partial && response.status != BatchStatus::Success {
        host.exit(1);
    }

    Ok(())
}

async fn fetch(config: &Config, registry: ProviderRegistry, request: &BatchRequest, args: &FetchArgs) -> BatchResponse {
    let shared = connect_shared_tier(config.shared_cache_url.as_deref(), config.shared_cache_timeout().max(Duration::from_secs(1))).await;
    let mut cache = CacheStore::new(CacheSettings::from_config(config), shared);
    if args.refresh {
        cache = cache.with_bypass();
    }

    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_hours(365 * 24)
    };
    let progress = ProgressReporter::new(delay, args.color.use_colors(std::io::stderr().is_terminal()));
    let collector = Collector::new(registry, cache, CollectorSettings::from_config(config), progress);

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!(target: LOG_TARGET, "Interrupted, cancelling outstanding requests");
                cancel.cancel();
            }
        }
    });

    let response = collector.collect(request, &cancel).await;
    ctrl_c.abort();
    response
}
