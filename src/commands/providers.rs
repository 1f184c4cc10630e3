use super::Host;
use super::common::load_config;
use crate::Result;
use crate::stats::providers::{ProviderOptions, standard_registry};
use crate::stats::{RetryPolicy, RetryingTransport};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ProvidersArgs {
    /// Path to configuration file (default is `rollup.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// List the registered providers and whether each one can be queried.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded
pub fn list_providers<H: Host>(host: &mut H, args: &ProvidersArgs) -> Result<()> {
    let config = load_config(host, args.config.as_ref())?;
    let transport = RetryingTransport::new(&config.user_agent, RetryPolicy::default())?;
    let registry = standard_registry(
        &transport,
        &ProviderOptions {
            github_token: None,
            activity_window_days: config.activity_window_days,
        },
    );

    let width = registry.names().map(str::len).max().unwrap_or(0);
    for provider in registry.iter() {
        let status = provider.unavailable_reason().map_or_else(|| "available".to_string(), |reason| format!("unavailable ({reason})"));
        let _ = writeln!(host.output(), "{:<width$}  {status}", provider.name());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    fn lists_every_provider() {
        let mut host = TestHost::new();
        list_providers(&mut host, &ProvidersArgs { config: None }).unwrap();

        let text = host.output_text();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().any(|l| l.starts_with("codeforces") && l.ends_with("available")));
        assert!(text.contains("hackerrank  unavailable ("));
    }
}
