use super::Host;
use crate::Result;
use crate::config::Config;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `rollup.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Load the configuration and the `ROLLUP_*` overrides, then report problems.
fn validate_config_inner(base_path: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Vec<String>> {
    let (mut config, _) = Config::load(base_path, config_path)?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    let config_path = args.config.as_ref();

    match validate_config_inner(Utf8Path::new("."), config_path) {
        Ok(warnings) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = config_path {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else {
                let _ = writeln!(host.output(), "Using configuration from the current directory or built-in defaults");
            }
            for warning in warnings {
                let _ = writeln!(host.output(), "warning: {warning}");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
