//! Shared pieces of the `mirror` binary.
//!
//! - `run_cmd` mirrors a newline-delimited JSON event stream
//! - `render_cmd` transcodes text or dumps its AST
//! - `tracked_cmd` lists the entries of a correlation file

use std::path::Path;

use anyhow::{Context, Result};
use mirror_relay::RelayConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod render_cmd;
pub mod run_cmd;
pub mod tracked_cmd;

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
/// Logs go to stderr so command output on stdout stays parseable.
pub fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config file (if any) overridden by the environment, then validated.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    let mut config = match path {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid configuration in environment")?;
    config.validate()?;
    Ok(config)
}
