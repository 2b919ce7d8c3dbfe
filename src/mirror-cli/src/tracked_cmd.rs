//! `mirror tracked`: inspect the correlation file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mirror_relay::{CorrelationStore, RelayConfig};

/// Arguments for the tracked command.
#[derive(Debug, Parser)]
pub struct TrackedArgs {
    /// Correlation file, defaults to the configured one
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Live entries of the correlation file, one per line or as JSON.
pub async fn tracked(args: &TrackedArgs, config: &RelayConfig) -> Result<String> {
    let path = args.path.clone().unwrap_or_else(|| config.store.path.clone());
    let store = CorrelationStore::new(config.store_ttl());
    store.load(&path).await?;
    let entries = store.snapshot();

    if args.json {
        return Ok(serde_json::to_string_pretty(&entries)?);
    }
    if entries.is_empty() {
        return Ok("No tracked messages".to_string());
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|(source_id, entry)| {
            format!(
                "{source_id}\t{}/{}\t{}",
                entry.target.chat_id,
                entry.target.message_id,
                entry.expiry.to_rfc3339()
            )
        })
        .collect();
    Ok(lines.join("\n"))
}
