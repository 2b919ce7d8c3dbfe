//! `mirror run`: mirror a stream of source events.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::BoxStream;
use futures::{StreamExt, future};
use mirror_relay::{
    CorrelationStore, MirrorContext, Relay, RelayConfig, RunSummary, SourceEvent,
    StaticDirectory,
};
use mirror_telegram::{TelegramClient, TelegramConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Newline-delimited JSON events to mirror, `-` for stdin
    #[arg(long, default_value = "-")]
    pub events: String,

    /// Keep correlations in memory instead of the tracked file
    #[arg(long)]
    pub no_persist: bool,
}

/// Mirror every event from `args.events` until EOF or `shutdown`.
pub async fn run(
    args: RunArgs,
    config: &RelayConfig,
    shutdown: CancellationToken,
) -> Result<RunSummary> {
    let store = Arc::new(CorrelationStore::new(config.store_ttl()));
    let directory = Arc::new(StaticDirectory::with_ttl(
        config.directory.clone(),
        config.store_ttl(),
    ));
    let target = TelegramClient::new(TelegramConfig::from_relay(config))?;

    let ctx = Arc::new(MirrorContext {
        store,
        target: Arc::new(target),
        directory: directory.clone(),
        settings: config.handler_settings(),
    });

    let mut options = config.relay_options();
    if args.no_persist {
        options.tracked_path = None;
    }
    if let Some(path) = &options.tracked_path {
        info!(path = %path.display(), "Using tracked message file");
    }

    let reader = open_events(&args.events).await?;
    let events = event_stream(reader, directory);
    let relay = Relay::new(ctx, options);
    Ok(relay.run(events, shutdown).await?)
}

async fn open_events(source: &str) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    if source == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let path = PathBuf::from(source);
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open events file {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Parse one event per line, skipping blank and malformed lines. Created and
/// edited messages are remembered so later forwards can be resolved; deleted
/// ones are forgotten.
fn event_stream(
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    directory: Arc<StaticDirectory>,
) -> BoxStream<'static, SourceEvent> {
    LinesStream::new(reader.lines())
        .enumerate()
        .filter_map(move |(index, line)| {
            let line_no = index + 1;
            let event = match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => match serde_json::from_str::<SourceEvent>(&line) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(line = line_no, error = %e, "Skipping malformed event");
                        None
                    }
                },
                Err(e) => {
                    warn!(line = line_no, error = %e, "Failed to read event");
                    None
                }
            };
            match &event {
                Some(SourceEvent::Create(create)) => directory.remember(&create.message),
                Some(SourceEvent::Update(update)) => directory.remember(&update.message),
                Some(SourceEvent::Delete(delete)) => {
                    directory.forget(&delete.id);
                }
                None => {}
            }
            future::ready(event)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_event_stream_skips_bad_lines() {
        let input = concat!(
            r#"{"type":"create","message":{"id":"1","channel_id":"2","content":"hi"}}"#,
            "\n\nnot json\n",
            r#"{"type":"delete","id":"1","channel_id":"2"}"#,
            "\n"
        );
        let reader: Box<dyn AsyncBufRead + Send + Unpin> =
            Box::new(BufReader::new(input.as_bytes()));
        let directory = Arc::new(StaticDirectory::default());

        let events: Vec<SourceEvent> = event_stream(reader, directory.clone()).collect().await;
        let kinds: Vec<&str> = events.iter().map(SourceEvent::kind).collect();
        assert_eq!(kinds, vec!["create", "delete"]);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_event_stream_remembers_live_messages() {
        use mirror_relay::SourceDirectory;

        let input = concat!(
            r#"{"type":"create","message":{"id":"1","channel_id":"2","content":"hi"}}"#,
            "\n",
            r#"{"type":"update","message":{"id":"1","channel_id":"2","content":"edited"}}"#,
            "\n",
            r#"{"type":"create","message":{"id":"3","channel_id":"2","content":"gone"}}"#,
            "\n",
            r#"{"type":"delete","id":"3","channel_id":"2"}"#,
            "\n"
        );
        let reader: Box<dyn AsyncBufRead + Send + Unpin> =
            Box::new(BufReader::new(input.as_bytes()));
        let directory = Arc::new(StaticDirectory::default());

        let events: Vec<SourceEvent> = event_stream(reader, directory.clone()).collect().await;
        assert_eq!(events.len(), 4);
        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.fetch_message("2", "1").await.unwrap().content,
            "edited"
        );
        assert!(directory.fetch_message("2", "3").await.is_err());
    }
}
