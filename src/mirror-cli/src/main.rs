//! Mirror - Discord to Telegram message relay.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mirror_cli::render_cmd::{RenderArgs, render};
use mirror_cli::run_cmd::{RunArgs, run};
use mirror_cli::tracked_cmd::{TrackedArgs, tracked};
use mirror_cli::{load_config, setup_logging};

/// Mirror Discord channel messages into a Telegram chat
#[derive(Parser)]
#[command(name = "mirror")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror newline-delimited JSON events
    Run(RunArgs),
    /// Transcode text to MarkdownV2
    Render(RenderArgs),
    /// List tracked message correlations
    Tracked(TrackedArgs),
}

/// Cancelled on Ctrl+C or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
        }
        trigger.cancel();
    });
    token
}

async fn execute(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Run(run_args) => {
            let summary = run(run_args, &config, shutdown_token()).await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Render(render_args) => {
            println!("{}", render(&render_args, &config.directory)?);
        }
        Command::Tracked(tracked_args) => {
            println!("{}", tracked(&tracked_args, &config).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
