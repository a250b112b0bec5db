//! # donation-server
//!
//! Runs the account behind a donation page: prints the current donation
//! link and balance, then streams live frames to stdout as JSON lines until
//! SIGINT/SIGTERM.
//!
//! Exit codes: `0` clean shutdown, `1` startup failure, `2` background panic.

use anyhow::{bail, Context, Result};
use clap::Parser;
use donation_server::{balance, DonationLinks, LiveFeed, DEFAULT_FEED_CAPACITY};
use dw_07_account::{open_account, WalletConfig};
use dw_telemetry::{init_logging, register_metrics, TelemetryConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "donation-server", version, about = "Donation page account server")]
struct Args {
    /// Wallet configuration (JSON).
    #[arg(long, short)]
    config: PathBuf,

    /// Frames buffered per live connection before it lags.
    #[arg(long, default_value_t = DEFAULT_FEED_CAPACITY)]
    feed_capacity: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&TelemetryConfig::for_service("donation-server")) {
        eprintln!("logging: {e}");
    }
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    register_metrics().context("registering metrics")?;
    let config = WalletConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let Some(data_dir) = config.data_dir.clone() else {
        bail!("donation-server needs data_dir for the donation link record");
    };

    let account = Arc::new(open_account(&config).context("opening account")?);
    account.start().await.context("starting account")?;
    let mut fatal = account.fatal();

    let links = DonationLinks::open(account.clone(), &data_dir).context("reading donation link")?;
    let link = links.magnet().await.context("allocating donation link")?;
    println!("donation link: {link}");
    match balance(&account).await {
        Ok(b) => println!("balance: {}", serde_json::to_string(&b)?),
        Err(e) => warn!(error = %e, "Balance unavailable"),
    }

    let feed = LiveFeed::start(account.clone(), args.feed_capacity)
        .await
        .context("starting live feed")?;
    let mut frames = feed.subscribe();
    let writer = tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(frame) => match frame.to_json() {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "Unencodable frame"),
                },
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Live output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Server running. Press Ctrl+C to stop.");
    let panicked = tokio::select! {
        signal = shutdown_signal() => {
            signal.context("waiting for shutdown signal")?;
            info!("Shutdown signal received");
            false
        }
        changed = fatal.changed() => {
            if changed.is_ok() {
                if let Some(err) = fatal.borrow().as_ref() {
                    error!(kind = %err.kind, message = %err.message, "Background loop panicked");
                }
            }
            true
        }
    };

    account.shutdown().await;
    feed.finished().await;
    if let Err(e) = writer.await {
        warn!(error = %e, "Live output task failed");
    }
    Ok(if panicked {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
