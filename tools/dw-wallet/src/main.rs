//! dw-wallet: pay magnet links from the terminal.
//!
//! Exit codes: `0` clean shutdown (SIGINT, SIGTERM, end of input), `1`
//! configuration or I/O failure at startup, `2` background loop panic.

use anyhow::{Context, Result};
use clap::Parser;
use dw_07_account::{open_account, Account, WalletConfig};
use dw_telemetry::{init_logging, register_metrics, TelemetryConfig};
use dw_wallet::{Command, Session};
use shared_bus::{AccountEvent, EventFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Interactive donation wallet
#[derive(Parser, Debug)]
#[command(name = "dw-wallet", version)]
#[command(about = "Pay donation magnet links from the terminal")]
struct Args {
    /// Wallet configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Amount sent to every pasted link
    #[arg(short, long, default_value_t = 10)]
    amount: u64,
}

enum Stop {
    Clean,
    Panicked,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&TelemetryConfig::for_service("dw-wallet")) {
        eprintln!("logging: {e}");
    }

    let account = match open(&args).await {
        Ok(account) => account,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed");
            eprintln!("error: {e:#}");
            return ExitCode::from(1);
        }
    };

    let stop = run(account.clone(), args.amount).await;
    account.shutdown().await;
    match stop {
        Ok(Stop::Clean) => ExitCode::SUCCESS,
        Ok(Stop::Panicked) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn open(args: &Args) -> Result<Arc<Account>> {
    register_metrics().context("registering metrics")?;
    let config = WalletConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let account = Arc::new(open_account(&config).context("opening account")?);
    account.start().await.context("starting account")?;
    Ok(account)
}

async fn run(account: Arc<Account>, amount: u64) -> Result<Stop> {
    let mut fatal = account.fatal();
    let mut events = account
        .events(EventFilter::all())
        .await
        .context("subscribing to events")?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let session = Session::new(account, amount);
    println!("{}", session.greet().await.context("allocating own address")?);

    let mut lines = stdin_lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("waiting for shutdown signal")?;
                info!("Shutdown signal received");
                return Ok(Stop::Clean);
            }
            changed = fatal.changed() => {
                if changed.is_ok() {
                    if let Some(err) = fatal.borrow().as_ref() {
                        error!(kind = %err.kind, message = %err.message, "Background loop panicked");
                    }
                }
                return Ok(Stop::Panicked);
            }
            line = lines.recv() => {
                let Some(line) = line.transpose().context("reading stdin")? else {
                    info!("End of input");
                    return Ok(Stop::Clean);
                };
                if let Some(output) = session.handle(Command::parse(&line)).await {
                    println!("{output}");
                }
            }
        }
    }
}

/// Stdin is read on a plain thread so a pending read never holds up exit.
fn stdin_lines() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn log_event(event: &AccountEvent) {
    match event {
        AccountEvent::InternalError(err) => {
            warn!(kind = %err.kind, message = %err.message, cause = ?err.cause, "Account error")
        }
        other => info!(kind = %other.kind(), bundle = ?other.bundle_hash(), "Account event"),
    }
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
