//! # Live Feed
//!
//! One account listener turned into `LiveFrame`s and fanned out to any
//! number of page connections over a `broadcast` channel. A slow connection
//! lags and skips frames; it never holds up the others or the account.
//!
//! Before each `ReceivedDeposit` frame the feed pushes a `Balance` frame so
//! the page can update its totals first.

use crate::errors::ServerError;
use crate::frames::{Balance, LiveFrame};
use chrono::Utc;
use dw_07_account::{Account, AccountError};
use shared_bus::{AccountEvent, EventFilter, Listener};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Current balances of `account`.
pub async fn balance(account: &Account) -> Result<Balance, AccountError> {
    Ok(Balance {
        usable: account.available_balance().await?,
        total: account.total_balance().await?,
    })
}

pub struct LiveFeed {
    frames: broadcast::Sender<LiveFrame>,
    pump: JoinHandle<()>,
}

impl LiveFeed {
    /// Subscribe to every event of `account` and start converting.
    ///
    /// The feed ends after the `Stop` frame that follows account shutdown.
    pub async fn start(account: Arc<Account>, capacity: usize) -> Result<Self, ServerError> {
        let listener = account.events(EventFilter::all()).await?;
        let (frames, _) = broadcast::channel(capacity.max(1));
        let pump = tokio::spawn(pump(account, listener, frames.clone()));
        info!("[server] Live feed started");
        Ok(Self { frames, pump })
    }

    /// A new page connection. It sees frames published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveFrame> {
        self.frames.subscribe()
    }

    pub fn connections(&self) -> usize {
        self.frames.receiver_count()
    }

    /// Wait for the feed to end.
    pub async fn finished(self) {
        if let Err(e) = self.pump.await {
            warn!(error = %e, "[server] Live feed task failed");
        }
    }
}

async fn pump(account: Arc<Account>, mut listener: Listener, frames: broadcast::Sender<LiveFrame>) {
    while let Some(event) = listener.recv().await {
        if matches!(event, AccountEvent::ReceivedDeposit { .. }) {
            match balance(&account).await {
                Ok(b) => send(&frames, LiveFrame::balance(b, Utc::now())),
                Err(e) => debug!(error = %e, "[server] Balance unavailable for live feed"),
            }
        }
        send(&frames, LiveFrame::from_event(&event, Utc::now()));
        if event == AccountEvent::Shutdown {
            break;
        }
    }
    info!("[server] Live feed stopped");
}

fn send(frames: &broadcast::Sender<LiveFrame>, frame: LiveFrame) {
    // No connections is not an error.
    let _ = frames.send(frame);
}
