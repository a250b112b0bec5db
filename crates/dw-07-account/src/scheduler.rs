//! # Background Loop Scheduler
//!
//! Drives `BackgroundTask`s on their intervals.
//!
//! - Each tick runs as its own tokio task; a tick never overlaps the
//!   previous one of the same loop. Interval ticks that find one still
//!   running are skipped, and every third consecutive skip is reported as
//!   `InternalError(PollOverrun)`.
//! - A failed tick is published as `InternalError` and the loop carries on.
//! - A panicking tick is published as `InternalError(BackgroundPanic)`,
//!   recorded in the fatal watch and ends that loop.
//! - `stop` lets in-flight ticks finish within the grace period, then
//!   aborts them.

use dw_telemetry::{metric_inc, time_histogram, POLL_TICKS, TICK_DURATION};
use parking_lot::Mutex;
use shared_bus::{AccountEvent, EventPublisher, InternalError};
use shared_types::{BackgroundTask, ErrorKind, TaskError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Consecutive skipped ticks reported as one overrun.
pub const OVERRUN_SKIPS: u32 = 3;

type TickHandle = JoinHandle<Result<(), TaskError>>;

/// Owns the background loops of one account.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    fatal: Arc<watch::Sender<Option<InternalError>>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    events: Arc<dyn EventPublisher>,
    grace: Duration,
}

impl Scheduler {
    pub fn new(events: Arc<dyn EventPublisher>, grace: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (fatal, _) = watch::channel(None);
        Self {
            shutdown,
            fatal: Arc::new(fatal),
            loops: Mutex::new(Vec::new()),
            events,
            grace,
        }
    }

    /// Start a loop for `task`. Must be called inside a tokio runtime.
    pub fn spawn(&self, task: Arc<dyn BackgroundTask>) {
        info!(
            task = task.name(),
            interval_ms = task.interval().as_millis() as u64,
            "[dw-07] Background loop started"
        );
        let handle = tokio::spawn(run_loop(
            task,
            self.events.clone(),
            self.shutdown.subscribe(),
            self.fatal.clone(),
            self.grace,
        ));
        self.loops.lock().push(handle);
    }

    /// Number of loops spawned and not yet stopped.
    pub fn running(&self) -> usize {
        self.loops.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// First background panic, once one happened.
    pub fn fatal(&self) -> watch::Receiver<Option<InternalError>> {
        self.fatal.subscribe()
    }

    /// Signal every loop and wait for them to drain. Idempotent.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let loops = std::mem::take(&mut *self.loops.lock());
        for handle in loops {
            if let Err(e) = handle.await {
                warn!(error = %e, "[dw-07] Background loop ended abnormally");
            }
        }
    }
}

/// Resolves with the in-flight tick's result; pending while idle.
async fn join_in_flight(slot: &mut Option<TickHandle>) -> Result<Result<(), TaskError>, JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn run_loop(
    task: Arc<dyn BackgroundTask>,
    events: Arc<dyn EventPublisher>,
    mut shutdown: watch::Receiver<bool>,
    fatal: Arc<watch::Sender<Option<InternalError>>>,
    grace: Duration,
) {
    let name = task.name();
    let mut ticker = tokio::time::interval(task.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<TickHandle> = None;
    let mut skips = 0u32;

    loop {
        tokio::select! {
            biased;
            // A dropped sender counts as a shutdown signal too.
            _ = shutdown.changed() => break,
            joined = join_in_flight(&mut in_flight) => {
                in_flight = None;
                if !report(name, joined, events.as_ref(), &fatal) {
                    return;
                }
            }
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    skips += 1;
                    metric_inc!(POLL_TICKS, &[name, "skipped"]);
                    debug!(task = name, skips, "[dw-07] Tick skipped, previous still running");
                    if skips % OVERRUN_SKIPS == 0 {
                        warn!(task = name, skips, "[dw-07] Loop overrun");
                        events.publish(AccountEvent::InternalError(
                            InternalError::new(
                                ErrorKind::PollOverrun,
                                format!("{name} skipped {skips} consecutive ticks"),
                            )
                            .with_cause(format!("interval_ms={}", task.interval().as_millis())),
                        ));
                    }
                } else {
                    skips = 0;
                    let task = task.clone();
                    in_flight = Some(tokio::spawn(async move {
                        let _timer = time_histogram!(TICK_DURATION.with_label_values(&[name]));
                        task.tick().await
                    }));
                }
            }
        }
    }

    if let Some(mut handle) = in_flight.take() {
        debug!(task = name, "[dw-07] Draining in-flight tick");
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => {
                report(name, joined, events.as_ref(), &fatal);
            }
            Err(_) => {
                warn!(task = name, grace_ms = grace.as_millis() as u64, "[dw-07] Tick aborted after grace period");
                handle.abort();
            }
        }
    }
    info!(task = name, "[dw-07] Background loop stopped");
}

/// Record a finished tick. `false` when the loop must end.
fn report(
    name: &'static str,
    joined: Result<Result<(), TaskError>, JoinError>,
    events: &dyn EventPublisher,
    fatal: &watch::Sender<Option<InternalError>>,
) -> bool {
    match joined {
        Ok(Ok(())) => {
            metric_inc!(POLL_TICKS, &[name, "ok"]);
            true
        }
        Ok(Err(err)) => {
            metric_inc!(POLL_TICKS, &[name, "error"]);
            warn!(task = name, error = %err, "[dw-07] Tick failed");
            let mut event = InternalError::new(err.kind, format!("{name}: {}", err.message));
            event.cause = err.cause;
            events.publish(AccountEvent::InternalError(event));
            true
        }
        Err(join) if join.is_panic() => {
            metric_inc!(POLL_TICKS, &[name, "panic"]);
            error!(task = name, "[dw-07] Background loop panicked");
            let event = InternalError::new(ErrorKind::BackgroundPanic, format!("{name} panicked"))
                .with_cause(join);
            events.publish(AccountEvent::InternalError(event.clone()));
            fatal.send_if_modified(|slot| {
                if slot.is_none() {
                    *slot = Some(event);
                    true
                } else {
                    false
                }
            });
            false
        }
        // Cancelled: only happens through abort during shutdown.
        Err(_) => true,
    }
}
