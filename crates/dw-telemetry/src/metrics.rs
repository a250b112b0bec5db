//! Prometheus metrics for the donation wallet.
//!
//! All metrics follow the naming convention: `dw_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS
    // =========================================================================

    /// Events published by variant
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("dw_bus_events_published_total", "Events published by variant"),
        &["variant"]
    ).expect("metric creation failed");

    /// Events dropped for slow listeners by variant
    pub static ref EVENTS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("dw_bus_events_dropped_total", "Events dropped because a listener channel was full"),
        &["variant"]
    ).expect("metric creation failed");

    // =========================================================================
    // BACKGROUND LOOPS
    // =========================================================================

    /// Ticks by loop and outcome (ok, error, skipped, panic)
    pub static ref POLL_TICKS: CounterVec = CounterVec::new(
        Opts::new("dw_loop_ticks_total", "Background loop ticks by outcome"),
        &["task", "outcome"]
    ).expect("metric creation failed");

    /// Tick duration by loop
    pub static ref TICK_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("dw_loop_tick_duration_seconds", "Time spent in one background tick")
            .buckets(exponential_buckets(0.001, 2.0, 15).unwrap_or_default()),
        &["task"]
    ).expect("metric creation failed");

    // =========================================================================
    // QUORUM
    // =========================================================================

    /// Quorum outcomes (agreed, unavailable, disagreement)
    pub static ref QUORUM_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("dw_quorum_outcomes_total", "Quorum evaluations by outcome"),
        &["command", "outcome"]
    ).expect("metric creation failed");

    /// Round-trip time of a single node request
    pub static ref NODE_REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("dw_quorum_node_request_duration_seconds", "Single node request latency")
            .buckets(exponential_buckets(0.005, 2.0, 12).unwrap_or_default())
    ).expect("metric creation failed");

    // =========================================================================
    // BUNDLES
    // =========================================================================

    /// Promotions published
    pub static ref BUNDLES_PROMOTED: Counter = Counter::new(
        "dw_bundles_promoted_total",
        "Zero-value promotions published for pending bundles"
    ).expect("metric creation failed");

    /// Reattachments published
    pub static ref BUNDLES_REATTACHED: Counter = Counter::new(
        "dw_bundles_reattached_total",
        "Pending bundles reattached with fresh tips"
    ).expect("metric creation failed");

    /// Outgoing bundles attached by `send`
    pub static ref BUNDLES_SENT: Counter = Counter::new(
        "dw_bundles_sent_total",
        "Outgoing bundles attached and persisted as pending"
    ).expect("metric creation failed");

    /// Deposit addresses handed out, change addresses included
    pub static ref ADDRESSES_ALLOCATED: Counter = Counter::new(
        "dw_addresses_allocated_total",
        "Deposit addresses allocated"
    ).expect("metric creation failed");

    /// Outgoing bundles confirmed
    pub static ref BUNDLES_CONFIRMED: Counter = Counter::new(
        "dw_bundles_confirmed_total",
        "Outgoing bundles observed as confirmed"
    ).expect("metric creation failed");

    /// Incoming deposits confirmed
    pub static ref DEPOSITS_RECEIVED: Counter = Counter::new(
        "dw_deposits_received_total",
        "Incoming value bundles observed as confirmed"
    ).expect("metric creation failed");

    static ref REGISTERED: Result<(), String> = register_all();
}

fn register_all() -> Result<(), String> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Event bus
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        // Loops
        Box::new(POLL_TICKS.clone()),
        Box::new(TICK_DURATION.clone()),
        // Quorum
        Box::new(QUORUM_OUTCOMES.clone()),
        Box::new(NODE_REQUEST_DURATION.clone()),
        // Bundles
        Box::new(BUNDLES_SENT.clone()),
        Box::new(ADDRESSES_ALLOCATED.clone()),
        Box::new(BUNDLES_PROMOTED.clone()),
        Box::new(BUNDLES_REATTACHED.clone()),
        Box::new(BUNDLES_CONFIRMED.clone()),
        Box::new(DEPOSITS_RECEIVED.clone()),
    ];

    for metric in metrics {
        REGISTRY.register(metric).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    (*REGISTERED).clone().map_err(TelemetryError::MetricsInit)
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
