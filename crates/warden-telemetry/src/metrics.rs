//! Prometheus metrics for Warden execution contexts.
//!
//! All metrics follow the naming convention: `warden_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., actions_invoked_total)
//! - **Gauge**: Value that can go up or down (e.g., gate_queue_depth)
//! - **Histogram**: Distribution of values (e.g., action_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts,
    HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ACTION METRICS (Registry / Orchestrator)
    // =========================================================================

    /// Action invocations by owning zone and route taken
    pub static ref ACTIONS_INVOKED: CounterVec = CounterVec::new(
        Opts::new("warden_actions_invoked_total", "Total action invocations"),
        &["zone", "route"]  // route: local/remote
    ).expect("metric creation failed");

    /// Failed invocations by error code
    pub static ref ACTIONS_FAILED: CounterVec = CounterVec::new(
        Opts::new("warden_actions_failed_total", "Action invocations that returned an error"),
        &["code"]
    ).expect("metric creation failed");

    /// Invocation duration, including time spent queued on a concurrency key
    pub static ref ACTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "warden_action_duration_seconds",
            "Time from invocation to settled result"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("static buckets")),
        &["route"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONCURRENCY GATE METRICS
    // =========================================================================

    /// Invocations that had to queue behind a busy key
    pub static ref GATE_WAITS: Counter = Counter::new(
        "warden_gate_waits_total",
        "Invocations queued behind an occupied concurrency key"
    ).expect("metric creation failed");

    /// Invocations currently queued across all keys
    pub static ref GATE_QUEUE_DEPTH: Gauge = Gauge::new(
        "warden_gate_queue_depth",
        "Invocations waiting for a concurrency key"
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Envelopes sent to another zone
    pub static ref ENVELOPES_SENT: CounterVec = CounterVec::new(
        Opts::new("warden_envelopes_sent_total", "Envelopes sent to another zone"),
        &["channel"]  // channel: request/reply
    ).expect("metric creation failed");

    /// Envelopes received from another zone
    pub static ref ENVELOPES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("warden_envelopes_received_total", "Envelopes received from another zone"),
        &["channel"]
    ).expect("metric creation failed");

    /// Envelopes rejected at the transport boundary
    pub static ref ENVELOPES_REJECTED: CounterVec = CounterVec::new(
        Opts::new("warden_envelopes_rejected_total", "Envelopes rejected at the transport boundary"),
        &["reason"]  // reason: malformed/unknown_correlation/timeout
    ).expect("metric creation failed");

    // =========================================================================
    // FRAME IDENTITY METRICS
    // =========================================================================

    /// Iframes tagged with a resolved frame id
    pub static ref FRAMES_TAGGED: Counter = Counter::new(
        "warden_frames_tagged_total",
        "Iframe elements tagged with a resolved frame id"
    ).expect("metric creation failed");

    /// Window messages rejected by the handshake
    pub static ref FRAME_MESSAGES_REJECTED: CounterVec = CounterVec::new(
        Opts::new("warden_frame_messages_rejected_total", "Window messages rejected by the frame handshake"),
        &["reason"]  // reason: foreign/malformed/unknown_request
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics that are already registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Actions
        Box::new(ACTIONS_INVOKED.clone()),
        Box::new(ACTIONS_FAILED.clone()),
        Box::new(ACTION_DURATION.clone()),
        // Gate
        Box::new(GATE_WAITS.clone()),
        Box::new(GATE_QUEUE_DEPTH.clone()),
        // Transport
        Box::new(ENVELOPES_SENT.clone()),
        Box::new(ENVELOPES_RECEIVED.clone()),
        Box::new(ENVELOPES_REJECTED.clone()),
        // Frames
        Box::new(FRAMES_TAGGED.clone()),
        Box::new(FRAME_MESSAGES_REJECTED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
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
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}
