//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_int_counter_with_registry, CounterVec, Encoder, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records the outcome of a register or login attempt.
    fn record_session_attempt(&self, flow: &str, result: &str);

    /// Records how long a register or login attempt took.
    fn record_session_duration(&self, flow: &str, duration_secs: f64);

    /// Records an authorization-gate decision (`ok`, `missing`, `invalid`, `expired`).
    fn record_gate_decision(&self, result: &str);

    /// Records a postcode lookup (`ok`, `not_found`, `unavailable`).
    fn record_geocode_lookup(&self, result: &str);

    /// Records refresh tokens removed by a purge run.
    fn record_refresh_tokens_purged(&self, count: u64);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    sessions_total: CounterVec,
    session_duration_seconds: HistogramVec,
    gate_decisions_total: CounterVec,
    geocode_lookups_total: CounterVec,
    refresh_tokens_purged_total: IntCounter,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let sessions_total = register_counter_vec_with_registry!(
            Opts::new(
                "sessions_issued_total",
                "Register and login attempts by outcome"
            ),
            &["flow", "result"],
            registry.clone()
        )
        .expect("Failed to register sessions_issued_total");

        // bcrypt dominates, so the buckets start higher than a plain HTTP histogram.
        let session_duration_seconds = register_histogram_vec_with_registry!(
            "session_duration_seconds",
            "Register and login duration in seconds",
            &["flow"],
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register session_duration_seconds");

        let gate_decisions_total = register_counter_vec_with_registry!(
            Opts::new(
                "gate_decisions_total",
                "Bearer-token checks on protected routes by outcome"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register gate_decisions_total");

        let geocode_lookups_total = register_counter_vec_with_registry!(
            Opts::new("geocode_lookups_total", "Postcode lookups by outcome"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register geocode_lookups_total");

        let refresh_tokens_purged_total = register_int_counter_with_registry!(
            Opts::new(
                "refresh_tokens_purged_total",
                "Expired refresh tokens deleted by the purge task"
            ),
            registry.clone()
        )
        .expect("Failed to register refresh_tokens_purged_total");

        Metrics {
            registry,
            sessions_total,
            session_duration_seconds,
            gate_decisions_total,
            geocode_lookups_total,
            refresh_tokens_purged_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| format!("Metrics were not UTF-8: {}", e))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_session_attempt(&self, flow: &str, result: &str) {
        self.sessions_total.with_label_values(&[flow, result]).inc();
    }

    fn record_session_duration(&self, flow: &str, duration_secs: f64) {
        self.session_duration_seconds
            .with_label_values(&[flow])
            .observe(duration_secs);
    }

    fn record_gate_decision(&self, result: &str) {
        self.gate_decisions_total.with_label_values(&[result]).inc();
    }

    fn record_geocode_lookup(&self, result: &str) {
        self.geocode_lookups_total.with_label_values(&[result]).inc();
    }

    fn record_refresh_tokens_purged(&self, count: u64) {
        self.refresh_tokens_purged_total.inc_by(count);
    }
}
