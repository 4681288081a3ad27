//! Metrics collection and exposition for Prometheus.
//!
//! Session, gate, geocoder and purge counters share one registry that is
//! rendered by `GET /metrics`.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
