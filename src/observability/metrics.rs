//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_launch_total{outcome}` (counter): launches by outcome
//!   (relayed, direct, cdn, passthrough, failed)
//! - `relay_launch_duration_seconds` (histogram): time spent in `launch`
//! - `relay_attempts_total{signal}` (counter): relay attempts by the signal
//!   they returned (ok, error, switched, transport)
//! - `relay_fast_path_total{path,outcome}` (counter): direct/CDN probes
//! - `relay_affinity_total{result}` (counter): hit, miss, expired
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library users
//!   and tests pay nothing
//! - The exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const LAUNCH_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LAUNCH_BUCKETS)?
        .install()?;

    describe_counter!("relay_launch_total", "Launches by outcome");
    describe_histogram!("relay_launch_duration_seconds", "Time spent resolving a launch");
    describe_counter!("relay_attempts_total", "Relay attempts by returned signal");
    describe_counter!("relay_fast_path_total", "Fast-path probes by path and outcome");
    describe_counter!("relay_affinity_total", "Affinity cache lookups by result");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_launch(outcome: &'static str, elapsed: Duration) {
    counter!("relay_launch_total", "outcome" => outcome).increment(1);
    histogram!("relay_launch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_attempt(signal: &'static str) {
    counter!("relay_attempts_total", "signal" => signal).increment(1);
}

pub fn record_fast_path(path: &'static str, outcome: &'static str) {
    counter!("relay_fast_path_total", "path" => path, "outcome" => outcome).increment(1);
}

pub fn record_affinity(result: &'static str) {
    counter!("relay_affinity_total", "result" => result).increment(1);
}
