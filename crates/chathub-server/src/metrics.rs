//! Metrics collection and export for the chat hub.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "chathub_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "chathub_connections_active";
    pub const CONNECTIONS_REJECTED: &str = "chathub_connections_rejected_total";
    pub const EVENTS_TOTAL: &str = "chathub_events_total";
    pub const EVENTS_BYTES: &str = "chathub_events_bytes";
    pub const REJECTIONS_TOTAL: &str = "chathub_rejections_total";
    pub const ROOMS_ACTIVE: &str = "chathub_rooms_active";
    pub const HEARTBEAT_LATENCY_SECONDS: &str = "chathub_heartbeat_latency_seconds";
    pub const ERRORS_TOTAL: &str = "chathub_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(
        names::CONNECTIONS_REJECTED,
        "Connections refused because the server was full"
    );
    metrics::describe_counter!(names::EVENTS_TOTAL, "Total number of events processed");
    metrics::describe_counter!(names::EVENTS_BYTES, "Total bytes of events processed");
    metrics::describe_counter!(
        names::REJECTIONS_TOTAL,
        "Client events rejected by the hub, by kind"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of rooms");
    metrics::describe_histogram!(
        names::HEARTBEAT_LATENCY_SECONDS,
        "Heartbeat round-trip latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of transport errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a connection refused at capacity.
pub fn record_connection_rejected() {
    counter!(names::CONNECTIONS_REJECTED).increment(1);
}

/// Record an event crossing the wire.
pub fn record_event(bytes: usize, direction: &'static str) {
    counter!(names::EVENTS_TOTAL, "direction" => direction).increment(1);
    counter!(names::EVENTS_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record a rejected client event.
pub fn record_rejection(kind: &'static str) {
    counter!(names::REJECTIONS_TOTAL, "kind" => kind).increment(1);
}

/// Record a heartbeat latency sample.
pub fn record_heartbeat_latency(millis: u64) {
    histogram!(names::HEARTBEAT_LATENCY_SECONDS).record(millis as f64 / 1_000.0);
}

/// Update active room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record a transport error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
