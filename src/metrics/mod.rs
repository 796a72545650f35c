//! Observability sink and the prometheus endpoint
//!
//! The engine never touches prometheus types directly; it records through
//! the [`MetricsSink`] capability so tests can count observations and the
//! binary can wire in the real registry.

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Response, StatusCode},
    routing::get,
    Router,
};
use prometheus::{
    register_counter, register_histogram, register_int_counter_vec, register_int_gauge,
    Counter, Histogram, IntCounterVec, IntGauge,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Fire-and-forget observability hooks recorded by the engine.
pub trait MetricsSink: Send + Sync {
    /// A rule evaluation completed successfully.
    fn record_rule_processed(&self, group: &str, rule: &str);
    /// Wall-clock duration of one query, success or failure.
    fn record_query_duration(&self, seconds: f64);
    /// Alerts accepted by one delivery endpoint.
    fn record_alerts_sent(&self, count: usize);
    /// A delivery endpoint rejected or never received a batch.
    fn record_send_failure(&self, endpoint: &str);
    /// Number of rules under management, set once at startup.
    fn set_active_rules(&self, count: usize);
}

/// Prometheus-backed sink registered against the default registry.
pub struct PromMetrics {
    rules_processed: IntCounterVec,
    alerts_sent: Counter,
    send_failures: IntCounterVec,
    active_rules: IntGauge,
    query_duration: Histogram,
}

impl PromMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            rules_processed: register_int_counter_vec!(
                "klaxon_processed_rules_total",
                "The total number of processed rules",
                &["group", "rule"]
            )?,
            alerts_sent: register_counter!(
                "klaxon_alerts_sent_total",
                "The total number of alerts sent to alertmanager"
            )?,
            send_failures: register_int_counter_vec!(
                "klaxon_alert_send_failures_total",
                "The number of failed alert deliveries per endpoint",
                &["endpoint"]
            )?,
            active_rules: register_int_gauge!(
                "klaxon_active_rules",
                "The number of current active rules"
            )?,
            query_duration: register_histogram!(
                "klaxon_query_duration_seconds",
                "The duration of database queries",
                vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]
            )?,
        })
    }
}

impl MetricsSink for PromMetrics {
    fn record_rule_processed(&self, group: &str, rule: &str) {
        self.rules_processed.with_label_values(&[group, rule]).inc();
    }

    fn record_query_duration(&self, seconds: f64) {
        self.query_duration.observe(seconds);
    }

    fn record_alerts_sent(&self, count: usize) {
        self.alerts_sent.inc_by(count as f64);
    }

    fn record_send_failure(&self, endpoint: &str) {
        self.send_failures.with_label_values(&[endpoint]).inc();
    }

    fn set_active_rules(&self, count: usize) {
        self.active_rules.set(count as i64);
    }
}

/// Sink that drops every observation. Used when metrics are disabled and
/// as a stand-in in tests.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_rule_processed(&self, _group: &str, _rule: &str) {}
    fn record_query_duration(&self, _seconds: f64) {}
    fn record_alerts_sent(&self, _count: usize) {}
    fn record_send_failure(&self, _endpoint: &str) {}
    fn set_active_rules(&self, _count: usize) {}
}

async fn metrics_handler() -> Response<Body> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .unwrap_or_default();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .unwrap_or_default()
}

/// Serve the prometheus text endpoint on `addr` until the process exits.
pub async fn serve_metrics(addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics endpoint listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_accepts_everything() {
        let sink = NoopMetrics;
        sink.record_rule_processed("g", "r");
        sink.record_query_duration(0.1);
        sink.record_alerts_sent(3);
        sink.record_send_failure("http://localhost:9093/api/v2/alerts");
        sink.set_active_rules(7);
    }
}
