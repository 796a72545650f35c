//! Alert delivery
//!
//! Fans finished alert batches out to every configured alertmanager
//! endpoint. Delivery is best-effort per tick: a failed endpoint is
//! logged and counted, the rest of the endpoints are still attempted,
//! and nothing is retried — the next evaluation that matches rows
//! produces a fresh batch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AlertmanagerConfig;
use crate::metrics::MetricsSink;

/// One alert produced by a rule evaluation, in the alertmanager v2 shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

/// Delivery errors, scoped to a single endpoint.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(u16),
}

/// Capability for delivering one alert batch to one endpoint.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Endpoint URL, used for logging and failure accounting.
    fn endpoint(&self) -> &str;

    async fn send(&self, alerts: &[ActiveAlert]) -> Result<(), DispatchError>;
}

/// Sink posting batches to an alertmanager `/api/v2/alerts` endpoint.
pub struct AlertmanagerSink {
    endpoint: String,
    client: reqwest::Client,
}

impl AlertmanagerSink {
    pub fn new(scheme: &str, target: &str) -> Self {
        Self {
            endpoint: format!("{}://{}/api/v2/alerts", scheme, target),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for AlertmanagerSink {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, alerts: &[ActiveAlert]) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&alerts)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        tracing::info!(
            endpoint = %self.endpoint,
            status = %status,
            count = alerts.len(),
            "Alerts sent"
        );

        Ok(())
    }
}

/// Fan-out over every configured sink.
pub struct Dispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { sinks, metrics }
    }

    /// Build one alertmanager sink per configured target.
    pub fn from_config(config: &AlertmanagerConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        let sinks = config
            .targets
            .iter()
            .map(|target| {
                Box::new(AlertmanagerSink::new(&config.scheme, target)) as Box<dyn AlertSink>
            })
            .collect();
        Self::new(sinks, metrics)
    }

    /// Deliver `alerts` to every sink independently. Failures are logged
    /// and counted per endpoint; the batch is never considered failed as
    /// a whole.
    pub async fn send_all(&self, alerts: &[ActiveAlert]) {
        for sink in &self.sinks {
            match sink.send(alerts).await {
                Ok(()) => self.metrics.record_alerts_sent(alerts.len()),
                Err(e) => {
                    self.metrics.record_send_failure(sink.endpoint());
                    tracing::error!(
                        endpoint = %sink.endpoint(),
                        error = %e,
                        "Failed to send alerts"
                    );
                }
            }
        }
    }
}
