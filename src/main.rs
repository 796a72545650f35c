//! Klaxon daemon
//!
//! Run with: cargo run -- /etc/klaxon/klaxon.yaml
//!
//! The configuration path may also be given via KLAXON_CONFIG; the
//! default is ./klaxon.yaml. RUST_LOG controls log filtering.

use std::sync::Arc;

use klaxon::dispatch::Dispatcher;
use klaxon::exec::{ClickHouseExecutor, QueryExecutor};
use klaxon::metrics::{serve_metrics, MetricsSink, PromMetrics};
use klaxon::rules::Scheduler;
use klaxon::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "klaxon=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("KLAXON_CONFIG").ok())
        .unwrap_or_else(|| "klaxon.yaml".to_string());

    if let Err(e) = run(&config_path).await {
        tracing::error!(error = %e, "Fatal");
        std::process::exit(1);
    }
}

async fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    tracing::info!(
        config = config_path,
        database = %config.database.database,
        interval_secs = config.evaluation_interval_secs,
        rule_files = config.rule_files.len(),
        "Klaxon starting"
    );

    let metrics: Arc<dyn MetricsSink> = Arc::new(PromMetrics::new()?);

    let executor: Arc<dyn QueryExecutor> = Arc::new(ClickHouseExecutor::new(&config.database)?);
    executor.ping().await?;
    tracing::info!("Database connection established");

    let dispatcher = Dispatcher::from_config(&config.alertmanager, Arc::clone(&metrics));
    let scheduler = Scheduler::from_config(&config, executor, dispatcher, Arc::clone(&metrics))?;

    let metrics_addr = config.metrics.listen;
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(metrics_addr).await {
            tracing::error!(error = %e, "Metrics endpoint failed");
        }
    });

    scheduler.run().await;
    Ok(())
}
