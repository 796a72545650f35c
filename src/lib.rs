//! Klaxon: query-driven alerting for columnar databases
//!
//! Periodically evaluates configured query rules against a ClickHouse-
//! compatible database and forwards every result row as an alert to one
//! or more alertmanager endpoints.
//!
//! # How it fits together
//!
//! - **Rules** are loaded from YAML files as groups sharing default
//!   labels ([`config`]).
//! - The **scheduler** ([`rules::Scheduler`]) polls every rule against a
//!   single process-wide evaluation interval and evaluates due rules one
//!   at a time.
//! - Each evaluation runs the rule's query through the
//!   [`exec::QueryExecutor`] capability and projects every result row
//!   into alert labels (group defaults < rule labels < row columns,
//!   with `alertname` always forced to the configured name).
//! - Finished batches fan out to every configured endpoint via
//!   [`dispatch::Dispatcher`], best-effort and without retries.
//!
//! Observability flows through the [`metrics::MetricsSink`] capability,
//! backed by a prometheus `/metrics` endpoint in the binary.

pub mod config;
pub mod dispatch;
pub mod exec;
pub mod metrics;
pub mod rules;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dispatch::{ActiveAlert, Dispatcher};
pub use exec::{ClickHouseExecutor, DynValue, QueryError, QueryExecutor};
pub use metrics::{MetricsSink, NoopMetrics, PromMetrics};
pub use rules::{ScheduledRule, Scheduler};
