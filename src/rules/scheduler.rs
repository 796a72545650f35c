//! Polling scheduler
//!
//! One task owns every scheduled rule and drives the whole engine:
//! check due-ness, evaluate sequentially, dispatch each rule's batch
//! immediately, sleep a fixed tick, repeat. The tick is finer than the
//! evaluation interval so due-ness is checked frequently even though
//! individual rules fire rarely.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::config::{Config, ConfigError};
use crate::dispatch::Dispatcher;
use crate::exec::QueryExecutor;
use crate::metrics::MetricsSink;

use super::rule::{rules_from_files, ScheduledRule};

/// Sleep between scheduling passes. Independent of the evaluation
/// interval, which decides when a rule is actually due.
const TICK: StdDuration = StdDuration::from_secs(1);

/// Owns the full rule set and the polling loop.
pub struct Scheduler {
    rules: Vec<ScheduledRule>,
    executor: Arc<dyn QueryExecutor>,
    dispatcher: Dispatcher,
    metrics: Arc<dyn MetricsSink>,
    evaluation_interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("rules", &self.rules.len())
            .field("evaluation_interval", &self.evaluation_interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        rules: Vec<ScheduledRule>,
        executor: Arc<dyn QueryExecutor>,
        dispatcher: Dispatcher,
        metrics: Arc<dyn MetricsSink>,
        evaluation_interval: Duration,
    ) -> Self {
        Self {
            rules,
            executor,
            dispatcher,
            metrics,
            evaluation_interval,
        }
    }

    /// Build the scheduler from configuration, loading every rule file.
    /// Starting with zero rules is a configuration error.
    pub fn from_config(
        config: &Config,
        executor: Arc<dyn QueryExecutor>,
        dispatcher: Dispatcher,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ConfigError> {
        let files = config.load_rule_files()?;
        let rules = rules_from_files(&files);
        if rules.is_empty() {
            return Err(ConfigError::NoRules(config.rule_files.len()));
        }

        metrics.set_active_rules(rules.len());
        tracing::info!(rules = rules.len(), "Rules loaded");

        Ok(Self::new(
            rules,
            executor,
            dispatcher,
            metrics,
            Duration::seconds(config.evaluation_interval_secs as i64),
        ))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run the polling loop forever. Steady-state errors are logged and
    /// never stop the loop.
    pub async fn run(mut self) {
        loop {
            self.run_pass().await;
            tokio::time::sleep(TICK).await;
        }
    }

    /// One pass over every rule, in configured order. Due rules are
    /// evaluated one at a time; each non-empty batch is dispatched
    /// before the next rule is considered.
    pub(crate) async fn run_pass(&mut self) {
        for i in 0..self.rules.len() {
            if !self.rules[i].is_due(Utc::now(), self.evaluation_interval) {
                continue;
            }

            let group = self.rules[i].group_name().to_string();
            let rule = self.rules[i].alert_name().to_string();
            tracing::info!(group = %group, rule = %rule, "Running rule");

            match self.rules[i]
                .evaluate(self.executor.as_ref(), self.metrics.as_ref())
                .await
            {
                Ok(alerts) if !alerts.is_empty() => {
                    self.dispatcher.send_all(&alerts).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        group = %group,
                        rule = %rule,
                        error = %e,
                        "Rule evaluation failed"
                    );
                }
            }
        }
    }
}
