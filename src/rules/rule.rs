//! Scheduled rule state and evaluation

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::{Rule, RuleFile};
use crate::dispatch::ActiveAlert;
use crate::exec::{QueryError, QueryExecutor};
use crate::metrics::MetricsSink;

use super::projector::project;

/// One rule under management: static configuration plus runtime state.
///
/// The scheduler exclusively owns every `ScheduledRule` for the life of
/// the process and mutates it in place; nothing else observes the
/// `running` flag, which only guards re-entrancy.
#[derive(Debug)]
pub struct ScheduledRule {
    pub(crate) config: Rule,
    pub(crate) group_name: String,
    /// Group defaults overridden by rule labels, merged once at build.
    pub(crate) effective_labels: HashMap<String, String>,
    /// Completion time of the last evaluation; `None` means never run,
    /// which makes the rule immediately due.
    pub(crate) last_run: Option<DateTime<Utc>>,
    /// True strictly between evaluation start and completion.
    pub(crate) running: bool,
}

impl ScheduledRule {
    pub fn new(group_name: &str, group_labels: &HashMap<String, String>, config: Rule) -> Self {
        let mut effective_labels = group_labels.clone();
        effective_labels.extend(config.labels.clone());

        Self {
            config,
            group_name: group_name.to_string(),
            effective_labels,
            last_run: None,
            running: false,
        }
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn alert_name(&self) -> &str {
        &self.config.alert
    }

    /// Whether this rule should be evaluated now. A running rule is
    /// never due; otherwise due means strictly more than `interval`
    /// since the last completed run.
    pub fn is_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        if self.running {
            return false;
        }
        match self.last_run {
            None => true,
            Some(last_run) => now - last_run > interval,
        }
    }

    /// Evaluate the rule once: run its query and build one alert per
    /// result row.
    ///
    /// `running` is set before the query starts and cleared once it
    /// returns, on both paths. `last_run` advances on completion even
    /// when the query fails, so a broken rule is retried on the normal
    /// schedule rather than every tick. Either every row becomes an
    /// alert or the whole tick produces none.
    pub async fn evaluate(
        &mut self,
        executor: &dyn QueryExecutor,
        metrics: &dyn MetricsSink,
    ) -> Result<Vec<ActiveAlert>, QueryError> {
        self.running = true;

        let rows = match project(executor, &self.config.expr, metrics).await {
            Ok(rows) => rows,
            Err(e) => {
                self.running = false;
                self.last_run = Some(Utc::now());
                return Err(e);
            }
        };

        let mut alerts = Vec::with_capacity(rows.len());
        for row_labels in rows {
            let mut labels = self.effective_labels.clone();
            labels.extend(row_labels);
            // the configured name always wins, even over a query column
            // literally named "alertname"
            labels.insert("alertname".to_string(), self.config.alert.clone());

            alerts.push(ActiveAlert {
                labels,
                annotations: self.config.annotations.clone(),
            });
        }

        self.running = false;
        self.last_run = Some(Utc::now());
        metrics.record_rule_processed(&self.group_name, &self.config.alert);

        Ok(alerts)
    }
}

/// Flatten every group of every rule file into scheduled rules, in
/// configured order. Duplicate alert names are permitted.
pub fn rules_from_files(files: &[RuleFile]) -> Vec<ScheduledRule> {
    let mut rules = Vec::new();
    for file in files {
        for group in &file.groups {
            for rule in &group.rules {
                rules.push(ScheduledRule::new(&group.name, &group.labels, rule.clone()));
            }
        }
    }
    rules
}
