//! Configuration loading
//!
//! Two layers of YAML: the daemon settings file (database connection,
//! alertmanager targets, rule file paths, evaluation interval) and the
//! rule files it points at (groups of alerting rules).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level daemon settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub alertmanager: AlertmanagerConfig,
    /// Rule files to load; their groups are concatenated in order.
    pub rule_files: Vec<PathBuf>,
    /// Process-wide evaluation interval in seconds (not per-rule).
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval_secs: u64,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Database connection settings for the ClickHouse HTTP interface.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// host:port addresses; the first one is used.
    pub addresses: Vec<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Connect over TLS when true.
    #[serde(default)]
    pub secure: bool,
}

/// Where alert batches are posted.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertmanagerConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// host:port targets; every target receives every batch.
    pub targets: Vec<String>,
}

/// Prometheus metrics endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub listen: std::net::SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: ([0, 0, 0, 0], 3030).into(),
        }
    }
}

/// One rule file: a list of groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub groups: Vec<Group>,
}

/// A named collection of rules sharing default labels.
///
/// Group labels are the lowest-precedence label source for every rule
/// in the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub rules: Vec<Rule>,
}

/// One alerting rule: a named query whose result rows become alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Alert name, forced into the `alertname` label of every alert.
    pub alert: String,
    /// Query expression, passed verbatim to the executor.
    pub expr: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

fn default_evaluation_interval() -> u64 {
    5
}

fn default_database() -> String {
    "default".to_string()
}

fn default_username() -> String {
    "default".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

/// Configuration errors; all of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("no rules loaded from {0} rule file(s)")]
    NoRules(usize),

    #[error("database.addresses must not be empty")]
    NoDatabaseAddress,
}

impl Config {
    /// Load the daemon settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every configured rule file, in order.
    pub fn load_rule_files(&self) -> Result<Vec<RuleFile>, ConfigError> {
        self.rule_files.iter().map(RuleFile::load).collect()
    }
}

impl RuleFile {
    /// Load one rule file from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = write_temp(
            r#"
database:
  addresses: ["ch.example.com:8443"]
  database: analytics
  username: alerts
  password: hunter2
  secure: true
alertmanager:
  scheme: https
  targets: ["am1.example.com:9093", "am2.example.com:9093"]
rule_files:
  - /etc/klaxon/alerts.yaml
evaluation_interval_secs: 30
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database.addresses, vec!["ch.example.com:8443"]);
        assert_eq!(config.database.database, "analytics");
        assert!(config.database.secure);
        assert_eq!(config.alertmanager.targets.len(), 2);
        assert_eq!(config.evaluation_interval_secs, 30);
        // defaulted
        assert_eq!(config.metrics.listen.port(), 3030);
    }

    #[test]
    fn test_config_defaults() {
        let file = write_temp(
            r#"
database:
  addresses: ["localhost:8123"]
alertmanager:
  targets: ["localhost:9093"]
rule_files: []
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database.database, "default");
        assert_eq!(config.database.username, "default");
        assert_eq!(config.database.password, "");
        assert!(!config.database.secure);
        assert_eq!(config.alertmanager.scheme, "http");
        assert_eq!(config.evaluation_interval_secs, 5);
    }

    #[test]
    fn test_load_rule_file() {
        let file = write_temp(
            r#"
groups:
  - name: latency
    labels:
      team: core
    rules:
      - alert: SlowQueries
        expr: SELECT count() AS slow FROM queries WHERE duration > 10
        labels:
          severity: warning
        annotations:
          summary: queries are slow
"#,
        );

        let rules = RuleFile::load(file.path()).unwrap();
        assert_eq!(rules.groups.len(), 1);
        let group = &rules.groups[0];
        assert_eq!(group.name, "latency");
        assert_eq!(group.labels["team"], "core");
        assert_eq!(group.rules[0].alert, "SlowQueries");
        assert_eq!(group.rules[0].labels["severity"], "warning");
        assert_eq!(group.rules[0].annotations["summary"], "queries are slow");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::load("/nonexistent/klaxon.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_bad_yaml_is_parse_error() {
        let file = write_temp("database: [not, a, mapping");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
