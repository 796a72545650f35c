//! Query execution layer
//!
//! Defines the `QueryExecutor` capability the rule engine is written
//! against, plus the dynamically typed value model query results are
//! delivered in. The concrete ClickHouse HTTP implementation lives in
//! [`clickhouse`].

pub mod clickhouse;

pub use clickhouse::ClickHouseExecutor;

use async_trait::async_trait;

/// A single cell value returned by a query.
///
/// Closed set of types the engine knows how to stringify. Anything the
/// database returns outside this set is carried as [`DynValue::Other`]
/// and rendered with a structural fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Signed integer of any width, widened to i64
    Int(i64),
    /// Unsigned integer of any width, widened to u64
    UInt(u64),
    /// Floating point of any width, widened to f64
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Anything else, kept as raw JSON for the fallback rendering
    Other(serde_json::Value),
}

impl DynValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DynValue::Int(_) => "int",
            DynValue::UInt(_) => "uint",
            DynValue::Float(_) => "float",
            DynValue::String(_) => "string",
            DynValue::Other(_) => "other",
        }
    }
}

/// One query result row: ordered (column name, value) pairs.
///
/// Column order is authoritative; names are not guaranteed unique or
/// label-safe until normalized by the projector.
#[derive(Debug, Clone, Default)]
pub struct QueryRow {
    pub columns: Vec<(String, DynValue)>,
}

impl QueryRow {
    pub fn new(columns: Vec<(String, DynValue)>) -> Self {
        Self { columns }
    }
}

/// Query execution errors, scoped to a single rule evaluation.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("failed to decode row {row}: {reason}")]
    Decode { row: usize, reason: String },
}

/// Capability for running queries against the analytical database.
///
/// The engine holds a single long-lived executor shared by every rule;
/// queries run one at a time on the scheduling task.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `expr` verbatim and return every result row, or fail as a
    /// whole. Implementations must not return partial result sets.
    async fn query(&self, expr: &str) -> Result<Vec<QueryRow>, QueryError>;

    /// Liveness check used at startup before the scheduler begins.
    async fn ping(&self) -> Result<(), QueryError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(DynValue::Int(-1).type_name(), "int");
        assert_eq!(DynValue::UInt(1).type_name(), "uint");
        assert_eq!(DynValue::Float(1.0).type_name(), "float");
        assert_eq!(DynValue::String("x".into()).type_name(), "string");
        assert_eq!(DynValue::Other(serde_json::Value::Null).type_name(), "other");
    }

    #[test]
    fn test_query_row_preserves_order() {
        let row = QueryRow::new(vec![
            ("b".to_string(), DynValue::Int(1)),
            ("a".to_string(), DynValue::Int(2)),
        ]);
        let names: Vec<_> = row.columns.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
