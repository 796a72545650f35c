//! Row projection
//!
//! Runs one query and flattens each result row into a string label map,
//! normalizing column names and stringifying cells. Either the whole
//! result set projects or the call fails; no partial output.

use std::collections::HashMap;
use std::time::Instant;

use crate::exec::{QueryError, QueryExecutor};
use crate::metrics::MetricsSink;

use super::labels::{normalize_label_name, stringify_value};

/// Execute `expr` and project every result row into a label map.
///
/// Later columns overwrite earlier ones when two names normalize to the
/// same label. The query's wall-clock duration is recorded whether or
/// not it succeeds.
pub async fn project(
    executor: &dyn QueryExecutor,
    expr: &str,
    metrics: &dyn MetricsSink,
) -> Result<Vec<HashMap<String, String>>, QueryError> {
    let start = Instant::now();
    let result = executor.query(expr).await;
    metrics.record_query_duration(start.elapsed().as_secs_f64());

    let rows = result?;

    let mut projected = Vec::with_capacity(rows.len());
    for row in rows {
        let mut labels = HashMap::with_capacity(row.columns.len());
        for (name, value) in &row.columns {
            labels.insert(normalize_label_name(name), stringify_value(value));
        }
        tracing::debug!(?labels, "Query row projected");
        projected.push(labels);
    }

    Ok(projected)
}
