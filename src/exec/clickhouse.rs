//! ClickHouse HTTP executor
//!
//! Talks to the ClickHouse HTTP interface, appending `FORMAT JSONCompact`
//! to every expression so results come back as a typed column header plus
//! positional row arrays. Declared column types drive the mapping into
//! [`DynValue`](super::DynValue); 64-bit integers arrive quoted by default
//! and are parsed from their string form.

use serde::Deserialize;

use super::{DynValue, QueryError, QueryExecutor, QueryRow};
use crate::config::{ConfigError, DatabaseConfig};

/// Query executor backed by the ClickHouse HTTP interface.
pub struct ClickHouseExecutor {
    client: reqwest::Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl ClickHouseExecutor {
    /// Build an executor from the database settings. Uses the first
    /// configured address.
    pub fn new(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        let address = config
            .addresses
            .first()
            .ok_or(ConfigError::NoDatabaseAddress)?;
        let scheme = if config.secure { "https" } else { "http" };

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: format!("{}://{}", scheme, address),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait::async_trait]
impl QueryExecutor for ClickHouseExecutor {
    async fn query(&self, expr: &str) -> Result<Vec<QueryRow>, QueryError> {
        let response = self
            .client
            .post(&self.base_url)
            .query(&[("database", self.database.as_str())])
            .header("X-ClickHouse-User", &self.username)
            .header("X-ClickHouse-Key", &self.password)
            .body(format!("{} FORMAT JSONCompact", expr))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        parse_compact_response(&body)
    }

    async fn ping(&self) -> Result<(), QueryError> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CompactResponse {
    meta: Vec<ColumnMeta>,
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ColumnMeta {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

/// Decode a JSONCompact response body into rows of typed values.
fn parse_compact_response(body: &[u8]) -> Result<Vec<QueryRow>, QueryError> {
    let response: CompactResponse =
        serde_json::from_slice(body).map_err(|e| QueryError::Malformed(e.to_string()))?;

    let mut rows = Vec::with_capacity(response.data.len());
    for (i, cells) in response.data.iter().enumerate() {
        if cells.len() != response.meta.len() {
            return Err(QueryError::Decode {
                row: i,
                reason: format!(
                    "expected {} columns, got {}",
                    response.meta.len(),
                    cells.len()
                ),
            });
        }

        let mut columns = Vec::with_capacity(cells.len());
        for (meta, cell) in response.meta.iter().zip(cells) {
            let value = decode_cell(&meta.column_type, cell)
                .map_err(|reason| QueryError::Decode { row: i, reason })?;
            columns.push((meta.name.clone(), value));
        }
        rows.push(QueryRow::new(columns));
    }

    Ok(rows)
}

/// Map one cell onto the value model using its declared column type.
fn decode_cell(declared: &str, cell: &serde_json::Value) -> Result<DynValue, String> {
    let base = unwrap_type(declared);

    if cell.is_null() {
        return Ok(DynValue::Other(serde_json::Value::Null));
    }

    if base.starts_with("UInt") {
        match cell {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(DynValue::UInt)
                .ok_or_else(|| format!("{} out of range for {}", n, declared)),
            serde_json::Value::String(s) => s
                .parse::<u64>()
                .map(DynValue::UInt)
                .map_err(|e| format!("bad {} literal {:?}: {}", declared, s, e)),
            other => Err(format!("unexpected {} cell: {}", declared, other)),
        }
    } else if base.starts_with("Int") {
        match cell {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(DynValue::Int)
                .ok_or_else(|| format!("{} out of range for {}", n, declared)),
            serde_json::Value::String(s) => s
                .parse::<i64>()
                .map(DynValue::Int)
                .map_err(|e| format!("bad {} literal {:?}: {}", declared, s, e)),
            other => Err(format!("unexpected {} cell: {}", declared, other)),
        }
    } else if base.starts_with("Float") || base.starts_with("Decimal") {
        match cell {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(DynValue::Float)
                .ok_or_else(|| format!("{} out of range for {}", n, declared)),
            serde_json::Value::String(s) => s
                .parse::<f64>()
                .map(DynValue::Float)
                .map_err(|e| format!("bad {} literal {:?}: {}", declared, s, e)),
            other => Err(format!("unexpected {} cell: {}", declared, other)),
        }
    } else if is_stringly(base) {
        match cell {
            serde_json::Value::String(s) => Ok(DynValue::String(s.clone())),
            other => Err(format!("unexpected {} cell: {}", declared, other)),
        }
    } else {
        Ok(DynValue::Other(cell.clone()))
    }
}

/// Column types rendered as JSON strings that we treat as plain strings.
fn is_stringly(base: &str) -> bool {
    base.starts_with("String")
        || base.starts_with("FixedString")
        || base.starts_with("Date")
        || base.starts_with("Enum")
        || base.starts_with("IPv")
        || base == "UUID"
}

/// Strip Nullable(...) and LowCardinality(...) wrappers to the inner type.
fn unwrap_type(declared: &str) -> &str {
    let mut base = declared;
    loop {
        let inner = base
            .strip_prefix("Nullable(")
            .or_else(|| base.strip_prefix("LowCardinality("))
            .and_then(|rest| rest.strip_suffix(')'));
        match inner {
            Some(inner) => base = inner,
            None => return base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact_response() {
        let body = br#"{
            "meta": [
                {"name": "host", "type": "String"},
                {"name": "errors", "type": "UInt64"},
                {"name": "rate", "type": "Float64"}
            ],
            "data": [
                ["web-1", "17", 0.25],
                ["web-2", "0", 1.5]
            ],
            "rows": 2
        }"#;

        let rows = parse_compact_response(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].columns,
            vec![
                ("host".to_string(), DynValue::String("web-1".to_string())),
                ("errors".to_string(), DynValue::UInt(17)),
                ("rate".to_string(), DynValue::Float(0.25)),
            ]
        );
    }

    #[test]
    fn test_decode_quoted_signed_integer() {
        let value = decode_cell("Int64", &serde_json::json!("-42")).unwrap();
        assert_eq!(value, DynValue::Int(-42));
    }

    #[test]
    fn test_decode_wrapped_types() {
        let value = decode_cell("Nullable(UInt32)", &serde_json::json!(7)).unwrap();
        assert_eq!(value, DynValue::UInt(7));

        let value = decode_cell("LowCardinality(Nullable(String))", &serde_json::json!("x")).unwrap();
        assert_eq!(value, DynValue::String("x".to_string()));
    }

    #[test]
    fn test_decode_null_falls_back() {
        let value = decode_cell("Nullable(String)", &serde_json::Value::Null).unwrap();
        assert_eq!(value, DynValue::Other(serde_json::Value::Null));
    }

    #[test]
    fn test_decode_unknown_type_is_other() {
        let cell = serde_json::json!(["a", "b"]);
        let value = decode_cell("Array(String)", &cell).unwrap();
        assert_eq!(value, DynValue::Other(cell));
    }

    #[test]
    fn test_decode_bad_literal_fails() {
        let err = decode_cell("UInt64", &serde_json::json!("not-a-number")).unwrap_err();
        assert!(err.contains("UInt64"));
    }

    #[test]
    fn test_row_width_mismatch_fails() {
        let body = br#"{
            "meta": [{"name": "a", "type": "UInt8"}],
            "data": [[1, 2]]
        }"#;
        let err = parse_compact_response(body).unwrap_err();
        assert!(matches!(err, QueryError::Decode { row: 0, .. }));
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let err = parse_compact_response(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn test_unwrap_type() {
        assert_eq!(unwrap_type("UInt64"), "UInt64");
        assert_eq!(unwrap_type("Nullable(Int8)"), "Int8");
        assert_eq!(unwrap_type("LowCardinality(Nullable(String))"), "String");
    }
}
