//! Label normalization
//!
//! Query column names and cell values become alertmanager label pairs.
//! Both conversions are total: every input has a defined string output.

use std::sync::OnceLock;

use regex::Regex;

use crate::exec::DynValue;

static NON_LABEL_CHARS: OnceLock<Regex> = OnceLock::new();

/// Replace every run of characters outside `[A-Za-z0-9_]` with a single
/// underscore so the result is usable as a label key. Idempotent.
pub fn normalize_label_name(raw: &str) -> String {
    let re = NON_LABEL_CHARS
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("static label regex"));
    re.replace_all(raw, "_").into_owned()
}

/// Render one query cell as a label value.
///
/// Integers render in plain decimal, floats with six fractional digits,
/// strings pass through. Anything else takes a structural fallback with
/// a warning; evaluation continues.
pub fn stringify_value(value: &DynValue) -> String {
    match value {
        DynValue::Int(v) => v.to_string(),
        DynValue::UInt(v) => v.to_string(),
        DynValue::Float(v) => format!("{:.6}", v),
        DynValue::String(s) => s.clone(),
        DynValue::Other(raw) => {
            tracing::warn!(value = %raw, "Unsupported value type");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_replaces_runs_with_one_underscore() {
        assert_eq!(normalize_label_name("count()"), "count_");
        assert_eq!(normalize_label_name("p99 (ms)"), "p99_ms_");
        assert_eq!(normalize_label_name("a--b..c"), "a_b_c");
        assert_eq!(normalize_label_name("already_fine_123"), "already_fine_123");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["count()", "a b-c", "日本語", "x", ""] {
            let once = normalize_label_name(raw);
            assert_eq!(normalize_label_name(&once), once);
        }
    }

    #[test]
    fn test_stringify_integers() {
        assert_eq!(stringify_value(&DynValue::Int(42)), "42");
        assert_eq!(stringify_value(&DynValue::Int(-7)), "-7");
        assert_eq!(stringify_value(&DynValue::UInt(0)), "0");
        assert_eq!(stringify_value(&DynValue::UInt(u64::MAX)), u64::MAX.to_string());
    }

    #[test]
    fn test_stringify_floats() {
        assert_eq!(stringify_value(&DynValue::Float(3.5)), "3.500000");
        assert_eq!(stringify_value(&DynValue::Float(0.0)), "0.000000");
    }

    #[test]
    fn test_stringify_strings_unchanged() {
        assert_eq!(
            stringify_value(&DynValue::String("web-1".to_string())),
            "web-1"
        );
    }

    #[test]
    fn test_stringify_fallback() {
        let value = DynValue::Other(serde_json::json!({"k": 1}));
        assert_eq!(stringify_value(&value), r#"{"k":1}"#);
        assert_eq!(stringify_value(&DynValue::Other(serde_json::Value::Null)), "null");
    }
}
