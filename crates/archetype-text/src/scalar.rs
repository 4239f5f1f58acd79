//! Scalar rendering. Strings stay bare unless they could be misread.

use archetype_core::ScalarKind;
use serde_json::{Number, Value};

/// Marker value of a deletion record.
pub(crate) const DELETED: &str = "~(Deleted)";
pub(crate) const NULL: &str = "null";

fn plain_string(s: &str) -> bool {
    !s.is_empty()
        && s.trim() == s
        && s != NULL
        && s != "{}"
        && !s.starts_with(['"', '!', '~'])
        && !s.contains(['\n', '\r', '\t'])
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if plain_string(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn parse_scalar(kind: ScalarKind, raw: &str) -> Result<Value, String> {
    let bad = || format!("`{raw}` is not a valid {kind:?} value");
    match kind {
        ScalarKind::String if raw == NULL => Ok(Value::Null),
        ScalarKind::String if raw.starts_with('"') => serde_json::from_str::<String>(raw)
            .map(Value::String)
            .map_err(|e| format!("invalid quoted string {raw}: {e}")),
        ScalarKind::String => Ok(Value::String(raw.to_string())),
        ScalarKind::Int => raw.parse::<i64>().map(Value::from).map_err(|_| bad()),
        ScalarKind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        ScalarKind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(bad()),
        },
    }
}
