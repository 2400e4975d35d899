//! Shared helpers for command handlers.

use serde_json::Value;

use qualys_api::ParamValue;

use crate::error::CliError;

/// Split a `KEY=VALUE` argument. The value may itself contain `=`.
pub fn parse_pair(raw: &str, flag: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(CliError::Validation {
            field: flag.into(),
            reason: format!("expected KEY=VALUE, got '{raw}'"),
        }),
    }
}

/// Body values that parse as JSON arrays, objects, numbers or booleans
/// keep their type (gateway services take JSON bodies); anything else
/// is text.
pub fn body_value(raw: &str) -> ParamValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Array(_) | Value::Object(_) | Value::Number(_) | Value::Bool(_))) => {
            ParamValue::Json(v)
        }
        _ => ParamValue::Text(raw.to_owned()),
    }
}
