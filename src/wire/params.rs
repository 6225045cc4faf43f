//! Helpers for pulling typed values out of a request's `params` object. The
//! dispatcher has already checked presence/absence of keys; these helpers
//! only worry about *shape*.

use serde_json::{Map, Value};

use crate::error::EngineError;

pub type Params = Map<String, Value>;

pub fn str_param<'a>(params: &'a Params, key: &str) -> Result<&'a str, EngineError> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| EngineError::permanent(format!("{key} must be a string")))
}

pub fn opt_str_param<'a>(params: &'a Params, key: &str) -> Result<Option<&'a str>, EngineError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| EngineError::permanent(format!("{key} must be a string"))),
    }
}

pub fn bool_param(params: &Params, key: &str) -> bool {
    match params.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        _ => false,
    }
}

/// An `expire`-shaped integer: a string of decimal digits is accepted in
/// addition to a JSON number.
pub fn int_param(params: &Params, key: &str) -> Result<i64, EngineError> {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| EngineError::permanent(format!("{key} out of range"))),
        Some(Value::String(s)) => s.parse::<i64>().map_err(|_| EngineError::permanent(format!("{key} must be an integer"))),
        _ => Err(EngineError::permanent(format!("{key} must be an integer"))),
    }
}

/// `numhosts` is kept as the raw string so the engine can apply its own
/// `^\d+$` validation and error message.
pub fn raw_str_param(params: &Params, key: &str) -> Result<String, EngineError> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(EngineError::permanent(format!("{key} must be a string or number"))),
    }
}

pub fn str_list_param(params: &Params, key: &str) -> Result<Vec<String>, EngineError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(|s| s.to_string()).ok_or_else(|| EngineError::permanent(format!("{key} must be a list of strings"))))
            .collect(),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        _ => Err(EngineError::permanent(format!("{key} must be a list of strings"))),
    }
}

pub fn opt_str_list_param(params: &Params, key: &str) -> Result<Option<Vec<String>>, EngineError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        _ => str_list_param(params, key).map(Some),
    }
}
