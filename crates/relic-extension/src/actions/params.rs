//! Parsing of step parameters from the prepare `config` object.

use std::collections::BTreeMap;
use std::time::Duration;

use relic_checks::ConditionMode;
use serde_json::{Map, Value};

use crate::error::{ExtensionError, ExtensionResult};

fn invalid(reason: String) -> ExtensionError {
    ExtensionError::InvalidConfig { reason }
}

/// The `duration` parameter, given in milliseconds.
pub fn duration(config: &Map<String, Value>) -> ExtensionResult<Duration> {
    let value = config
        .get("duration")
        .ok_or_else(|| invalid("missing parameter 'duration'".to_string()))?;
    let millis = value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .ok_or_else(|| {
            invalid(format!(
                "parameter 'duration' must be a non-negative number, got {value}"
            ))
        })?;
    Ok(Duration::from_millis(millis as u64))
}

/// A string list parameter.
///
/// Accepts a JSON array, a JSON array encoded as a string, or a single string.
pub fn string_list(config: &Map<String, Value>, key: &str) -> ExtensionResult<Vec<String>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| invalid(format!("parameter '{key}' must contain strings only")))
            })
            .collect(),
        Some(Value::String(s)) if s.trim_start().starts_with('[') => serde_json::from_str(s)
            .map_err(|e| invalid(format!("parameter '{key}' is not a string list: {e}"))),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(other) => Err(invalid(format!(
            "parameter '{key}' must be a list of strings, got {other}"
        ))),
    }
}

/// An optional string parameter.
pub fn optional_string<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// The `conditionCheckMode` parameter; defaults to `allTheTime`.
pub fn condition_mode(config: &Map<String, Value>) -> ExtensionResult<ConditionMode> {
    optional_string(config, "conditionCheckMode")
        .map_or(Ok(ConditionMode::default()), str::parse)
        .map_err(ExtensionError::from)
}

/// A key/value list parameter, sent as `[{"key": .., "value": ..}]`.
pub fn key_values(
    config: &Map<String, Value>,
    key: &str,
) -> ExtensionResult<BTreeMap<String, String>> {
    let items = match config.get(key) {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(invalid(format!(
                "parameter '{key}' must be a key/value list, got {other}"
            )));
        }
    };

    items
        .iter()
        .map(|item| {
            let k = item.get("key").and_then(Value::as_str);
            let v = item.get("value").and_then(Value::as_str);
            match (k, v) {
                (Some(k), Some(v)) => Ok((k.to_string(), v.to_string())),
                _ => Err(invalid(format!(
                    "parameter '{key}' has an entry without key or value: {item}"
                ))),
            }
        })
        .collect()
}
