//! Decoding of the engine's JSON responses.

use serde::Deserialize;
use serde_json::Value;
use zapctl_core::{Result, ZapError};

/// One entry of `spider/view/scans` or `ascan/view/scans`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanRecord {
    pub id: String,
    pub progress: String,
    pub state: String,
}

impl ScanRecord {
    /// `state` and `progress` are not updated together; either one signals the end.
    pub fn is_finished(&self) -> bool {
        self.state.eq_ignore_ascii_case("FINISHED") || self.progress == "100"
    }
}

/// Whether the job `scan_id` is listed as finished. An absent job is still pending.
pub fn job_finished(records: &[ScanRecord], scan_id: &str) -> bool {
    records.iter().any(|r| r.id == scan_id && r.is_finished())
}

/// An engine error document: `{"code": ..., "message": ...}`.
pub(crate) fn error_document(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    let code = obj.get("code")?.as_str()?;
    let message = obj.get("message").and_then(Value::as_str).unwrap_or("");
    Some(if message.is_empty() { code.to_string() } else { format!("{}: {}", code, message) })
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The single value of an element response such as `{"scan": "3"}`, whatever its key.
pub fn element(op: &str, v: &Value) -> Result<String> {
    let found = match v {
        Value::Object(map) => map.values().next().and_then(scalar),
        other => scalar(other),
    };
    found.ok_or_else(|| ZapError::remote(op, format!("unexpected response: {}", v)))
}

/// The items of a list response such as `{"sites": ["http://a.test"]}`.
pub fn string_list(op: &str, v: &Value) -> Result<Vec<String>> {
    let items = match v {
        Value::Object(map) => map.values().next().and_then(Value::as_array),
        Value::Array(a) => Some(a),
        _ => None,
    };
    let items = items.ok_or_else(|| ZapError::remote(op, format!("unexpected response: {}", v)))?;
    Ok(items.iter().filter_map(scalar).collect())
}

pub fn scan_records(op: &str, v: &Value) -> Result<Vec<ScanRecord>> {
    let items = v
        .get("scans")
        .cloned()
        .ok_or_else(|| ZapError::remote(op, format!("unexpected response: {}", v)))?;
    serde_json::from_value(items).map_err(|e| ZapError::remote(op, e))
}
