use crate::error::TrackerError;
use crate::scoreboard::{Document, DocumentStore};
use crate::types::*;
use reqwest::{
    blocking::{Client, RequestBuilder},
    StatusCode,
};
use serde_json::{json, Map, Number, Value};
use std::time::Duration;

pub const FIRESTORE_API_URL: &str = "https://firestore.googleapis.com/v1";

/// Key of the single-entry object that carries a typed value through the
/// document untouched.
pub const RAW_VALUE_KEY: &str = "$firestore";

// ── Value codec ────────────────────────────────────────────────────────

/// Wraps a typed value that has no lossless plain JSON form: timestamps,
/// bytes, references, geo points, and numbers JSON cannot hold.
pub fn raw_value(typed: &Value) -> Value {
    Value::Object(Map::from_iter([(RAW_VALUE_KEY.to_string(), typed.clone())]))
}

/// The typed value inside a `raw_value` wrapper.
pub fn as_raw_value(value: &Value) -> Option<&Value> {
    match value.as_object() {
        Some(obj) if obj.len() == 1 => obj.get(RAW_VALUE_KEY),
        _ => None,
    }
}

pub fn decode_value(typed: &Value) -> Value {
    let Some(obj) = typed.as_object() else {
        return raw_value(typed);
    };
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(raw) = obj.get("integerValue") {
        let parsed = match raw {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        return parsed.map(Value::from).unwrap_or_else(|| raw_value(typed));
    }
    if let Some(raw) = obj.get("doubleValue") {
        let number = raw
            .as_f64()
            .or_else(|| raw.as_str().and_then(|s| s.parse::<f64>().ok()))
            .and_then(Number::from_f64);
        return number.map(Value::Number).unwrap_or_else(|| raw_value(typed));
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if obj.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map.get("fields").and_then(Value::as_object);
        let decoded = fields.map(decode_fields).unwrap_or_default();
        // a map that would read back as a wrapper stays typed
        if decoded.len() == 1 && decoded.contains_key(RAW_VALUE_KEY) {
            return raw_value(typed);
        }
        return Value::Object(decoded);
    }
    if let Some(array) = obj.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    raw_value(typed)
}

pub fn decode_fields(fields: &Map<String, Value>) -> Document {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(obj) => match as_raw_value(value) {
            Some(typed) => typed.clone(),
            None => json!({ "mapValue": { "fields": encode_fields(obj) } }),
        },
    }
}

pub fn encode_fields(document: &Document) -> Map<String, Value> {
    document
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

// ── REST store ─────────────────────────────────────────────────────────

pub struct FirestoreStore {
    client: Client,
    project_id: String,
    api_key: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let project_id = config.project_id.trim();
        if project_id.is_empty() {
            return Err(TrackerError::internal("Firestore project id is empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent("slippi-scoreboard-sync")
            .build()
            .map_err(|e| TrackerError::transport(format!("build http client: {e}")))?;
        let api_key = Some(config.api_key.trim().to_string()).filter(|key| !key.is_empty());
        Ok(Self {
            client,
            project_id: project_id.to_string(),
            api_key,
        })
    }

    pub fn document_url(&self, path: &str) -> String {
        format!(
            "{FIRESTORE_API_URL}/projects/{}/databases/(default)/documents/{}",
            self.project_id,
            path.trim_matches('/')
        )
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }
}

impl DocumentStore for FirestoreStore {
    fn read(&self, path: &str) -> Result<Option<Document>, TrackerError> {
        let url = self.document_url(path);
        let resp = self
            .with_key(self.client.get(&url))
            .send()
            .map_err(|e| TrackerError::transport(format!("GET {path}: {e}")))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .text()
            .map_err(|e| TrackerError::transport(format!("read {path}: {e}")))?;
        if !status.is_success() {
            return Err(TrackerError::transport(format!("Firestore error {status}: {body}")));
        }
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TrackerError::transport(format!("parse {path}: {e}")))?;
        let fields = parsed.get("fields").and_then(Value::as_object);
        Ok(Some(fields.map(decode_fields).unwrap_or_default()))
    }

    fn write(&self, path: &str, document: &Document) -> Result<(), TrackerError> {
        let url = self.document_url(path);
        let body = json!({ "fields": encode_fields(document) });
        let resp = self
            .with_key(self.client.patch(&url))
            .json(&body)
            .send()
            .map_err(|e| TrackerError::transport(format!("PATCH {path}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(TrackerError::transport(format!("Firestore error {status}: {body}")));
        }
        Ok(())
    }
}
