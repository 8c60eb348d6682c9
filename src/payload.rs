//! Queue message payloads.
//!
//! A payload is a JSON object whose keys are opaque to the pipeline except
//! for the reserved [`ITERATION_KEY`], which counts how many times the task
//! has already been requeued.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved key holding the retry counter.
pub const ITERATION_KEY: &str = "iteration";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message body must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decoded queue message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw message body, which must be a UTF-8 JSON object.
    pub fn decode(body: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(body)?;
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(PayloadError::NotAnObject(json_kind(&other))),
        }
    }

    /// Current retry counter.
    ///
    /// Missing keys count as `0`. Integers are taken as is (negatives clamp
    /// to `0`), floats are truncated, numeric strings are parsed and any
    /// other value counts as `0`.
    pub fn iteration(&self) -> u64 {
        self.fields.get(ITERATION_KEY).map_or(0, coerce_iteration)
    }

    /// Copy of this payload with the retry counter set to `iteration`.
    pub fn with_iteration(&self, iteration: u64) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(ITERATION_KEY.to_owned(), Value::from(iteration));
        Self { fields }
    }

    /// Copy of this payload without the retry counter, as sent to the target.
    pub fn without_iteration(&self) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(ITERATION_KEY);
        Self { fields }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.fields.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Compact JSON encoding used when publishing.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn coerce_iteration(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(truncate_float))
            .unwrap_or(0),
        Value::String(s) => parse_numeric(s.trim()),
        _ => 0,
    }
}

fn parse_numeric(s: &str) -> u64 {
    if let Ok(n) = s.parse::<u64>() {
        return n;
    }
    if s.parse::<i64>().is_ok() {
        return 0;
    }
    s.parse::<f64>().map(truncate_float).unwrap_or(0)
}

fn truncate_float(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        // Saturating conversion; fractions are dropped.
        f as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(fields) => Payload::from(fields),
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    #[rstest]
    #[case(json!({"id": 42}), 0)]
    #[case(json!({"id": 42, "iteration": 3}), 3)]
    #[case(json!({"iteration": "17"}), 17)]
    #[case(json!({"iteration": " 5 "}), 5)]
    #[case(json!({"iteration": 2.9}), 2)]
    #[case(json!({"iteration": -4}), 0)]
    #[case(json!({"iteration": "abc"}), 0)]
    #[case(json!({"iteration": null}), 0)]
    #[case(json!({"iteration": [1]}), 0)]
    fn iteration_is_coerced(#[case] value: Value, #[case] expected: u64) {
        assert_eq!(payload(value).iteration(), expected);
    }

    #[rstest]
    fn with_iteration_keeps_other_fields() {
        let original = payload(json!({"id": 42, "name": "x"}));
        let next = original.with_iteration(1);
        assert_eq!(next.get("id"), Some(&json!(42)));
        assert_eq!(next.get("name"), Some(&json!("x")));
        assert_eq!(next.iteration(), 1);
        assert_eq!(original.get(ITERATION_KEY), None);
    }

    #[rstest]
    fn without_iteration_is_idempotent() {
        let original = payload(json!({"id": 42, "iteration": 9}));
        let once = original.without_iteration();
        assert_eq!(once, once.without_iteration());
        assert_eq!(once, payload(json!({"id": 42})));
    }

    #[rstest]
    fn decodes_objects() {
        let decoded = Payload::decode(br#"{"id": 42, "iteration": 2}"#).expect("valid body");
        assert_eq!(decoded.iteration(), 2);
        assert_eq!(decoded.len(), 2);
    }

    #[rstest]
    #[case(&b"not json"[..])]
    #[case(&b"[1, 2]"[..])]
    #[case(&b"\"text\""[..])]
    #[case(&[0xff, 0xfe][..])]
    fn rejects_non_objects(#[case] body: &[u8]) {
        assert!(Payload::decode(body).is_err());
    }

    #[rstest]
    fn non_object_error_names_the_kind() {
        let err = Payload::decode(b"[1]").expect_err("array is not a payload");
        assert_eq!(err.to_string(), "message body must be a JSON object, got an array");
    }
}
