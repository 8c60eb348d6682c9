//! Form encoding for outbound delivery requests.
//!
//! Produces `application/x-www-form-urlencoded` bodies with PHP
//! `http_build_query` conventions: nested objects and arrays flatten into
//! `key[sub]` names, booleans become `1`/`0`, nulls are skipped and spaces
//! encode as `+`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

use crate::payload::Payload;

/// Everything except ASCII alphanumerics, `-`, `_` and `.` is escaped.
///
/// Space is excluded from percent encoding because [`url_encode`] maps it
/// to `+` while splitting.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// URL-encode a string using `+` for spaces.
pub(super) fn url_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut first = true;
    for chunk in s.split(' ') {
        if !first {
            result.push('+');
        }
        first = false;
        result.extend(utf8_percent_encode(chunk, FORM_ENCODE_SET));
    }
    result
}

/// Encode `form` as a query string.
pub(crate) fn encode_form(form: &Payload) -> String {
    let mut pairs = Vec::with_capacity(form.len());
    for (key, value) in form.iter() {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn flatten(name: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => out.push((name, if *flag { "1" } else { "0" }.to_owned())),
        Value::Number(n) => out.push((name, n.to_string())),
        Value::String(s) => out.push((name, s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(format!("{name}[{index}]"), item, out);
            }
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                flatten(format!("{name}[{key}]"), item, out);
            }
        }
    }
}
