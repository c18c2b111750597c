//! Legacy export records.
//!
//! The legacy system exported one JSON document per line, straight out of a
//! document database: identifiers come wrapped as `{"$oid": "..."}` and
//! timestamps as `{"$date": ...}` (an RFC 3339 string or epoch milliseconds).
//! [`LegacyRecord`] keeps the original document for reporting and hands the
//! importer its fields one by one, unwrapping those envelopes.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::RecordError;

/// Unwraps an `{"$oid": ...}` envelope. Plain strings pass through.
#[must_use]
pub fn oid(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Unwraps a `{"$date": ...}` envelope. Plain strings and numbers pass through.
///
/// Strings are RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` timestamp taken as
/// UTC. Epoch milliseconds may also come as `{"$numberLong": "..."}`.
#[must_use]
pub fn date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        Value::Object(map) => match (map.get("$date"), map.get("$numberLong")) {
            (Some(inner), _) => date(inner),
            (None, Some(Value::String(millis))) => millis.parse().ok().and_then(from_millis),
            _ => None,
        },
        _ => None,
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// One legacy document being taken apart by an importer.
#[derive(Debug, Clone)]
pub struct LegacyRecord {
    original: Value,
    fields: Map<String, Value>,
}

impl LegacyRecord {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let original: Value =
            serde_json::from_str(line).map_err(|e| RecordError::InvalidJson(e.to_string()))?;
        Self::from_value(original)
    }

    /// Wraps an already parsed document.
    pub fn from_value(original: Value) -> Result<Self, RecordError> {
        let fields = original
            .as_object()
            .cloned()
            .ok_or(RecordError::NotAnObject)?;
        Ok(Self { original, fields })
    }

    /// The document as it was read.
    #[must_use]
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Short label for progress logs.
    #[must_use]
    pub fn label(&self) -> &str {
        ["uri", "username", "mnemonic"]
            .iter()
            .find_map(|key| self.get_str(key))
            .unwrap_or("-")
    }

    /// Borrows a non-empty string field without consuming it.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Removes a field. `null` counts as absent.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key).filter(|v| !v.is_null())
    }

    /// Removes every listed field.
    pub fn discard(&mut self, keys: &[&str]) {
        for key in keys {
            self.fields.remove(*key);
        }
    }

    /// Removes a non-empty string field.
    pub fn take_str(&mut self, key: &str) -> Option<String> {
        match self.take(key)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Removes a string field that must be present.
    pub fn require_str(&mut self, key: &'static str) -> Result<String, RecordError> {
        self.take_str(key).ok_or(RecordError::MissingField(key))
    }

    /// Removes a boolean field.
    pub fn take_bool(&mut self, key: &str) -> Option<bool> {
        self.take(key).and_then(|v| v.as_bool())
    }

    /// Removes an identifier field, unwrapping `$oid`.
    pub fn take_oid(&mut self, key: &str) -> Option<String> {
        self.take(key).as_ref().and_then(oid)
    }

    /// Removes a timestamp field, unwrapping `$date`.
    pub fn take_date(&mut self, key: &str) -> Option<DateTime<Utc>> {
        self.take(key).as_ref().and_then(date)
    }

    /// Removes an array field. Anything else yields an empty list.
    pub fn take_array(&mut self, key: &str) -> Vec<Value> {
        match self.take(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    /// Removes a list of identifiers or strings.
    ///
    /// Accepts an array of strings or `$oid` envelopes, or a single
    /// comma-separated string.
    pub fn take_string_list(&mut self, key: &str) -> Vec<String> {
        match self.take(key) {
            Some(Value::Array(items)) => items.iter().filter_map(oid).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Removes an object field.
    pub fn take_object(&mut self, key: &str) -> Map<String, Value> {
        match self.take(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// The original document with an `errors` field added.
    #[must_use]
    pub fn with_errors(&self, errors: Value) -> Value {
        with_errors(self.original.clone(), errors)
    }
}

/// Adds an `errors` field to a reported document.
///
/// Non-object documents are wrapped as `{"record": ..., "errors": ...}`.
#[must_use]
pub fn with_errors(document: Value, errors: Value) -> Value {
    match document {
        Value::Object(mut map) => {
            map.insert("errors".to_string(), errors);
            Value::Object(map)
        }
        other => {
            let mut map = Map::new();
            map.insert("record".to_string(), other);
            map.insert("errors".to_string(), errors);
            Value::Object(map)
        }
    }
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
