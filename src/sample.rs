//! Value classifier.
//!
//! Samples are plain `serde_json::Value`s. Dates, record ids, uuids and
//! `undefined` travel as single-key marker objects:
//!
//! ```json
//! {"$date": "2024-05-01T10:00:00Z"}
//! {"$recordId": "user:tobie"}          // or {"$recordId": {"tb": "user", "id": "tobie"}}
//! {"$uuid": "0190f8a2-52c4-7c47-9b3b-3f4e0c1f0a11"}
//! {"$undefined": true}
//! ```
//!
//! Markers look like objects, so they are tested before the generic object
//! arm. A marker with a malformed payload is rejected, never downgraded.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{InferenceError, Result};
use crate::types::SimpleKind;

pub const DATE_MARKER: &str = "$date";
pub const RECORD_ID_MARKER: &str = "$recordId";
pub const UUID_MARKER: &str = "$uuid";
pub const UNDEFINED_MARKER: &str = "$undefined";

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Primitive(SimpleKind),
    Array,
    Object,
    Date,
    RecordId,
    Uuid,
}

// ------------------------------- Paths ----------------------------------- //

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a sample, rendered like `rows[2].owner.id`.
#[derive(Debug, Clone, Default)]
pub struct JsonPath(Vec<Segment>);

impl JsonPath {
    pub fn root() -> Self { Self::default() }

    pub fn depth(&self) -> usize { self.0.len() }

    pub(crate) fn push_key(&mut self, key: &str) { self.0.push(Segment::Key(key.to_owned())); }

    pub(crate) fn push_index(&mut self, index: usize) { self.0.push(Segment::Index(index)); }

    pub(crate) fn pop(&mut self) { self.0.pop(); }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Segment::Key(k) if i == 0 => write!(f, "{k}")?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

// ----------------------------- Classifier -------------------------------- //

pub fn classify(value: &Value) -> Result<ShapeKind> {
    classify_at(value, &JsonPath::root())
}

pub(crate) fn classify_at(value: &Value, path: &JsonPath) -> Result<ShapeKind> {
    let fail = |reason: String| InferenceError::classification(path.to_string(), reason);

    if let Some(payload) = marker(value, DATE_MARKER) {
        check_date(payload).map_err(fail)?;
        return Ok(ShapeKind::Date);
    }
    if value.is_array() {
        return Ok(ShapeKind::Array);
    }
    if let Some(payload) = marker(value, RECORD_ID_MARKER) {
        check_record_id(payload).map_err(fail)?;
        return Ok(ShapeKind::RecordId);
    }
    if let Some(payload) = marker(value, UUID_MARKER) {
        check_uuid(payload).map_err(fail)?;
        return Ok(ShapeKind::Uuid);
    }
    if let Some(payload) = marker(value, UNDEFINED_MARKER) {
        if payload != &Value::Bool(true) {
            return Err(fail(format!("`{UNDEFINED_MARKER}` expects `true`, got {payload}")));
        }
        return Ok(ShapeKind::Primitive(SimpleKind::Undefined));
    }
    match value {
        Value::Object(_) => Ok(ShapeKind::Object),
        Value::Null => Ok(ShapeKind::Primitive(SimpleKind::Null)),
        Value::Bool(_) => Ok(ShapeKind::Primitive(SimpleKind::Boolean)),
        Value::Number(_) => Ok(ShapeKind::Primitive(SimpleKind::Number)),
        Value::String(_) => Ok(ShapeKind::Primitive(SimpleKind::String)),
        Value::Array(_) => Ok(ShapeKind::Array),
    }
}

fn marker<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    let map: &Map<String, Value> = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(name)
}

fn check_date(payload: &Value) -> std::result::Result<(), String> {
    let s = payload
        .as_str()
        .ok_or_else(|| format!("`{DATE_MARKER}` expects an RFC 3339 string, got {payload}"))?;
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|_| ())
        .map_err(|e| format!("`{s}` is not an RFC 3339 timestamp: {e}"))
}

fn check_record_id(payload: &Value) -> std::result::Result<(), String> {
    match payload {
        Value::String(s) => {
            let (table, key) = s
                .split_once(':')
                .ok_or_else(|| format!("record id `{s}` is missing the `table:` prefix"))?;
            if !TABLE_NAME.is_match(table) {
                return Err(format!("record id `{s}` has an invalid table name"));
            }
            if key.is_empty() {
                return Err(format!("record id `{s}` has an empty key"));
            }
            Ok(())
        }
        Value::Object(parts) => {
            let table = parts.get("tb").and_then(Value::as_str).unwrap_or_default();
            if !TABLE_NAME.is_match(table) {
                return Err("record id object needs a `tb` table name".to_owned());
            }
            match parts.get("id") {
                None | Some(Value::Null) => Err("record id object needs a non-null `id`".to_owned()),
                Some(_) if parts.len() != 2 => Err("record id object takes only `tb` and `id`".to_owned()),
                Some(_) => Ok(()),
            }
        }
        other => Err(format!("`{RECORD_ID_MARKER}` expects a string or object, got {other}")),
    }
}

fn check_uuid(payload: &Value) -> std::result::Result<(), String> {
    let s = payload
        .as_str()
        .ok_or_else(|| format!("`{UUID_MARKER}` expects a string, got {payload}"))?;
    uuid::Uuid::parse_str(s)
        .map(|_| ())
        .map_err(|e| format!("`{s}` is not a uuid: {e}"))
}
