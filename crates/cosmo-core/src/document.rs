//! Tagged document values.
//!
//! Backends hand documents over as `serde_json::Value`. Analysis code reads
//! them through [`DocValue`], a one-level view that adds a real date variant.
//! Children are classified only when they are visited, so walking a document
//! to a fixed depth never touches what lies below it.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// A sampled document value, borrowed from its source JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocValue<'a> {
    Null,
    Bool(bool),
    Number(&'a Number),
    String(&'a str),
    /// Source text and its parsed instant.
    Date(&'a str, DateTime<FixedOffset>),
    Array(&'a [Value]),
    Object(&'a Map<String, Value>),
}

/// Type classification of a value, as reported in schema summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Null,
    Boolean,
    Number,
    String,
    Date,
    Array,
    Object,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Date => "date",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'a> DocValue<'a> {
    /// Classify this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            DocValue::Null => TypeTag::Null,
            DocValue::Bool(_) => TypeTag::Boolean,
            DocValue::Number(_) => TypeTag::Number,
            DocValue::String(_) => TypeTag::String,
            DocValue::Date(..) => TypeTag::Date,
            DocValue::Array(_) => TypeTag::Array,
            DocValue::Object(_) => TypeTag::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DocValue::Null)
    }

    /// Field lookup on an object value.
    pub fn get(&self, key: &str) -> Option<DocValue<'a>> {
        match self {
            DocValue::Object(map) => map.get(key).map(DocValue::from),
            _ => None,
        }
    }

    /// Fields of an object value in document order; empty for anything else.
    pub fn fields(self) -> impl Iterator<Item = (&'a str, DocValue<'a>)> + 'a {
        let map = match self {
            DocValue::Object(map) => Some(map),
            _ => None,
        };
        map.into_iter()
            .flat_map(|map| map.iter())
            .map(|(key, value)| (key.as_str(), DocValue::from(value)))
    }

    /// The value as it appeared in the document.
    pub fn to_json(&self) -> Value {
        match self {
            DocValue::Null => Value::Null,
            DocValue::Bool(b) => Value::Bool(*b),
            DocValue::Number(n) => Value::Number((*n).clone()),
            DocValue::String(s) | DocValue::Date(s, _) => Value::String(s.to_string()),
            DocValue::Array(items) => Value::Array(items.to_vec()),
            DocValue::Object(map) => Value::Object((*map).clone()),
        }
    }
}

impl<'a> From<&'a Value> for DocValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => DocValue::Null,
            Value::Bool(b) => DocValue::Bool(*b),
            Value::Number(n) => DocValue::Number(n),
            Value::String(s) => match parse_date(s) {
                Some(d) => DocValue::Date(s, d),
                None => DocValue::String(s),
            },
            Value::Array(items) => DocValue::Array(items),
            Value::Object(map) => DocValue::Object(map),
        }
    }
}

/// RFC 3339 timestamps are treated as dates; anything shorter than a full
/// date-time is left as a plain string.
fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    if s.len() < 20 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    DateTime::parse_from_rfc3339(s).ok()
}
