//! Attribute Value Model
//!
//! Scalar values carried by cached records and cache entries. `AttrMap` is
//! the shared shape of a durable row, a cache entry, and a change set:
//! attribute name to value, ordered for stable serialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mapping from attribute name to value.
///
/// `BTreeMap` keeps serialization deterministic across processes, so two
/// writers produce byte-identical cache blobs for identical state.
pub type AttrMap = BTreeMap<String, Value>;

/// A scalar attribute value.
///
/// Timestamps are always UTC; they order the freshness of cached data
/// against the durable row (the watermark attribute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent / unset value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// UTC timestamp (watermark attributes use this variant)
    Time(DateTime<Utc>),
}

impl Value {
    /// Interpret this value as a timestamp, if it is one.
    #[inline]
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Check for the null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

// =============================================================================
// Tests
// =============================================================================
