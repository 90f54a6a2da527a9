//! Runtime values of filter expressions and their conversion from entity JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use sensorpath_model::PropertyKind;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Geometry;

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_instant(&self.start), format_instant(&self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Instant(DateTime<Utc>),
    Period(TimeInterval),
    Geometry(Geometry),
    /// Structured JSON that has no scalar reading (objects, arrays).
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a stored property value according to its declared kind.
    ///
    /// Returns `None` when the stored JSON does not fit the kind; such values
    /// make every comparison they take part in unknown.
    pub fn from_json(json: &serde_json::Value, kind: PropertyKind) -> Option<Value> {
        use serde_json::Value as J;
        match (kind, json) {
            (_, J::Null) => Some(Value::Null),
            (PropertyKind::Id, J::String(s)) => Some(Value::Text(s.clone())),
            (PropertyKind::Id, J::Number(_)) => Some(Self::from_json_dynamic(json)),
            (PropertyKind::Text, J::String(s)) => Some(Value::Text(s.clone())),
            (PropertyKind::Number, J::Number(_)) => Some(Self::from_json_dynamic(json)),
            (PropertyKind::Boolean, J::Bool(b)) => Some(Value::Boolean(*b)),
            (PropertyKind::Instant, J::String(s)) => parse_instant(s).map(Value::Instant),
            (PropertyKind::Period, J::String(s)) => parse_interval(s).map(Value::Period),
            (PropertyKind::TimeValue, J::String(s)) => parse_time_value(s),
            (PropertyKind::Geometry, J::Object(_)) => Geometry::from_geojson(json).map(Value::Geometry),
            (PropertyKind::Geometry, J::String(s)) => Geometry::parse_wkt(s).map(Value::Geometry),
            (PropertyKind::Json | PropertyKind::Any, _) => Some(Self::from_json_dynamic(json)),
            _ => None,
        }
    }

    /// Reads JSON without a declared kind.
    pub fn from_json_dynamic(json: &serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Boolean(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => Value::Text(s.clone()),
            other => Value::Json(other.clone()),
        }
    }
}

impl fmt::Display for Value {
    /// Filter-literal syntax; re-parses to the same value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::Text(s) => write_quoted(f, s),
            Value::Instant(t) => f.write_str(&format_instant(t)),
            Value::Period(p) => write!(f, "{p}"),
            Value::Geometry(g) => {
                f.write_str("geography")?;
                write_quoted(f, &g.to_string())
            }
            Value::Json(j) => write_quoted(f, &j.to_string()),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'{}'", s.replace('\'', "''"))
}

// ============================================================================
// Time parsing
// ============================================================================

pub fn format_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// RFC 3339 instant, normalised to UTC.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `start/end` interval of two RFC 3339 instants.
pub fn parse_interval(text: &str) -> Option<TimeInterval> {
    let (start, end) = text.split_once('/')?;
    TimeInterval::new(parse_instant(start)?, parse_instant(end)?)
}

/// Either an instant or an interval.
pub fn parse_time_value(text: &str) -> Option<Value> {
    if text.contains('/') {
        parse_interval(text).map(Value::Period)
    } else {
        parse_instant(text).map(Value::Instant)
    }
}
