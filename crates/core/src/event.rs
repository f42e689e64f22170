//! Event — the canonical in-memory log record.
//!
//! One [`Event`] is produced per ingested log line/object regardless of
//! which receiver or parser produced it. Every downstream stage (rule
//! engine, batch writer, fan-out hub) owns the event by value.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity label, normalized to lowercase canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// Parse a severity label case-insensitively, accepting common aliases
    /// (`warning` -> `warn`, `err`/`critical` -> `error`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Severity::Trace),
            "debug" => Some(Severity::Debug),
            "info" | "information" | "notice" => Some(Severity::Info),
            "warn" | "warning" => Some(Severity::Warn),
            "error" | "err" => Some(Severity::Error),
            "fatal" | "critical" | "crit" | "panic" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed attribute value. Maps losslessly to/from
/// `serde_json::Value` so JSON interop never needs an erased-type
/// container, per the "dynamic typed attributes" design note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
    Null,
}

impl AttrValue {
    /// A scalar view used by the hub's filter operators; `None` for
    /// non-scalar values (arrays/maps count as non-matching, per spec).
    pub fn as_scalar_str(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) => Some(s.clone()),
            AttrValue::Int(i) => Some(i.to_string()),
            AttrValue::Float(f) => Some(f.to_string()),
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Array(_) | AttrValue::Map(_) | AttrValue::Null => None,
        }
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttrValue::Int(i)
                } else {
                    AttrValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => AttrValue::Str(s),
            serde_json::Value::Array(a) => {
                AttrValue::Array(a.into_iter().map(AttrValue::from).collect())
            }
            serde_json::Value::Object(o) => AttrValue::Map(
                o.into_iter()
                    .map(|(k, v)| (k, AttrValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

/// The canonical log record. See spec §3 for field invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Event {
    /// A blank event with empty canonical fields, ready for the parser to
    /// fill in and the rule engine to map/default/validate.
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            level: String::new(),
            message: String::new(),
            service: String::new(),
            trace_id: None,
            span_id: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Stamp a fresh UUID-like id, the ingest timestamp, and the default
    /// level/service if they are still empty. Idempotent: calling this
    /// twice on an already-stamped event is a no-op (testable property 1).
    pub fn stamp_defaults(&mut self, now: DateTime<Utc>) {
        if self.id.is_empty() {
            self.id = generate_id();
        }
        if self.timestamp == DateTime::<Utc>::UNIX_EPOCH {
            self.timestamp = now;
        }
        if self.level.is_empty() {
            self.level = "info".to_string();
        }
        if self.service.is_empty() {
            self.service = "unknown".to_string();
        }
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Look up a value by canonical slot name or attribute key, returning
    /// a scalar string for hub filter comparisons.
    pub fn field_as_str(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "level" | "severity" => Some(self.level.clone()),
            "message" => Some(self.message.clone()),
            "service" => Some(self.service.clone()),
            "trace_id" => self.trace_id.clone(),
            "span_id" => self.span_id.clone(),
            other => self.attr(other).and_then(AttrValue::as_scalar_str),
        }
    }

    /// Whether a canonical slot (or attribute) currently holds a value,
    /// used by the rule engine's mapping/defaults passes.
    pub fn is_field_empty(&self, field: &str) -> bool {
        match field {
            "id" => self.id.is_empty(),
            "level" | "severity" => self.level.is_empty(),
            "message" => self.message.is_empty(),
            "service" => self.service.is_empty(),
            "trace_id" => self.trace_id.is_none(),
            "span_id" => self.span_id.is_none(),
            other => !self.attributes.contains_key(other),
        }
    }

    /// Sets a canonical slot or attribute by name (string-valued).
    pub fn set_field_str(&mut self, field: &str, value: String) {
        match field {
            "id" => self.id = value,
            "level" | "severity" => self.level = value,
            "message" => self.message = value,
            "service" => self.service = value,
            "trace_id" => self.trace_id = Some(value),
            "span_id" => self.span_id = Some(value),
            other => {
                self.attributes.insert(other.to_string(), AttrValue::Str(value));
            }
        }
    }

    /// Removes a source field (canonical slot or attribute), returning
    /// its prior string value if present.
    pub fn take_field_str(&mut self, field: &str) -> Option<String> {
        match field {
            "id" => {
                if self.id.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.id))
                }
            }
            "level" | "severity" => {
                if self.level.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.level))
                }
            }
            "message" => {
                if self.message.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.message))
                }
            }
            "service" => {
                if self.service.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.service))
                }
            }
            "trace_id" => self.trace_id.take(),
            "span_id" => self.span_id.take(),
            other => self.attributes.remove(other).and_then(|v| v.as_scalar_str()),
        }
    }
}

/// Generates a reasonably unique id without pulling in a UUID dependency:
/// wall-clock nanoseconds plus a process-local counter.
fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now();
    format!("{:x}-{:x}", now.timestamp_nanos_opt().unwrap_or(0), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_defaults_is_idempotent() {
        let mut e = Event::empty();
        let now = Utc::now();
        e.stamp_defaults(now);
        let once = e.clone();
        e.stamp_defaults(now);
        assert_eq!(once.id, e.id);
        assert_eq!(once.timestamp, e.timestamp);
        assert_eq!(once.level, e.level);
        assert_eq!(once.service, e.service);
    }

    #[test]
    fn severity_parses_aliases() {
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warn));
        assert_eq!(Severity::parse("err"), Some(Severity::Error));
        assert_eq!(Severity::parse("nonsense"), None);
    }

    #[test]
    fn attr_value_roundtrips_json() {
        let v: serde_json::Value = serde_json::json!({"a": 1, "b": [1,2], "c": "x"});
        let attr = AttrValue::from(v);
        match attr {
            AttrValue::Map(m) => {
                assert_eq!(m.get("c").unwrap().as_scalar_str(), Some("x".to_string()));
                assert!(m.get("b").unwrap().as_scalar_str().is_none());
            }
            _ => panic!("expected map"),
        }
    }
}
