//! JSON parser — structured logs, the most common ingestion shape.
//!
//! `can_parse` is deliberately cheap (no deserialization): the trimmed
//! input must begin with `{` and end with `}`. Full decoding happens only
//! in `parse`, after the registry has already committed to trying this
//! parser.

use serde_json::Value;

use crate::error::ParseError;
use crate::event::{AttrValue, Event};
use crate::parser::alias::{
    MESSAGE_ALIASES, SERVICE_ALIASES, SEVERITY_ALIASES, SPAN_ALIASES, TIMESTAMP_ALIASES,
    TRACE_ALIASES,
};
use crate::parser::traits::LogParser;
use crate::timestamp::parse_timestamp;

pub const MAX_EVENT_SIZE: usize = 1_048_576;

pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        if raw.len() > MAX_EVENT_SIZE {
            return false;
        }
        let trimmed = trim_bytes(raw);
        trimmed.first() == Some(&b'{') && trimmed.last() == Some(&b'}')
    }

    fn parse(&self, raw: &[u8]) -> Result<Event, ParseError> {
        if raw.len() > MAX_EVENT_SIZE {
            return Err(ParseError::TooLarge(raw.len()));
        }
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NonUtf8)?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| ParseError::Failed(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(ParseError::Failed("top-level JSON value is not an object".into()));
        };

        let mut event = Event::empty();

        if let Some(ts) = first_present(&map, TIMESTAMP_ALIASES) {
            event.timestamp = extract_timestamp(ts).unwrap_or(event.timestamp);
        }
        if let Some(level) = first_present(&map, SEVERITY_ALIASES).and_then(Value::as_str) {
            event.level = level.to_ascii_lowercase();
        }
        if let Some(msg) = first_present(&map, MESSAGE_ALIASES).and_then(Value::as_str) {
            event.message = msg.to_string();
        }
        if let Some(svc) = first_present(&map, SERVICE_ALIASES).and_then(Value::as_str) {
            event.service = svc.to_string();
        }
        if let Some(trace) = first_present(&map, TRACE_ALIASES).and_then(Value::as_str) {
            event.trace_id = Some(trace.to_string());
        }
        if let Some(span) = first_present(&map, SPAN_ALIASES).and_then(Value::as_str) {
            event.span_id = Some(span.to_string());
        }

        let consumed = consumed_keys(TIMESTAMP_ALIASES, &map)
            .into_iter()
            .chain(consumed_keys(SEVERITY_ALIASES, &map))
            .chain(consumed_keys(MESSAGE_ALIASES, &map))
            .chain(consumed_keys(SERVICE_ALIASES, &map))
            .chain(consumed_keys(TRACE_ALIASES, &map))
            .chain(consumed_keys(SPAN_ALIASES, &map))
            .collect::<Vec<_>>();

        for (key, value) in map {
            if consumed.contains(&key) {
                continue;
            }
            event.attributes.insert(key, AttrValue::from(value));
        }

        Ok(event)
    }
}

/// Returns the first alias present in the map, in precedence order.
fn first_present<'a>(map: &'a serde_json::Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|a| map.get(*a))
}

/// Only the first present alias is "consumed" (removed from attributes);
/// later aliases, if also present, fall through to attributes verbatim.
fn consumed_keys(aliases: &[&str], map: &serde_json::Map<String, Value>) -> Vec<String> {
    aliases
        .iter()
        .find(|a| map.contains_key(**a))
        .map(|a| vec![a.to_string()])
        .unwrap_or_default()
}

fn extract_timestamp(value: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            // Mirror the string-based unix-seconds/millis heuristics by digit count.
            let as_i64 = n.as_i64()?;
            parse_timestamp(&as_i64.to_string())
        }
        _ => None,
    }
}

fn trim_bytes(raw: &[u8]) -> &[u8] {
    let start = raw.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(0);
    if start >= end {
        &[]
    } else {
        &raw[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_requires_braces() {
        let p = JsonParser::new();
        assert!(p.can_parse(b"{\"a\":1}"));
        assert!(p.can_parse(b"  {\"a\":1}  \n"));
        assert!(!p.can_parse(b"not json"));
        assert!(!p.can_parse(b"[1,2,3]"));
    }

    #[test]
    fn alias_normalization_scenario() {
        let p = JsonParser::new();
        let raw = br#"{"ts":"2024-01-15T10:30:00Z","lvl":"INFO","msg":"ok","app":"svc"}"#;
        let event = p.parse(raw).unwrap();
        assert_eq!(event.timestamp.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert_eq!(event.level, "info");
        assert_eq!(event.message, "ok");
        assert_eq!(event.service, "svc");
    }

    #[test]
    fn unmatched_fields_land_in_attributes() {
        let p = JsonParser::new();
        let raw = br#"{"message":"hi","service":"svc","user_id":42}"#;
        let event = p.parse(raw).unwrap();
        assert_eq!(event.attributes.get("user_id"), Some(&AttrValue::Int(42)));
    }

    #[test]
    fn rejects_non_object_top_level() {
        let p = JsonParser::new();
        assert!(p.parse(b"[1,2,3]").is_err());
    }
}
