//! Canonical field aliasing shared by the JSON parser and the regex
//! parsers' named-capture mapping (spec §4.1).

/// Returns the canonical slot a source key maps to, trying the alias
/// lists in the precedence order spec.md gives for each canonical field.
pub fn canonical_slot(key: &str) -> Option<&'static str> {
    match key {
        "timestamp" | "time" | "@timestamp" | "ts" => Some("timestamp"),
        "level" | "lvl" | "severity" | "priority" => Some("level"),
        "message" | "msg" | "text" | "content" => Some("message"),
        "service" | "app" | "name" | "component" | "logger" => Some("service"),
        "trace_id" | "trace" => Some("trace_id"),
        "span_id" | "span" => Some("span_id"),
        _ => None,
    }
}

/// The alias lists in precedence order, used when scanning a map for the
/// first present alias of each canonical field (JSON parser).
pub const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "time", "@timestamp", "ts"];
pub const SEVERITY_ALIASES: &[&str] = &["level", "lvl", "severity", "priority"];
pub const MESSAGE_ALIASES: &[&str] = &["message", "msg", "text", "content"];
pub const SERVICE_ALIASES: &[&str] = &["service", "app", "name", "component", "logger"];
pub const TRACE_ALIASES: &[&str] = &["trace_id", "trace"];
pub const SPAN_ALIASES: &[&str] = &["span_id", "span"];
