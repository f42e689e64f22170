//! Regex parser — an ordered, priority-sorted set of regex patterns tried
//! when the JSON parser does not apply (spec §4.1).
//!
//! The pattern list is built once at construction and kept immutable
//! thereafter (Design Notes: avoid the O(n²) re-sort some implementations
//! do on every insert).

use regex::Regex;

use crate::error::ParseError;
use crate::event::Event;
use crate::parser::alias::canonical_slot;
use crate::parser::traits::LogParser;
use crate::timestamp::parse_timestamp;

/// A single named-capture pattern plus its dispatch priority.
pub struct RegexPatternDescriptor {
    pub name: &'static str,
    pub pattern: Regex,
    pub priority: i32,
    pub description: &'static str,
}

/// Trailing `key=value` pairs, used only by the `key_value_trailing`
/// pattern's special-cased extraction.
fn kv_pair_regex() -> Regex {
    Regex::new(r"(?P<k>[A-Za-z_][A-Za-z0-9_]*)=(?P<v>\S+)").unwrap()
}

fn built_in_patterns() -> Vec<RegexPatternDescriptor> {
    let mut v = vec![
        RegexPatternDescriptor {
            name: "syslog_rfc3164",
            pattern: Regex::new(
                r"^<(?P<pri>\d{1,3})>(?P<timestamp>\w{3}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s(?P<host>\S+)\s(?P<tag>[^:\[\s]+)(?:\[(?P<pid>\d+)\])?:\s(?P<message>.*)$",
            )
            .unwrap(),
            priority: 95,
            description: "Syslog RFC3164: <PRI>TIMESTAMP HOST TAG[PID]: MSG",
        },
        RegexPatternDescriptor {
            name: "apache_combined",
            pattern: Regex::new(
                r#"^(?P<ip>\S+) \S+ \S+ \[(?P<timestamp>[^\]]+)\] "(?P<method>\S+) (?P<path>\S+) \S+" (?P<status>\d{3}) (?P<size>\S+) "(?P<referer>[^"]*)" "(?P<agent>[^"]*)"$"#,
            )
            .unwrap(),
            priority: 90,
            description: "Apache/Nginx combined log format",
        },
        RegexPatternDescriptor {
            name: "nginx_access",
            pattern: Regex::new(
                r#"^(?P<ip>\S+) - (?P<user>\S+) \[(?P<timestamp>[^\]]+)\] "(?P<method>\S+) (?P<path>\S+) \S+" (?P<status>\d{3}) (?P<size>\d+)$"#,
            )
            .unwrap(),
            priority: 88,
            description: "Nginx access log (no referer/agent)",
        },
        RegexPatternDescriptor {
            name: "spring_boot",
            pattern: Regex::new(
                r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3})\s+(?P<level>\w+)\s+\d+\s+---\s+\[(?P<thread>[^\]]*)\]\s+(?P<logger>\S+)\s+:\s+(?P<message>.*)$",
            )
            .unwrap(),
            priority: 85,
            description: "Spring Boot timestamped/leveled log",
        },
        RegexPatternDescriptor {
            name: "apache_common",
            pattern: Regex::new(
                r#"^(?P<ip>\S+) \S+ \S+ \[(?P<timestamp>[^\]]+)\] "(?P<method>\S+) (?P<path>\S+) \S+" (?P<status>\d{3}) (?P<size>\S+)$"#,
            )
            .unwrap(),
            priority: 85,
            description: "Apache common log format",
        },
        RegexPatternDescriptor {
            name: "application_timestamped",
            pattern: Regex::new(
                r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3})\s+(?P<level>\w+)\s+(?P<service>\S+)\s+-\s+(?P<message>.*)$",
            )
            .unwrap(),
            priority: 80,
            description: "yyyy-mm-dd HH:MM:SS.sss LEVEL service - msg",
        },
        RegexPatternDescriptor {
            name: "docker",
            pattern: Regex::new(
                r"^(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z)\s+(?P<message>.*)$",
            )
            .unwrap(),
            priority: 75,
            description: "Docker JSON-file log timestamp prefix",
        },
        RegexPatternDescriptor {
            name: "generic_timestamped_level",
            pattern: Regex::new(
                r"(?i)^(?P<timestamp>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?)\s+\[?(?P<level>trace|debug|info|warn|warning|error|fatal)\]?\s*[:-]?\s*(?P<message>.*)$",
            )
            .unwrap(),
            priority: 60,
            description: "generic timestamp followed by a level",
        },
        RegexPatternDescriptor {
            name: "level_prefixed",
            pattern: Regex::new(
                r"(?i)^\[?(?P<level>trace|debug|info|warn|warning|error|fatal)\]?\s*[:-]?\s*(?P<message>.*)$",
            )
            .unwrap(),
            priority: 50,
            description: "level label at the start of the line",
        },
        RegexPatternDescriptor {
            name: "key_value_trailing",
            pattern: Regex::new(r"(?:[A-Za-z_][A-Za-z0-9_]*=\S+\s*){2,}$").unwrap(),
            priority: 40,
            description: "trailing key=value pairs",
        },
        RegexPatternDescriptor {
            name: "fallback_message",
            pattern: Regex::new(r".*").unwrap(),
            priority: 10,
            description: "fallback: the whole line is the message",
        },
    ];
    v.sort_by_key(|p| std::cmp::Reverse(p.priority));
    v
}

pub struct RegexParser {
    patterns: Vec<RegexPatternDescriptor>,
    kv_extractor: Regex,
}

impl RegexParser {
    pub fn new() -> Self {
        Self::with_patterns(built_in_patterns())
    }

    /// For tests/custom deployments: construct with an explicit pattern
    /// set, sorted immediately so the invariant "patterns are sorted
    /// descending by priority" always holds.
    pub fn with_patterns(mut patterns: Vec<RegexPatternDescriptor>) -> Self {
        patterns.sort_by_key(|p| std::cmp::Reverse(p.priority));
        Self {
            patterns,
            kv_extractor: kv_pair_regex(),
        }
    }

    pub fn patterns(&self) -> &[RegexPatternDescriptor] {
        &self.patterns
    }
}

impl Default for RegexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for RegexParser {
    fn name(&self) -> &str {
        "regex"
    }

    fn can_parse(&self, raw: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(raw) else {
            return false;
        };
        self.patterns.iter().any(|p| p.pattern.is_match(text))
    }

    fn parse(&self, raw: &[u8]) -> Result<Event, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NonUtf8)?;
        let trimmed = text.trim_end_matches(['\n', '\r']);

        for desc in &self.patterns {
            let Some(caps) = desc.pattern.captures(trimmed) else {
                continue;
            };

            let mut event = Event::empty();
            event.timestamp = chrono::Utc::now();
            event.level = "info".to_string();
            event.message = trimmed.to_string();
            event.service = "unknown".to_string();

            if desc.name == "key_value_trailing" {
                let mut last_kv_start = trimmed.len();
                for m in self.kv_extractor.find_iter(trimmed) {
                    last_kv_start = last_kv_start.min(m.start());
                    if let Some(c) = self.kv_extractor.captures(m.as_str()) {
                        event
                            .attributes
                            .insert(c["k"].to_string(), c["v"].to_string().into());
                    }
                }
                event.message = trimmed[..last_kv_start].trim().to_string();
            } else {
                for name in desc.pattern.capture_names().flatten() {
                    let Some(m) = caps.name(name) else { continue };
                    let value = m.as_str();
                    match canonical_slot(name) {
                        Some("timestamp") => {
                            if let Some(ts) = parse_timestamp(value) {
                                event.timestamp = ts;
                            }
                        }
                        Some("level") => event.level = value.to_ascii_lowercase(),
                        Some("message") => event.message = value.to_string(),
                        Some("service") => event.service = value.to_string(),
                        Some("trace_id") => event.trace_id = Some(value.to_string()),
                        Some("span_id") => event.span_id = Some(value.to_string()),
                        _ => {
                            event.attributes.insert(name.to_string(), value.to_string().into());
                        }
                    }
                }
            }

            event
                .attributes
                .insert("_parser".to_string(), "regex".to_string().into());
            event
                .attributes
                .insert("_pattern".to_string(), desc.name.to_string().into());

            return Ok(event);
        }

        Err(ParseError::NoSuitableParser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_sorted_descending_by_priority() {
        let p = RegexParser::new();
        let priorities: Vec<i32> = p.patterns().iter().map(|d| d.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn fallback_always_matches() {
        let p = RegexParser::new();
        assert!(p.can_parse(b"anything at all, really"));
    }

    #[test]
    fn apache_combined_scenario() {
        let p = RegexParser::new();
        let line = br#"192.168.1.1 - - [15/Jan/2024:10:30:00 +0000] "GET /api/users HTTP/1.1" 200 1234 "-" "curl/8""#;
        let event = p.parse(line).unwrap();
        assert_eq!(event.service, "unknown");
        assert_eq!(event.attributes["ip"].as_scalar_str().unwrap(), "192.168.1.1");
        assert_eq!(event.attributes["method"].as_scalar_str().unwrap(), "GET");
        assert_eq!(event.attributes["path"].as_scalar_str().unwrap(), "/api/users");
        assert_eq!(event.attributes["status"].as_scalar_str().unwrap(), "200");
        assert_eq!(event.attributes["_pattern"].as_scalar_str().unwrap(), "apache_combined");
    }

    #[test]
    fn level_prefixed_picks_level_and_message() {
        let p = RegexParser::new();
        let event = p.parse(b"ERROR: disk full").unwrap();
        assert_eq!(event.level, "error");
        assert_eq!(event.message, "disk full");
    }

    #[test]
    fn key_value_trailing_splits_pairs_from_message() {
        let p = RegexParser::new();
        let event = p.parse(b"request completed path=/x status=200 dur=12ms").unwrap();
        assert_eq!(event.message, "request completed");
        assert_eq!(event.attributes["path"].as_scalar_str().unwrap(), "/x");
        assert_eq!(event.attributes["status"].as_scalar_str().unwrap(), "200");
    }
}
