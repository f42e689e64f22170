//! Parser registry — tries parsers in registration order, first success
//! wins (spec §4.1).

use std::time::Instant;

use crate::parser::metrics::ParserMetrics;
use crate::parser::model::ParseResult;
use crate::parser::traits::LogParser;
use crate::ruleset::RuleEngine;

pub struct ParserRegistry {
    parsers: Vec<Box<dyn LogParser>>,
    metrics: ParserMetrics,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            metrics: ParserMetrics::new(),
        }
    }

    pub fn register(&mut self, parser: Box<dyn LogParser>) -> &mut Self {
        self.parsers.push(parser);
        self
    }

    pub fn metrics(&self) -> &ParserMetrics {
        &self.metrics
    }

    /// Tries each registered parser in order; for each, calls
    /// `can_parse` then `parse`. On parse failure the parser is skipped
    /// and the next is tried. If none succeed, the result carries
    /// `ParseError::NoSuitableParser`.
    pub fn parse(&self, raw: &[u8]) -> ParseResult {
        let start = Instant::now();

        for parser in &self.parsers {
            if !parser.can_parse(raw) {
                continue;
            }
            match parser.parse(raw) {
                Ok(event) => {
                    self.metrics.record_success(parser.name());
                    return ParseResult::ok(event, parser.name(), start.elapsed());
                }
                Err(_) => {
                    self.metrics.record_failure(parser.name());
                    continue;
                }
            }
        }

        self.metrics.record_no_suitable_parser();
        ParseResult::err(crate::error::ParseError::NoSuitableParser, start.elapsed())
    }

    /// Like [`Self::parse`], but a parser whose output fails the rule
    /// engine's validation/transform pass is treated as a miss and the
    /// next parser in priority order is tried (spec §4.1: "on
    /// validation/transform failure the parser is skipped and the next is
    /// tried"). Returns the already rule-engine-applied event on success.
    ///
    /// Per-event stamping (spec §4.5: fresh id, ingest timestamp, default
    /// `level`/`service`) happens here, between `parse` and
    /// `engine.apply`, so a structured event that's merely missing a
    /// canonical slot validates as itself instead of falling through to
    /// the regex fallback parser and losing its structure.
    pub fn parse_validated(&self, raw: &[u8], engine: &RuleEngine) -> ParseResult {
        let start = Instant::now();

        for parser in &self.parsers {
            if !parser.can_parse(raw) {
                continue;
            }
            let mut event = match parser.parse(raw) {
                Ok(event) => event,
                Err(_) => {
                    self.metrics.record_failure(parser.name());
                    continue;
                }
            };
            event.stamp_defaults(chrono::Utc::now());
            match engine.apply(event) {
                Ok(validated) => {
                    self.metrics.record_success(parser.name());
                    return ParseResult::ok(validated, parser.name(), start.elapsed());
                }
                Err(_) => {
                    self.metrics.record_failure(parser.name());
                    continue;
                }
            }
        }

        self.metrics.record_no_suitable_parser();
        ParseResult::err(crate::error::ParseError::NoSuitableParser, start.elapsed())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the standard registry: JSON parser first (cheap, unambiguous
/// `{...}` check), then the priority-sorted regex parser.
pub fn default_registry() -> ParserRegistry {
    let mut reg = ParserRegistry::new();
    reg.register(Box::new(crate::parser::formats::json::JsonParser::new()));
    reg.register(Box::new(crate::parser::formats::regex::RegexParser::new()));
    reg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::RuleSet;

    #[test]
    fn json_tried_before_regex() {
        let reg = default_registry();
        let result = reg.parse(br#"{"message":"ok","service":"svc"}"#);
        assert_eq!(result.parser_name, "json");
    }

    #[test]
    fn falls_back_to_regex_for_plain_text() {
        let reg = default_registry();
        let result = reg.parse(b"ERROR: boom");
        assert_eq!(result.parser_name, "regex");
        assert_eq!(result.event.unwrap().level, "error");
    }

    #[test]
    fn parse_validated_skips_parser_whose_output_fails_validation() {
        let reg = default_registry();
        let engine = RuleEngine::new(RuleSet::default_strict());
        // JSON parser would succeed syntactically but the message is
        // empty, which fails required-field validation; the regex
        // fallback must then be tried and win.
        let result = reg.parse_validated(br#"{"service":"svc"}"#, &engine);
        assert_eq!(result.parser_name, "regex");
    }

    #[test]
    fn parse_validated_fills_defaultable_slot_instead_of_falling_back() {
        let reg = default_registry();
        let engine = RuleEngine::new(RuleSet::default_strict());
        // `service` is missing but defaultable ("unknown"); the event
        // must validate as the structured JSON parse, not be
        // re-ingested by the regex fallback with the raw JSON text as
        // its message.
        let result = reg.parse_validated(br#"{"message":"hi","level":"info"}"#, &engine);
        assert_eq!(result.parser_name, "json");
        let event = result.event.unwrap();
        assert_eq!(event.message, "hi");
        assert_eq!(event.service, "unknown");
    }

    #[test]
    fn parse_validated_returns_engine_applied_event() {
        let reg = default_registry();
        let engine = RuleEngine::new(RuleSet::default_strict());
        let result = reg.parse_validated(br#"{"message":"ok","service":"svc","level":"INFO"}"#, &engine);
        assert_eq!(result.event.unwrap().level, "info");
    }
}
