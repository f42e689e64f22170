//! Per-subscriber filter evaluation (spec §4.4: conjunction over
//! `(field, operator, value)` triples, case-insensitive comparison).

use logcore::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[serde(alias = "=")]
    Equals,
    #[serde(alias = "!=")]
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub operator: FilterOp,
    pub value: String,
}

/// Empty filter list matches everything; otherwise every rule must hold.
pub fn matches(filters: &[FilterRule], event: &Event) -> bool {
    filters.iter().all(|f| matches_one(f, event))
}

fn matches_one(filter: &FilterRule, event: &Event) -> bool {
    let Some(actual) = event.field_as_str(&filter.field) else {
        return false;
    };
    let actual = actual.to_ascii_lowercase();
    let expected = filter.value.to_ascii_lowercase();

    match filter.operator {
        FilterOp::Equals => actual == expected,
        FilterOp::NotEquals => actual != expected,
        FilterOp::Contains => actual.contains(&expected),
        FilterOp::NotContains => !actual.contains(&expected),
        FilterOp::StartsWith => actual.starts_with(&expected),
        FilterOp::EndsWith => actual.ends_with(&expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event_with_level(level: &str) -> Event {
        let mut e = Event::empty();
        e.level = level.to_string();
        e.stamp_defaults(Utc::now());
        e
    }

    #[test]
    fn empty_filter_list_matches_all() {
        assert!(matches(&[], &event_with_level("error")));
    }

    #[test]
    fn equals_is_case_insensitive() {
        let f = FilterRule {
            field: "level".into(),
            operator: FilterOp::Equals,
            value: "ERROR".into(),
        };
        assert!(matches(&[f], &event_with_level("error")));
    }

    #[test]
    fn missing_field_does_not_match() {
        let f = FilterRule {
            field: "trace_id".into(),
            operator: FilterOp::Equals,
            value: "abc".into(),
        };
        assert!(!matches(&[f], &event_with_level("info")));
    }

    #[test]
    fn conjunction_requires_all_rules() {
        let e = event_with_level("error");
        let rules = vec![
            FilterRule { field: "level".into(), operator: FilterOp::Equals, value: "error".into() },
            FilterRule { field: "service".into(), operator: FilterOp::Equals, value: "nope".into() },
        ];
        assert!(!matches(&rules, &e));
    }
}
