//! Rule engine — mapping, defaults, transforms, and validation (spec
//! §4.2). Composition order is fixed: mapping → defaults → transforms →
//! validation, with no re-validation after transforms (spec §9, an
//! intentionally preserved source behavior, not an oversight here).

use chrono::Utc;
use regex::Regex;

use crate::error::{TransformError, ValidationError};
use crate::event::Event;
use crate::ruleset::model::{RuleSet, TransformKind, ValidationKind};

pub struct RuleEngine {
    rules: RuleSet,
}

impl RuleEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Runs the full ingress pipeline. Returns the transformed event, or
    /// the first validation/transform error encountered.
    pub fn apply(&self, mut event: Event) -> Result<Event, ValidationError> {
        self.map_fields(&mut event);
        self.apply_defaults(&mut event);
        self.transform(&mut event)
            .map_err(|e| ValidationError::new("transform", "n/a", e.to_string()))?;
        self.validate(&event)?;
        Ok(event)
    }

    /// For each (source, canonical) mapping: if the canonical slot is
    /// empty and source is present, move the value over and remove the
    /// source key.
    fn map_fields(&self, event: &mut Event) {
        for mapping in &self.rules.mappings {
            if !event.is_field_empty(&mapping.canonical) {
                continue;
            }
            if let Some(value) = event.take_field_str(&mapping.source) {
                event.set_field_str(&mapping.canonical, value);
            }
        }
    }

    /// Populates each canonical field with its configured default, only
    /// if still empty.
    fn apply_defaults(&self, event: &mut Event) {
        for (field, default) in &self.rules.defaults {
            if event.is_field_empty(field) {
                event.set_field_str(field, default.clone());
            }
        }
    }

    fn transform(&self, event: &mut Event) -> Result<(), TransformError> {
        for rule in &self.rules.transforms {
            match rule.kind {
                TransformKind::Normalize => {
                    let func = rule
                        .function
                        .as_deref()
                        .ok_or_else(|| TransformError::BadRule("normalize missing function".into()))?;
                    if let Some(current) = event.field_as_str(&rule.field) {
                        let normalized = match func {
                            "lowercase" => current.to_lowercase(),
                            "uppercase" => current.to_uppercase(),
                            "trim" => current.trim().to_string(),
                            other => return Err(TransformError::UnknownFunction(other.to_string())),
                        };
                        event.set_field_str(&rule.field, normalized);
                    }
                }
                TransformKind::Extract => {
                    let pattern = rule
                        .pattern
                        .as_deref()
                        .ok_or_else(|| TransformError::BadRule("extract missing pattern".into()))?;
                    let target = rule
                        .target
                        .as_deref()
                        .ok_or_else(|| TransformError::BadRule("extract missing target".into()))?;
                    let re = Regex::new(pattern)
                        .map_err(|e| TransformError::BadRule(format!("invalid extract pattern: {e}")))?;
                    if let Some(source) = event.field_as_str(&rule.field) {
                        if let Some(caps) = re.captures(&source) {
                            if let Some(group1) = caps.get(1) {
                                event.set_field_str(target, group1.as_str().to_string());
                            }
                        }
                    }
                }
                TransformKind::Enrich => {
                    let value = match rule.function.as_deref() {
                        Some("now") => Utc::now().to_rfc3339(),
                        Some(stripped) if stripped.starts_with("env:") => {
                            std::env::var(&stripped[4..]).unwrap_or_default()
                        }
                        Some(constant) => constant.to_string(),
                        None => return Err(TransformError::BadRule("enrich missing function/value".into())),
                    };
                    event.set_field_str(&rule.field, value);
                }
                TransformKind::Filter => {
                    // Reserved; no-op, must not fail.
                }
            }
        }
        Ok(())
    }

    fn validate(&self, event: &Event) -> Result<(), ValidationError> {
        for field in &self.rules.required_fields {
            if event.is_field_empty(field) {
                return Err(ValidationError::new("required", field, "field is required"));
            }
        }

        for rule in &self.rules.validations {
            match rule.kind {
                ValidationKind::Required => {
                    if event.is_field_empty(&rule.field) {
                        return Err(ValidationError::new("required", &rule.field, "field is required"));
                    }
                    if let Some(value) = event.field_as_str(&rule.field) {
                        if let Some(min) = rule.min_length {
                            if value.len() < min {
                                return Err(ValidationError::new(
                                    "required",
                                    &rule.field,
                                    format!("shorter than minimum length {min}"),
                                ));
                            }
                        }
                        if let Some(max) = rule.max_length {
                            if value.len() > max {
                                return Err(ValidationError::new(
                                    "required",
                                    &rule.field,
                                    format!("longer than maximum length {max}"),
                                ));
                            }
                        }
                    }
                }
                ValidationKind::Regex => {
                    let pattern = rule.pattern.as_deref().unwrap_or("");
                    let re = Regex::new(pattern)
                        .map_err(|e| ValidationError::new("regex", &rule.field, format!("bad pattern: {e}")))?;
                    let value = event.field_as_str(&rule.field).unwrap_or_default();
                    if !re.is_match(&value) {
                        return Err(ValidationError::new(
                            "regex",
                            &rule.field,
                            format!("'{value}' does not match {pattern}"),
                        ));
                    }
                }
                ValidationKind::Range => {
                    let value = event.field_as_str(&rule.field).unwrap_or_default();
                    let len = value.len();
                    if let Some(min) = rule.min_length {
                        if len < min {
                            return Err(ValidationError::new("range", &rule.field, "below minimum length"));
                        }
                    }
                    if let Some(max) = rule.max_length {
                        if len > max {
                            return Err(ValidationError::new("range", &rule.field, "above maximum length"));
                        }
                    }
                }
                ValidationKind::Enum => {
                    let allowed = rule.allowed_values.as_deref().unwrap_or(&[]);
                    let value = event.field_as_str(&rule.field).unwrap_or_default();
                    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&value)) {
                        return Err(ValidationError::new(
                            "enum",
                            &rule.field,
                            format!("'{value}' not in {allowed:?}"),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::model::{FieldMapping, TransformRule};

    fn base_event() -> Event {
        let mut e = Event::empty();
        e.message = "boot ok".into();
        e.service = "svc-1".into();
        e.level = "INFO".into();
        e
    }

    #[test]
    fn composition_order_mapping_before_defaults_before_transforms() {
        let mut rules = RuleSet::default_strict();
        rules.mappings.push(FieldMapping {
            source: "src_level".into(),
            canonical: "level".into(),
        });
        rules.defaults.insert("service".into(), "unknown".into());
        rules.transforms.push(TransformRule {
            kind: TransformKind::Normalize,
            field: "level".into(),
            function: Some("lowercase".into()),
            pattern: None,
            target: None,
        });

        let mut event = Event::empty();
        event.message = "hi".into();
        event.attributes.insert("src_level".into(), "ERROR".into());

        let engine = RuleEngine::new(rules);
        let out = engine.apply(event).unwrap();
        assert_eq!(out.level, "error");
        assert_eq!(out.service, "unknown");
    }

    #[test]
    fn validation_runs_last_and_rejects_bad_service() {
        let rules = RuleSet::default_strict();
        let mut event = base_event();
        event.service = "bad service!".into();
        let engine = RuleEngine::new(rules);
        let err = engine.apply(event).unwrap_err();
        assert_eq!(err.field, "service");
    }

    #[test]
    fn no_revalidation_after_transforms() {
        // A transform can push a field back out of validity; the spec
        // preserves source behavior of not re-checking afterward.
        let mut rules = RuleSet::default_strict();
        rules.transforms.push(TransformRule {
            kind: TransformKind::Normalize,
            field: "service".into(),
            function: Some("uppercase".into()),
            pattern: None,
            target: None,
        });
        // uppercase keeps it matching `[A-Za-z0-9_-]+`, so use an enrich
        // that writes an invalid value straight into attributes instead
        // to prove transforms are not re-validated.
        rules.transforms.push(TransformRule {
            kind: TransformKind::Enrich,
            field: "env_tag".into(),
            function: Some("prod!!".into()),
            pattern: None,
            target: None,
        });
        let event = base_event();
        let engine = RuleEngine::new(rules);
        let out = engine.apply(event).unwrap();
        assert_eq!(out.attributes["env_tag"].as_scalar_str().unwrap(), "prod!!");
    }

    #[test]
    fn extract_transform_writes_capture_group_one() {
        let mut rules = RuleSet::default_strict();
        rules.transforms.push(TransformRule {
            kind: TransformKind::Extract,
            field: "message".into(),
            function: None,
            pattern: Some(r"user=(\w+)".into()),
            target: Some("user".into()),
        });
        let mut event = base_event();
        event.message = "login user=alice succeeded".into();
        let engine = RuleEngine::new(rules);
        let out = engine.apply(event).unwrap();
        assert_eq!(out.attributes["user"].as_scalar_str().unwrap(), "alice");
    }

    #[test]
    fn unknown_transform_function_is_an_error() {
        let mut rules = RuleSet::default_strict();
        rules.transforms.push(TransformRule {
            kind: TransformKind::Normalize,
            field: "service".into(),
            function: Some("reverse".into()),
            pattern: None,
            target: None,
        });
        let event = base_event();
        let engine = RuleEngine::new(rules);
        assert!(engine.apply(event).is_err());
    }
}
