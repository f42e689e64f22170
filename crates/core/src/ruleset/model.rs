//! Declarative rule-set configuration: field constraints, validation
//! rules, mappings, defaults, and transforms (spec §3, §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldConstraint {
    pub field: String,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Required,
    Regex,
    Range,
    Enum,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationRule {
    pub kind: ValidationKind,
    pub field: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldMapping {
    pub source: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Normalize,
    Extract,
    Enrich,
    Filter,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformRule {
    pub kind: TransformKind,
    /// For `normalize`: the field to transform in place.
    /// For `extract`: the source field to read the pattern from.
    /// For `enrich`: the target attribute to write.
    pub field: String,
    /// `normalize`: one of `lowercase` | `uppercase` | `trim`.
    /// `enrich`: one of `now` | `env:<name>` | a literal constant.
    #[serde(default)]
    pub function: Option<String>,
    /// `extract`: the regex pattern whose capture group 1 is extracted.
    #[serde(default)]
    pub pattern: Option<String>,
    /// `extract`: the canonical field/attribute written with the capture.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleSet {
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub field_constraints: Vec<FieldConstraint>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    #[serde(default)]
    pub transforms: Vec<TransformRule>,
}

impl RuleSet {
    /// The rule set spec.md's invariants imply as a sane starting point:
    /// severity/message/service required and pattern-checked.
    pub fn default_strict() -> Self {
        Self {
            required_fields: vec!["message".into(), "service".into(), "level".into()],
            field_constraints: vec![],
            validations: vec![
                ValidationRule {
                    kind: ValidationKind::Required,
                    field: "message".into(),
                    pattern: None,
                    allowed_values: None,
                    min_length: Some(1),
                    max_length: Some(10_000),
                },
                ValidationRule {
                    kind: ValidationKind::Enum,
                    field: "level".into(),
                    pattern: None,
                    allowed_values: Some(
                        ["debug", "info", "warn", "error", "fatal", "trace"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    ),
                    min_length: None,
                    max_length: None,
                },
                ValidationRule {
                    kind: ValidationKind::Regex,
                    field: "service".into(),
                    pattern: Some(r"^[A-Za-z0-9_-]{1,100}$".into()),
                    allowed_values: None,
                    min_length: None,
                    max_length: None,
                },
            ],
            mappings: vec![],
            defaults: HashMap::new(),
            transforms: vec![],
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
