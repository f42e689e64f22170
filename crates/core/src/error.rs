//! Error taxonomy for the parsing/rule/batch pipeline (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no suitable parser for input")]
    NoSuitableParser,

    #[error("input exceeds max size: {0} bytes")]
    TooLarge(usize),

    #[error("invalid UTF-8 content")]
    NonUtf8,

    #[error("parse failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
#[error("validation failed: rule={rule} field={field} detail={detail}")]
pub struct ValidationError {
    pub rule: String,
    pub field: String,
    pub detail: String,
}

impl ValidationError {
    pub fn new(rule: impl Into<String>, field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            field: field.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unknown transform kind: {0}")]
    UnknownKind(String),

    #[error("unknown transform function: {0}")]
    UnknownFunction(String),

    #[error("bad transform rule configuration: {0}")]
    BadRule(String),
}

/// Storage errors are all treated as transient and retried, per spec §9
/// (the spec notes but does not legislate a permanent/transient split).
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

impl StorageError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
