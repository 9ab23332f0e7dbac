use serde::Serialize;
use thiserror::Error;

/// A single rejected input field, named as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid submission: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid role. Must be 'user' or 'admin'")]
    InvalidRole(String),

    #[error("Invalid period. Must be 'month' or 'all'")]
    InvalidPeriod(String),
}

/// `field: message` pairs joined with `; `.
pub fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
