use thiserror::Error;

/// Rule violations raised while building domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Input the caller can fix; `field` names the offending attribute.
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// Stored data that breaks a rule the schema should have enforced.
    #[error("invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
