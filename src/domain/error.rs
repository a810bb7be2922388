use thiserror::Error;

/// Caller-contract violations detected before any upstream interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Unknown action")]
    UnknownEndpoint { name: String },
    #[error("Missing {label}")]
    MissingParameter { label: &'static str },
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

impl DomainError {
    pub fn unknown_endpoint(name: impl Into<String>) -> Self {
        Self::UnknownEndpoint { name: name.into() }
    }

    pub fn missing(label: &'static str) -> Self {
        Self::MissingParameter { label }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}
