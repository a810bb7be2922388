use axum::response::Response;
use thiserror::Error;

use crate::{
    application::gateway::GatewayError, cache::CacheError, config::LoadError,
    infra::error::InfraError,
};

/// Diagnostic attached to error responses and emitted by the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failure returned from a CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("request rejected: {0}")]
    Gateway(#[from] GatewayError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Gateway(_) => 2,
            AppError::Config(_) => 78,
            AppError::Infra(_) | AppError::Cache(_) | AppError::Unexpected(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn attached_report_travels_in_extensions() {
        let mut response = Response::new(axum::body::Body::empty());
        ErrorReport::from_message("test", "upstream said no").attach(&mut response);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "test");
        assert_eq!(report.messages, vec!["upstream said no".to_string()]);
    }

    #[test]
    fn bad_requests_exit_with_usage_code() {
        let err = AppError::from(GatewayError::BadRequest(DomainError::missing("icao24")));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "request rejected: Missing icao24");
    }
}
