//! Outbound HTTP seam.
//!
//! The gateway describes each upstream interaction as an [`UpstreamCall`]
//! and hands it to an [`UpstreamTransport`]; the production implementation
//! lives in `infra::upstream`.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Authentication attached to an outbound request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum CallMethod {
    Get,
    /// `application/x-www-form-urlencoded` POST with the given fields.
    PostForm(Vec<(String, String)>),
}

impl fmt::Debug for CallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMethod::Get => f.write_str("Get"),
            // Form bodies carry client secrets.
            CallMethod::PostForm(fields) => {
                let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
                f.debug_tuple("PostForm").field(&names).finish()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub method: CallMethod,
    pub url: Url,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl UpstreamCall {
    pub fn get(url: Url, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            method: CallMethod::Get,
            url,
            credentials,
            timeout,
        }
    }

    pub fn post_form(url: Url, fields: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            method: CallMethod::PostForm(fields),
            url,
            credentials: Credentials::Anonymous,
            timeout,
        }
    }
}

/// Raw upstream answer, before normalization.
#[derive(Debug, Clone, Default)]
pub struct UpstreamReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl UpstreamReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header named `name`, compared case-insensitively and trimmed.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }
}

/// The request never produced an HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, call: UpstreamCall) -> Result<UpstreamReply, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let reply = UpstreamReply::new(200, "{}").with_header("X-Rate-Limit-Remaining", " 397 ");
        assert_eq!(reply.header("x-rate-limit-remaining"), Some("397"));
        assert_eq!(reply.header("retry-after"), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let basic = Credentials::Basic {
            username: "pilot".into(),
            password: "hunter2".into(),
        };
        let bearer = Credentials::Bearer("tok-123".into());
        let form = CallMethod::PostForm(vec![("client_secret".into(), "s3cret".into())]);

        let rendered = format!("{basic:?} {bearer:?} {form:?}");
        assert!(rendered.contains("pilot"));
        assert!(rendered.contains("client_secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("s3cret"));
    }
}
