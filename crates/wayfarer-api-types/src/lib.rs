//! Response envelope types shared by the Wayfarer gateway and its clients.
//!
//! Every proxied call answers with a [`NormalizedResponse`] serialized as
//! `{ok, status, data|error, rate?}` so that callers can branch on `ok`
//! uniformly regardless of which upstream produced the payload.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Normalized outcome of one upstream call, success or failure.
///
/// Exactly one of `data` and `error` is present, selected by `ok`. The
/// constructors are the only way to build a value, which keeps that pairing
/// intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    ok: bool,
    status: u16,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate: Option<RateLimitInfo>,
}

impl NormalizedResponse {
    pub fn success(status: u16, data: Value, rate: Option<RateLimitInfo>) -> Self {
        Self {
            ok: true,
            status,
            data: Some(data),
            error: None,
            rate,
        }
    }

    pub fn failure(status: u16, message: impl Into<String>, rate: Option<RateLimitInfo>) -> Self {
        Self {
            ok: false,
            status,
            data: None,
            error: Some(message.into()),
            rate,
        }
    }

    /// Failure that never reached an HTTP status line.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::failure(0, message, None)
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Decoded upstream payload; `None` for failures.
    pub fn data(&self) -> Option<&Value> {
        if self.ok { self.data.as_ref() } else { None }
    }

    /// Failure description; `None` for successes.
    pub fn error(&self) -> Option<&str> {
        if self.ok { None } else { self.error.as_deref() }
    }

    pub fn rate(&self) -> Option<&RateLimitInfo> {
        self.rate.as_ref()
    }

    pub fn kind(&self) -> ResponseKind {
        match (self.ok, self.status) {
            (true, _) => ResponseKind::Success,
            (false, 0) => ResponseKind::TransportError,
            (false, 429) => ResponseKind::RateLimited,
            (false, _) => ResponseKind::UpstreamError,
        }
    }
}

// A present `null` must come back as `Some(Value::Null)` so cached success
// envelopes with an empty body reconstruct verbatim.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Classification of a [`NormalizedResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Success,
    TransportError,
    RateLimited,
    UpstreamError,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Success => "success",
            ResponseKind::TransportError => "transport_error",
            ResponseKind::RateLimited => "rate_limited",
            ResponseKind::UpstreamError => "upstream_error",
        }
    }
}

/// Rate-limit hints reported by the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Which upstream authentication the gateway will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[serde(rename = "oauth2")]
    OAuth2,
    Basic,
    Anonymous,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::OAuth2 => "oauth2",
            AuthMode::Basic => "basic",
            AuthMode::Anonymous => "anonymous",
        }
    }
}

/// Body of the `auth_status` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub ok: bool,
    pub mode: AuthMode,
}

/// Body returned when a request is rejected before reaching any upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBody {
    pub ok: bool,
    pub error: String,
}

impl RejectionBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
