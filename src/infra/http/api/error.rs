use crate::application::error::ErrorReport;
use crate::application::gateway::GatewayError;
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use wayfarer_api_types::{NormalizedResponse, RateLimitInfo, RejectionBody};

const SOURCE: &str = "infra::http::api";

/// A request rejected before reaching the gateway's cache or upstreams.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn missing_action() -> Self {
        Self::bad_request("Missing action")
    }

    /// 429 with a `Retry-After` header and a response envelope.
    pub fn rate_limited(retry_after: u64) -> Response {
        let body = NormalizedResponse::failure(
            StatusCode::TOO_MANY_REQUESTS.as_u16(),
            format!("Rate limit reached. Retry after {retry_after}s."),
            Some(RateLimitInfo {
                remaining: Some(0),
                retry_after_seconds: Some(retry_after),
            }),
        );
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::api::rate_limit",
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::BadRequest(err) => Self::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = RejectionBody::new(self.message.clone());
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(SOURCE, self.message).attach(&mut response);
        response
    }
}
