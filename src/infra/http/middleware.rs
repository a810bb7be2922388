use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::api::middleware::ClientKey;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse a caller-supplied request id when it is short and printable,
/// otherwise mint one. The id is echoed back and scoped onto a span.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let span = info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let client = response
        .extensions()
        .get::<ClientKey>()
        .map(|ClientKey(client)| client.clone())
        .unwrap_or_default();

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "wayfarer::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            client = %client,
            "request served"
        );
        return response;
    }

    let (source, detail) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (
            report.source,
            report.messages.into_iter().next().unwrap_or_default(),
        ),
        None => ("unknown", String::new()),
    };

    if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
        error!(
            target = "wayfarer::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            client = %client,
            source,
            detail = %detail,
            "request failed"
        );
    } else {
        // 502 carries an upstream failure, not a gateway fault.
        warn!(
            target = "wayfarer::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            client = %client,
            source,
            detail = %detail,
            "request rejected or upstream failed"
        );
    }

    response
}
