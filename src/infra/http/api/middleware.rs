use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use tracing::debug;

use super::error::ApiError;
use super::rate_limit::Admission;
use super::state::ApiState;

const ANONYMOUS_CLIENT: &str = "anonymous";

/// Identity used for rate limiting, attached to the request and response for logging.
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match state.rate_limiter.check(&client) {
        Admission::Allowed { remaining } => {
            debug!(target = "wayfarer::api::ratelimit", client = %client, remaining);
        }
        Admission::Limited { retry_after_secs } => {
            counter!("wayfarer_inbound_rate_limited_total").increment(1);
            let mut response = ApiError::rate_limited(retry_after_secs);
            response.extensions_mut().insert(ClientKey(client));
            return response;
        }
    }

    request.extensions_mut().insert(ClientKey(client.clone()));
    let mut response = next.run(request).await;
    response.extensions_mut().insert(ClientKey(client));
    response
}

fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}
