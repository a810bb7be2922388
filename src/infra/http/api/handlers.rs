use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use wayfarer_api_types::{AuthStatus, NormalizedResponse};

use crate::application::error::ErrorReport;
use crate::application::gateway::GatewayError;
use crate::domain::{EndpointId, QueryParams};

use super::error::ApiError;
use super::state::ApiState;

const ACTION_PARAM: &str = "action";
const AUTH_STATUS_ACTION: &str = "auth_status";

/// `GET /api?action=<name>&...`
pub async fn dispatch_query(
    State(state): State<ApiState>,
    Query(mut params): Query<QueryParams>,
) -> Response {
    let action = params.remove(ACTION_PARAM);
    dispatch(&state, action.as_deref(), &params).await
}

/// `GET /api/{action}?...`
pub async fn dispatch_path(
    State(state): State<ApiState>,
    Path(action): Path<String>,
    Query(mut params): Query<QueryParams>,
) -> Response {
    params.remove(ACTION_PARAM);
    dispatch(&state, Some(action.as_str()), &params).await
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn dispatch(state: &ApiState, action: Option<&str>, params: &QueryParams) -> Response {
    let Some(action) = action.map(str::trim).filter(|action| !action.is_empty()) else {
        return ApiError::missing_action().into_response();
    };

    if action == AUTH_STATUS_ACTION {
        let status = AuthStatus {
            ok: true,
            mode: state.gateway.auth_mode(),
        };
        return Json(status).into_response();
    }

    let endpoint = match action.parse::<EndpointId>() {
        Ok(endpoint) => endpoint,
        Err(err) => return ApiError::from(GatewayError::from(err)).into_response(),
    };

    let ttl = state.gateway.ttl_for(endpoint);
    match state.gateway.fetch_endpoint(endpoint, params, ttl).await {
        Ok(response) => envelope_response(endpoint, response),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// 200 for successful envelopes, 502 for upstream or transport failures.
fn envelope_response(endpoint: EndpointId, envelope: NormalizedResponse) -> Response {
    if envelope.ok() {
        return Json(envelope).into_response();
    }

    let retry_after = envelope.rate().and_then(|rate| rate.retry_after_seconds);
    let detail = format!(
        "{endpoint}: {} (upstream status {})",
        envelope.error().unwrap_or_default(),
        envelope.status()
    );

    let mut response = (StatusCode::BAD_GATEWAY, Json(envelope)).into_response();
    if let Some(value) = retry_after.and_then(|secs| HeaderValue::from_str(&secs.to_string()).ok())
    {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    ErrorReport::from_message("infra::http::api::handlers", detail)
        .attach(&mut response);
    response
}
