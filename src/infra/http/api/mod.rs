pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{Router, middleware as axum_middleware, routing::get};

pub fn build_api_router(state: ApiState) -> Router {
    let rate_state = state.clone();

    Router::new()
        .route("/api", get(handlers::dispatch_query))
        .route("/api/{action}", get(handlers::dispatch_path))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
        .route("/healthz", get(handlers::health))
        .with_state(state)
}
