use std::sync::Arc;

use crate::application::gateway::Gateway;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<Gateway>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}

impl ApiState {
    pub fn new(gateway: Arc<Gateway>, rate_limiter: ApiRateLimiter) -> Self {
        Self {
            gateway,
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}
