use std::sync::Arc;

use tracing::info;

use crate::application::credentials::{CredentialConfig, CredentialResolver};
use crate::application::gateway::Gateway;
use crate::application::transport::UpstreamTransport;
use crate::cache::{self, CacheConfig, CacheError, CacheStore};
use crate::config::Settings;
use crate::util::clock::{Clock, SystemClock};

use super::error::InfraError;
use super::upstream::ReqwestTransport;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Open the configured cache store with the system clock.
pub fn open_cache(settings: &Settings) -> Result<Arc<dyn CacheStore>, CacheError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    cache::open_store(&CacheConfig::from(&settings.cache), clock)
}

/// Wire a gateway against the real network.
pub fn build_gateway(settings: &Settings) -> Result<Gateway, BootstrapError> {
    let user_agent = settings
        .upstream
        .user_agent
        .as_deref()
        .unwrap_or(ReqwestTransport::default_user_agent());
    let transport: Arc<dyn UpstreamTransport> = Arc::new(ReqwestTransport::new(
        user_agent,
        settings.upstream.connect_timeout,
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = cache::open_store(&CacheConfig::from(&settings.cache), clock.clone())?;
    Ok(assemble_gateway(settings, store, transport, clock))
}

/// Wire a gateway from explicit collaborators.
pub fn assemble_gateway(
    settings: &Settings,
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn UpstreamTransport>,
    clock: Arc<dyn Clock>,
) -> Gateway {
    let credentials = CredentialResolver::new(
        CredentialConfig {
            oauth: settings.credentials.oauth.clone(),
            basic: settings.credentials.basic.clone(),
            token_url: settings.upstream.token_url.clone(),
            token_timeout: settings.upstream.token_timeout,
        },
        store.clone(),
        transport.clone(),
        clock.clone(),
    );

    let gateway = Gateway::new(
        store.clone(),
        transport,
        credentials,
        clock,
        settings.upstream.endpoints.clone(),
        settings.cache.ttl,
        settings.upstream.request_timeout,
    );

    info!(
        target = "wayfarer::bootstrap",
        cache_backend = store.backend_name(),
        auth_mode = gateway.auth_mode().as_str(),
        "Gateway ready"
    );
    gateway
}
