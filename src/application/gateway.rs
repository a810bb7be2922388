//! Proxy cache gateway.
//!
//! `fetch` validates a logical request, answers from the cache while the
//! entry is younger than the caller's TTL, and otherwise performs exactly one
//! upstream call whose normalized outcome (success or failure) is cached.

use std::{sync::Arc, time::Duration, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use wayfarer_api_types::{AuthMode, NormalizedResponse};

use crate::cache::{CacheEntry, CacheKey, CacheStore, TtlPolicy};
use crate::domain::{DomainError, EndpointId, Provider, QueryParams, UpstreamRequest};
use crate::util::clock::Clock;

use super::credentials::CredentialResolver;
use super::normalize::normalize;
use super::transport::{Credentials, TransportError, UpstreamCall, UpstreamTransport};

const SOURCE: &str = "application::gateway";

/// Base URL for every upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    pub opensky: Url,
    pub frankfurter: Url,
    pub rest_countries: Url,
    pub world_time: Url,
    pub nager_date: Url,
    pub open_meteo: Url,
}

impl UpstreamEndpoints {
    pub fn base(&self, provider: Provider) -> &Url {
        match provider {
            Provider::OpenSky => &self.opensky,
            Provider::Frankfurter => &self.frankfurter,
            Provider::RestCountries => &self.rest_countries,
            Provider::WorldTime => &self.world_time,
            Provider::NagerDate => &self.nager_date,
            Provider::OpenMeteo => &self.open_meteo,
        }
    }

    /// `<base>/<path>?<query>` with exactly one slash at the join.
    pub fn url_for(&self, request: &UpstreamRequest) -> Result<Url, url::ParseError> {
        let base = self.base(request.provider()).as_str().trim_end_matches('/');
        let path = request.path().trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;

        let pairs: Vec<(&str, &str)> = request.query().collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Rejected before any cache or upstream interaction.
    #[error(transparent)]
    BadRequest(#[from] DomainError),
}

pub struct Gateway {
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn UpstreamTransport>,
    credentials: CredentialResolver,
    clock: Arc<dyn Clock>,
    endpoints: UpstreamEndpoints,
    ttl: TtlPolicy,
    request_timeout: Duration,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn UpstreamTransport>,
        credentials: CredentialResolver,
        clock: Arc<dyn Clock>,
        endpoints: UpstreamEndpoints,
        ttl: TtlPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            credentials,
            clock,
            endpoints,
            ttl,
            request_timeout,
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.credentials.mode()
    }

    /// Configured TTL for the class `endpoint` belongs to.
    pub fn ttl_for(&self, endpoint: EndpointId) -> Duration {
        self.ttl.for_endpoint(endpoint)
    }

    /// Resolve `action` by name and fetch it with an explicit TTL.
    pub async fn fetch(
        &self,
        action: &str,
        params: &QueryParams,
        ttl_seconds: u64,
    ) -> Result<NormalizedResponse, GatewayError> {
        let endpoint: EndpointId = action.parse()?;
        self.fetch_endpoint(endpoint, params, Duration::from_secs(ttl_seconds))
            .await
    }

    pub async fn fetch_endpoint(
        &self,
        endpoint: EndpointId,
        params: &QueryParams,
        ttl: Duration,
    ) -> Result<NormalizedResponse, GatewayError> {
        if ttl.is_zero() {
            return Err(DomainError::invalid("ttl", "must be greater than zero").into());
        }
        let request = UpstreamRequest::build(endpoint, params, self.clock.now())?;
        let key = CacheKey::for_request(&request);

        if let Some(cached) = self.lookup(&key, ttl) {
            counter!("wayfarer_cache_hit_total", "endpoint" => endpoint.as_str()).increment(1);
            debug!(target = SOURCE, op = "fetch", endpoint = %endpoint, key = %key, result = "hit");
            return Ok(cached);
        }
        counter!("wayfarer_cache_miss_total", "endpoint" => endpoint.as_str()).increment(1);

        let response = self.call_upstream(&request).await;
        self.store_response(&key, &response);
        Ok(response)
    }

    fn lookup(&self, key: &CacheKey, ttl: Duration) -> Option<NormalizedResponse> {
        let entry = match self.store.get(key, ttl) {
            Ok(entry) => entry?,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "lookup",
                    backend = self.store.backend_name(),
                    key = %key,
                    error = %err,
                    "Unreadable cache entry treated as miss"
                );
                return None;
            }
        };
        match serde_json::from_value(entry.payload) {
            Ok(response) => Some(response),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "lookup",
                    key = %key,
                    error = %err,
                    "Cached payload is not a response envelope; treated as miss"
                );
                None
            }
        }
    }

    async fn call_upstream(&self, request: &UpstreamRequest) -> NormalizedResponse {
        let endpoint = request.endpoint();
        let credentials = if request.provider().uses_credentials() {
            self.credentials.resolve().await
        } else {
            Credentials::Anonymous
        };

        let started = Instant::now();
        let outcome = match self.endpoints.url_for(request) {
            Ok(url) => {
                let call = UpstreamCall::get(url, credentials, self.request_timeout);
                self.transport.send(call).await
            }
            Err(err) => Err(TransportError::Other(format!("invalid upstream url: {err}"))),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let response = normalize(outcome);
        let kind = response.kind();
        counter!(
            "wayfarer_upstream_request_total",
            "endpoint" => endpoint.as_str(),
            "outcome" => kind.as_str()
        )
        .increment(1);
        histogram!("wayfarer_upstream_latency_ms", "endpoint" => endpoint.as_str())
            .record(elapsed_ms);

        if response.ok() {
            info!(
                target = SOURCE,
                op = "fetch",
                endpoint = %endpoint,
                provider = request.provider().as_str(),
                status = response.status(),
                elapsed_ms,
                result = kind.as_str(),
                "Upstream call completed"
            );
        } else {
            warn!(
                target = SOURCE,
                op = "fetch",
                endpoint = %endpoint,
                provider = request.provider().as_str(),
                status = response.status(),
                elapsed_ms,
                result = kind.as_str(),
                error = response.error().unwrap_or_default(),
                "Upstream call failed"
            );
        }
        response
    }

    fn store_response(&self, key: &CacheKey, response: &NormalizedResponse) {
        let payload = match serde_json::to_value(response) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target = SOURCE, op = "store", key = %key, error = %err, "Failed to encode response");
                return;
            }
        };
        let entry = CacheEntry::new(key, self.clock.now(), payload);
        if let Err(err) = self.store.set(entry) {
            warn!(
                target = SOURCE,
                op = "store",
                backend = self.store.backend_name(),
                key = %key,
                error = %err,
                "Failed to write cache entry"
            );
        }
    }
}
