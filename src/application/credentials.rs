//! Credential resolution for the flight-data provider.
//!
//! OAuth2 client credentials take precedence, then HTTP basic credentials,
//! then anonymous access. Bearer tokens are kept in the shared cache store
//! under a key derived from the client id and reused until they expire.

use std::{fmt, sync::Arc, time::Duration};

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use wayfarer_api_types::AuthMode;

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::util::clock::Clock;

use super::transport::{Credentials, TransportError, UpstreamCall, UpstreamTransport};

const SOURCE: &str = "application::credentials";
const DEFAULT_EXPIRES_IN_SECS: i64 = 1800;
const EXPIRY_MARGIN_SECS: i64 = 30;
const MIN_LIFETIME_SECS: i64 = 60;
/// Token entries are read regardless of age; `expires_at` decides validity.
const TOKEN_LOOKUP_AGE: Duration = Duration::from_secs(u64::MAX);

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub oauth: Option<ClientCredentials>,
    pub basic: Option<BasicCredentials>,
    pub token_url: Url,
    pub token_timeout: Duration,
}

/// Cached bearer token; `expires_at` already includes the safety margin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub expires_at: i64,
}

impl AuthToken {
    pub fn from_grant(grant: TokenGrant, issued_at: i64) -> Self {
        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let lifetime = (expires_in - EXPIRY_MARGIN_SECS).max(MIN_LIFETIME_SECS);
        Self {
            access_token: grant.access_token,
            expires_at: issued_at.saturating_add(lifetime),
        }
    }

    /// Usable through `expires_at` inclusive, matching cache freshness.
    pub fn is_usable(&self, now: i64) -> bool {
        now <= self.expires_at
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("token endpoint answered HTTP {status}")]
    Rejected { status: u16 },
    #[error("token response was not understood: {0}")]
    Malformed(String),
}

pub struct CredentialResolver {
    config: CredentialConfig,
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn UpstreamTransport>,
    clock: Arc<dyn Clock>,
}

impl CredentialResolver {
    pub fn new(
        config: CredentialConfig,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn UpstreamTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            clock,
        }
    }

    /// The strongest mode that configuration allows.
    pub fn mode(&self) -> AuthMode {
        if self.config.oauth.is_some() {
            AuthMode::OAuth2
        } else if self.config.basic.is_some() {
            AuthMode::Basic
        } else {
            AuthMode::Anonymous
        }
    }

    /// Credentials for the next flight-data request.
    ///
    /// A failed token exchange degrades to basic or anonymous access rather
    /// than failing the request.
    pub async fn resolve(&self) -> Credentials {
        if let Some(oauth) = self.config.oauth.as_ref() {
            match self.bearer_token(oauth).await {
                Ok(token) => return Credentials::Bearer(token),
                Err(err) => {
                    counter!("wayfarer_token_exchange_total", "result" => "failed").increment(1);
                    warn!(
                        target = SOURCE,
                        op = "resolve",
                        result = "token_unavailable",
                        error = %err,
                        fallback = if self.config.basic.is_some() { "basic" } else { "anonymous" },
                        "OAuth token exchange failed"
                    );
                }
            }
        }

        match self.config.basic.as_ref() {
            Some(basic) => Credentials::Basic {
                username: basic.username.clone(),
                password: basic.password.clone(),
            },
            None => Credentials::Anonymous,
        }
    }

    async fn bearer_token(&self, oauth: &ClientCredentials) -> Result<String, TokenError> {
        let key = CacheKey::for_token(&oauth.client_id);
        let now = self.clock.now();

        if let Some(token) = self.cached_token(&key) {
            if token.is_usable(now) {
                counter!("wayfarer_token_exchange_total", "result" => "reused").increment(1);
                return Ok(token.access_token);
            }
            debug!(target = SOURCE, op = "bearer_token", expires_at = token.expires_at, now, "Cached token expired");
        }

        let token = self.exchange(oauth).await?;
        counter!("wayfarer_token_exchange_total", "result" => "issued").increment(1);

        match serde_json::to_value(&token) {
            Ok(payload) => {
                if let Err(err) = self.store.set(CacheEntry::new(&key, now, payload)) {
                    warn!(target = SOURCE, op = "store_token", error = %err, "Failed to cache OAuth token");
                }
            }
            Err(err) => {
                warn!(target = SOURCE, op = "store_token", error = %err, "Failed to encode OAuth token");
            }
        }

        Ok(token.access_token)
    }

    fn cached_token(&self, key: &CacheKey) -> Option<AuthToken> {
        let entry = match self.store.get(key, TOKEN_LOOKUP_AGE) {
            Ok(entry) => entry?,
            Err(err) => {
                warn!(target = SOURCE, op = "cached_token", key = %key, error = %err, "Unreadable token entry");
                return None;
            }
        };
        match serde_json::from_value(entry.payload) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(target = SOURCE, op = "cached_token", key = %key, error = %err, "Malformed token entry");
                None
            }
        }
    }

    async fn exchange(&self, oauth: &ClientCredentials) -> Result<AuthToken, TokenError> {
        let fields = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), oauth.client_id.clone()),
            ("client_secret".to_string(), oauth.client_secret.clone()),
        ];
        let call = UpstreamCall::post_form(
            self.config.token_url.clone(),
            fields,
            self.config.token_timeout,
        );

        let reply = self.transport.send(call).await?;
        if reply.status >= 400 {
            return Err(TokenError::Rejected {
                status: reply.status,
            });
        }

        let grant: TokenGrant = serde_json::from_str(&reply.body)
            .map_err(|err| TokenError::Malformed(err.to_string()))?;
        if grant.access_token.trim().is_empty() {
            return Err(TokenError::Malformed("empty access_token".to_string()));
        }

        Ok(AuthToken::from_grant(grant, self.clock.now()))
    }
}
