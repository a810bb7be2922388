//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::credentials::{BasicCredentials, ClientCredentials};
use crate::application::gateway::UpstreamEndpoints;
use crate::cache::{CacheBackend, TtlPolicy};

pub use cli::{
    CacheOverrides, CliArgs, Command, FetchArgs, LoggingOverrides, PruneCacheArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "wayfarer";
const ENV_PREFIX: &str = "WAYFARER";
const LEGACY_ENV_PREFIX: &str = "OPENSKY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 120;

const DEFAULT_OPENSKY_URL: &str = "https://opensky-network.org/api";
const DEFAULT_FRANKFURTER_URL: &str = "https://api.frankfurter.app";
const DEFAULT_REST_COUNTRIES_URL: &str = "https://restcountries.com";
const DEFAULT_WORLD_TIME_URL: &str = "https://worldtimeapi.org";
const DEFAULT_NAGER_DATE_URL: &str = "https://date.nager.at";
const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com";
const DEFAULT_TOKEN_URL: &str =
    "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub upstream: UpstreamSettings,
    pub credentials: CredentialSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub ttl: TtlPolicy,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub request_timeout: Duration,
    pub token_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
    pub endpoints: UpstreamEndpoints,
    pub token_url: Url,
}

/// Flight-data credentials; secrets never appear in `Debug` output.
#[derive(Debug, Clone, Default)]
pub struct CredentialSettings {
    pub oauth: Option<ClientCredentials>,
    pub basic: Option<BasicCredentials>,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.credentials.fill_from(load_legacy_credentials()?);

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Fetch(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_cache_overrides(&args.cache);
        }
        Some(Command::PruneCache(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_cache_overrides(&args.cache);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// `OPENSKY_CLIENT_ID`, `OPENSKY_CLIENT_SECRET`, `OPENSKY_USERNAME` and
/// `OPENSKY_PASSWORD`, honored when the namespaced keys are absent.
fn load_legacy_credentials() -> Result<RawCredentialSettings, LoadError> {
    let legacy = Config::builder()
        .add_source(Environment::with_prefix(LEGACY_ENV_PREFIX).prefix_separator("_"))
        .build()?;
    Ok(legacy.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    upstream: RawUpstreamSettings,
    credentials: RawCredentialSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.upstream_timeout_seconds {
            self.upstream.request_timeout_seconds = Some(seconds);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }

        self.apply_logging_overrides(&overrides.logging);
        self.apply_cache_overrides(&overrides.cache);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            upstream,
            credentials,
            rate_limit,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let upstream = build_upstream_settings(upstream)?;
        let credentials = build_credential_settings(credentials);
        let rate_limit = build_rate_limit_settings(rate_limit)?;

        Ok(Self {
            server,
            logging,
            cache,
            upstream,
            credentials,
            rate_limit,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend_name = cache
        .backend
        .as_deref()
        .map(str::trim)
        .unwrap_or("file")
        .to_ascii_lowercase();

    let backend = match backend_name.as_str() {
        "file" => {
            let directory = cache
                .directory
                .unwrap_or_else(CacheBackend::default_directory);
            if directory.as_os_str().is_empty() {
                return Err(LoadError::invalid(
                    "cache.directory",
                    "path must not be empty",
                ));
            }
            CacheBackend::File { directory }
        }
        "memory" => {
            let capacity = match cache.memory_capacity {
                Some(value) => NonZeroUsize::new(value).ok_or_else(|| {
                    LoadError::invalid("cache.memory_capacity", "must be greater than zero")
                })?,
                None => CacheBackend::default_capacity(),
            };
            CacheBackend::Memory { capacity }
        }
        other => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}` (expected file or memory)"),
            ));
        }
    };

    let defaults = TtlPolicy::default();
    let ttl = TtlPolicy {
        live: optional_seconds(cache.live_ttl_seconds, defaults.live, "cache.live_ttl_seconds")?,
        batch: optional_seconds(
            cache.batch_ttl_seconds,
            defaults.batch,
            "cache.batch_ttl_seconds",
        )?,
        reference: optional_seconds(
            cache.reference_ttl_seconds,
            defaults.reference,
            "cache.reference_ttl_seconds",
        )?,
    };

    Ok(CacheSettings { backend, ttl })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let request_timeout = positive_seconds(
        upstream
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "upstream.request_timeout_seconds",
    )?;
    let token_timeout = positive_seconds(
        upstream
            .token_timeout_seconds
            .unwrap_or(DEFAULT_TOKEN_TIMEOUT_SECS),
        "upstream.token_timeout_seconds",
    )?;
    let connect_timeout = positive_seconds(
        upstream
            .connect_timeout_seconds
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        "upstream.connect_timeout_seconds",
    )?;

    let user_agent = non_blank(upstream.user_agent);

    let endpoints = UpstreamEndpoints {
        opensky: parse_url(upstream.opensky_url, DEFAULT_OPENSKY_URL, "upstream.opensky_url")?,
        frankfurter: parse_url(
            upstream.frankfurter_url,
            DEFAULT_FRANKFURTER_URL,
            "upstream.frankfurter_url",
        )?,
        rest_countries: parse_url(
            upstream.rest_countries_url,
            DEFAULT_REST_COUNTRIES_URL,
            "upstream.rest_countries_url",
        )?,
        world_time: parse_url(
            upstream.world_time_url,
            DEFAULT_WORLD_TIME_URL,
            "upstream.world_time_url",
        )?,
        nager_date: parse_url(
            upstream.nager_date_url,
            DEFAULT_NAGER_DATE_URL,
            "upstream.nager_date_url",
        )?,
        open_meteo: parse_url(
            upstream.open_meteo_url,
            DEFAULT_OPEN_METEO_URL,
            "upstream.open_meteo_url",
        )?,
    };
    let token_url = parse_url(upstream.token_url, DEFAULT_TOKEN_URL, "upstream.token_url")?;

    Ok(UpstreamSettings {
        request_timeout,
        token_timeout,
        connect_timeout,
        user_agent,
        endpoints,
        token_url,
    })
}

/// A credential pair is active only when both halves are non-blank.
fn build_credential_settings(credentials: RawCredentialSettings) -> CredentialSettings {
    let oauth = match (
        non_blank(credentials.client_id),
        non_blank(credentials.client_secret),
    ) {
        (Some(client_id), Some(client_secret)) => Some(ClientCredentials {
            client_id,
            client_secret,
        }),
        _ => None,
    };
    let basic = match (
        non_blank(credentials.username),
        non_blank(credentials.password),
    ) {
        (Some(username), Some(password)) => Some(BasicCredentials { username, password }),
        _ => None,
    };
    CredentialSettings { oauth, basic }
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    memory_capacity: Option<usize>,
    live_ttl_seconds: Option<u64>,
    batch_ttl_seconds: Option<u64>,
    reference_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    request_timeout_seconds: Option<u64>,
    token_timeout_seconds: Option<u64>,
    connect_timeout_seconds: Option<u64>,
    user_agent: Option<String>,
    opensky_url: Option<String>,
    frankfurter_url: Option<String>,
    rest_countries_url: Option<String>,
    world_time_url: Option<String>,
    nager_date_url: Option<String>,
    open_meteo_url: Option<String>,
    token_url: Option<String>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawCredentialSettings {
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for RawCredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCredentialSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RawCredentialSettings {
    /// Take each value from `legacy` only where this layer left it unset.
    fn fill_from(&mut self, legacy: RawCredentialSettings) {
        fn fill(slot: &mut Option<String>, fallback: Option<String>) {
            if slot.as_deref().is_none_or(|value| value.trim().is_empty()) {
                *slot = fallback;
            }
        }
        fill(&mut self.client_id, legacy.client_id);
        fill(&mut self.client_secret, legacy.client_secret);
        fill(&mut self.username, legacy.username);
        fill(&mut self.password, legacy.password);
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let raw = non_blank(value).unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|err| LoadError::invalid(key, format!("`{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    Ok(url)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn optional_seconds(
    value: Option<u64>,
    default: Duration,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match value {
        Some(seconds) => positive_seconds(seconds, key),
        None => Ok(default),
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
