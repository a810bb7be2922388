use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // Logs go to stderr so `fetch` output on stdout stays machine-readable.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "wayfarer_cache_hit_total",
            Unit::Count,
            "Responses served from a live cache entry."
        );
        describe_counter!(
            "wayfarer_cache_miss_total",
            Unit::Count,
            "Requests that required an upstream call."
        );
        describe_counter!(
            "wayfarer_upstream_request_total",
            Unit::Count,
            "Upstream calls by endpoint and normalized outcome."
        );
        describe_counter!(
            "wayfarer_token_exchange_total",
            Unit::Count,
            "OAuth token lookups by result (reused, issued, failed)."
        );
        describe_counter!(
            "wayfarer_inbound_rate_limited_total",
            Unit::Count,
            "Inbound requests rejected by the per-client rate limiter."
        );
        describe_histogram!(
            "wayfarer_upstream_latency_ms",
            Unit::Milliseconds,
            "Upstream call latency in milliseconds."
        );
    });
}
