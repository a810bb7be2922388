use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use url::Url;

use wayfarer::application::credentials::{CredentialConfig, CredentialResolver};
use wayfarer::application::gateway::{Gateway, UpstreamEndpoints};
use wayfarer::application::transport::{
    TransportError, UpstreamCall, UpstreamReply, UpstreamTransport,
};
use wayfarer::cache::{CacheStore, MemoryStore, TtlPolicy};
use wayfarer::domain::QueryParams;
use wayfarer::util::clock::{Clock, ManualClock};

struct AlwaysOk;

#[async_trait]
impl UpstreamTransport for AlwaysOk {
    async fn send(&self, _call: UpstreamCall) -> Result<UpstreamReply, TransportError> {
        Ok(UpstreamReply::new(200, "[]"))
    }
}

fn gateway() -> Gateway {
    let base = Url::parse("https://upstream.test/").expect("url");
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000));
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(
        NonZeroUsize::new(8).expect("non-zero"),
        clock.clone(),
    ));
    let transport: Arc<dyn UpstreamTransport> = Arc::new(AlwaysOk);
    let resolver = CredentialResolver::new(
        CredentialConfig {
            oauth: None,
            basic: None,
            token_url: base.clone(),
            token_timeout: Duration::from_secs(1),
        },
        store.clone(),
        transport.clone(),
        clock.clone(),
    );
    Gateway::new(
        store,
        transport,
        resolver,
        clock,
        UpstreamEndpoints {
            opensky: base.clone(),
            frankfurter: base.clone(),
            rest_countries: base.clone(),
            world_time: base.clone(),
            nager_date: base.clone(),
            open_meteo: base,
        },
        TtlPolicy::default(),
        Duration::from_secs(1),
    )
}

#[test]
fn cache_and_upstream_paths_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build");

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let gateway = gateway();
            for _ in 0..3 {
                let response = gateway
                    .fetch("currencies", &QueryParams::new(), 3600)
                    .await
                    .expect("fetch");
                assert!(response.ok());
            }
        });
    });

    let mut counters: HashMap<String, u64> = HashMap::new();
    let mut histograms = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let key = composite_key.key();
        let labels: Vec<String> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        let name = format!("{}{{{}}}", key.name(), labels.join(","));
        match value {
            DebugValue::Counter(count) => {
                counters.insert(name, count);
            }
            DebugValue::Histogram(_) => histograms.push(key.name().to_string()),
            DebugValue::Gauge(_) => {}
        }
    }

    assert_eq!(
        counters.get("wayfarer_cache_miss_total{endpoint=currencies}"),
        Some(&1)
    );
    assert_eq!(
        counters.get("wayfarer_cache_hit_total{endpoint=currencies}"),
        Some(&2)
    );
    assert_eq!(
        counters.get("wayfarer_upstream_request_total{endpoint=currencies,outcome=success}"),
        Some(&1)
    );
    assert!(
        histograms
            .iter()
            .any(|name| name == "wayfarer_upstream_latency_ms"),
        "missing latency histogram"
    );
}
