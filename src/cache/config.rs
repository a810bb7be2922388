//! Cache configuration.
//!
//! Selects the storage backend and maps each endpoint's TTL class to a
//! lookup age, as configured under `[cache]`.

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use crate::domain::{EndpointId, TtlClass};

const DEFAULT_LIVE_TTL_SECS: u64 = 8;
const DEFAULT_BATCH_TTL_SECS: u64 = 30;
const DEFAULT_REFERENCE_TTL_SECS: u64 = 3600;
const DEFAULT_MEMORY_CAPACITY: usize = 1024;
const DEFAULT_DIRECTORY_NAME: &str = "wayfarer-cache";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// JSON documents under a directory; entries survive restarts.
    File { directory: PathBuf },
    /// In-process LRU bounded by entry count.
    Memory { capacity: NonZeroUsize },
}

impl CacheBackend {
    pub fn default_directory() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_DIRECTORY_NAME)
    }

    pub fn default_capacity() -> NonZeroUsize {
        NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for CacheBackend {
    fn default() -> Self {
        Self::File {
            directory: Self::default_directory(),
        }
    }
}

/// Lookup ages per TTL class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub live: Duration,
    pub batch: Duration,
    pub reference: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            live: Duration::from_secs(DEFAULT_LIVE_TTL_SECS),
            batch: Duration::from_secs(DEFAULT_BATCH_TTL_SECS),
            reference: Duration::from_secs(DEFAULT_REFERENCE_TTL_SECS),
        }
    }
}

impl TtlPolicy {
    pub fn for_class(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Live => self.live,
            TtlClass::Batch => self.batch,
            TtlClass::Reference => self.reference,
        }
    }

    pub fn for_endpoint(&self, endpoint: EndpointId) -> Duration {
        self.for_class(endpoint.ttl_class())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub ttl: TtlPolicy,
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend.clone(),
            ttl: settings.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl.live, Duration::from_secs(8));
        assert_eq!(config.ttl.batch, Duration::from_secs(30));
        assert_eq!(config.ttl.reference, Duration::from_secs(3600));
        assert_eq!(
            config.backend,
            CacheBackend::File {
                directory: std::env::temp_dir().join("wayfarer-cache")
            }
        );
    }

    #[test]
    fn endpoints_map_through_their_class() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.for_endpoint(EndpointId::States), policy.live);
        assert_eq!(policy.for_endpoint(EndpointId::Arrivals), policy.batch);
        assert_eq!(policy.for_endpoint(EndpointId::Currencies), policy.reference);
    }
}
