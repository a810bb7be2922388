//! Storage contract shared by the cache backends.

use std::{io, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::keys::CacheKey;

/// A stored payload and the moment it was written.
///
/// The TTL is never stored: freshness is evaluated against the `max_age`
/// supplied at lookup time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at: i64,
    pub payload: Value,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, stored_at: i64, payload: Value) -> Self {
        Self {
            key: key.as_str().to_string(),
            stored_at,
            payload,
        }
    }

    /// Fresh while `now - stored_at <= max_age`.
    pub fn is_fresh(&self, now: i64, max_age: Duration) -> bool {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(self.stored_at) <= max_age
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache {op} failed for `{path}`: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache entry `{key}` could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache entry `{key}` could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Key/value store of JSON entries with lookup-time expiry.
pub trait CacheStore: Send + Sync {
    /// Short name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Return the entry for `key` if it exists and is no older than `max_age`.
    fn get(&self, key: &CacheKey, max_age: Duration) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite the entry.
    fn set(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove entries older than `max_age` and return how many were dropped.
    fn prune(&self, max_age: Duration) -> Result<usize, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn freshness_boundary_is_inclusive() {
        let key = CacheKey::from_raw("states_0011223344556677");
        let entry = CacheEntry::new(&key, 1_000, json!({"ok": true}));
        let ttl = Duration::from_secs(8);

        assert!(entry.is_fresh(1_000, ttl));
        assert!(entry.is_fresh(1_008, ttl));
        assert!(!entry.is_fresh(1_009, ttl));
    }

    #[test]
    fn entry_serializes_with_stored_at() {
        let key = CacheKey::from_raw("currencies_abcdefabcdefabcd");
        let entry = CacheEntry::new(&key, 42, Value::Null);
        let encoded = serde_json::to_value(&entry).expect("encode");
        assert_eq!(
            encoded,
            json!({"key": "currencies_abcdefabcdefabcd", "stored_at": 42, "payload": null})
        );
    }
}
