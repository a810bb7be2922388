//! Cache key derivation.
//!
//! Keys are `<prefix>_<16 hex chars>` where the hex digits are the leading
//! half of a SHA-256 digest over the prefix and the parameters sorted by key.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::domain::{EndpointId, UpstreamRequest};

const DIGEST_HEX_LEN: usize = 16;
const TOKEN_PREFIX: &str = "oauth_token";

/// Identifies one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key for `endpoint` from parameter pairs in any order.
    pub fn derive<'a, I>(endpoint: EndpointId, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::hashed(endpoint.as_str(), params)
    }

    /// Key for a normalized request, covering both query and path parameters.
    pub fn for_request(request: &UpstreamRequest) -> Self {
        Self::derive(request.endpoint(), request.effective_params())
    }

    /// Key for the bearer token minted for `client_id`.
    pub fn for_token(client_id: &str) -> Self {
        Self::hashed(TOKEN_PREFIX, [("client_id", client_id)])
    }

    /// Rebuild a key from its string form, e.g. a cache file stem.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used by the filesystem backend.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    fn hashed<'a, I>(prefix: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let sorted: BTreeMap<&str, &str> = params.into_iter().collect();
        let mut hasher = Sha256::new();
        update_field(&mut hasher, prefix);
        for (key, value) in &sorted {
            update_field(&mut hasher, key);
            update_field(&mut hasher, value);
        }
        let digest = hex::encode(hasher.finalize());
        Self(format!("{prefix}_{}", &digest[..DIGEST_HEX_LEN]))
    }
}

// Length-prefixed so no field can absorb its neighbour's bytes.
fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
