//! Wayfarer cache system
//!
//! Normalized responses and OAuth tokens are stored as JSON entries keyed by
//! a digest of the request. The TTL is chosen by the caller at lookup time,
//! so one store serves every endpoint class.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "file"          # or "memory"
//! directory = "/tmp/wayfarer-cache"
//! memory_capacity = 1024
//! live_ttl_seconds = 8
//! batch_ttl_seconds = 30
//! reference_ttl_seconds = 3600
//! ```

mod config;
mod file;
mod keys;
mod lock;
mod memory;
mod store;

use std::sync::Arc;

use crate::util::clock::Clock;

pub use config::{CacheBackend, CacheConfig, TtlPolicy};
pub use file::FileStore;
pub use keys::CacheKey;
pub use memory::MemoryStore;
pub use store::{CacheEntry, CacheError, CacheStore};

/// Build the configured backend.
pub fn open_store(
    config: &CacheConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CacheStore>, CacheError> {
    match &config.backend {
        CacheBackend::File { directory } => Ok(Arc::new(FileStore::open(directory, clock)?)),
        CacheBackend::Memory { capacity } => Ok(Arc::new(MemoryStore::new(*capacity, clock))),
    }
}
