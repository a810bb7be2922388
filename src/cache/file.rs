//! Filesystem cache backend: one `<key>.json` document per entry.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::util::clock::Clock;

use super::keys::CacheKey;
use super::store::{CacheEntry, CacheError, CacheStore};

const SOURCE: &str = "cache::file";

pub struct FileStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open (and create if needed) the cache directory.
    pub fn open(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| CacheError::io("create_dir", &root, err))?;
        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn read_entry(&self, path: &Path, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::io("read", path, err)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: key.to_string(),
                source,
            })
    }
}

impl CacheStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &CacheKey, max_age: Duration) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        let Some(entry) = self.read_entry(&path, key.as_str())? else {
            return Ok(None);
        };
        if entry.key != key.as_str() {
            warn!(
                target = SOURCE,
                op = "get",
                key = %key,
                stored_key = %entry.key,
                "Cache file holds a different key; ignoring"
            );
            return Ok(None);
        }
        Ok(entry.is_fresh(self.clock.now(), max_age).then_some(entry))
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let target = self.root.join(format!("{}.json", entry.key));
        let encoded = serde_json::to_vec(&entry).map_err(|source| CacheError::Encode {
            key: entry.key.clone(),
            source,
        })?;

        // Rename over the target so readers only ever see a complete document.
        let mut staged = NamedTempFile::new_in(&self.root)
            .map_err(|err| CacheError::io("create_temp", &self.root, err))?;
        staged
            .write_all(&encoded)
            .map_err(|err| CacheError::io("write", staged.path(), err))?;
        staged
            .persist(&target)
            .map_err(|err| CacheError::io("persist", &target, err.error))?;

        debug!(target = SOURCE, op = "set", key = %entry.key, bytes = encoded.len());
        Ok(())
    }

    fn prune(&self, max_age: Duration) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let listing =
            fs::read_dir(&self.root).map_err(|err| CacheError::io("read_dir", &self.root, err))?;

        let mut removed = 0;
        for item in listing {
            let item = item.map_err(|err| CacheError::io("read_dir", &self.root, err))?;
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();

            let stale = match self.read_entry(&path, &stem) {
                Ok(Some(entry)) => !entry.is_fresh(now, max_age),
                Ok(None) => false,
                Err(err) => {
                    warn!(target = SOURCE, op = "prune", key = %stem, error = %err, "Dropping unreadable cache entry");
                    true
                }
            };
            if !stale {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(CacheError::io("remove", &path, err)),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;
    use serde_json::json;

    fn store_at(start: i64) -> (tempfile::TempDir, Arc<ManualClock>, FileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = Arc::new(ManualClock::new(start));
        let store = FileStore::open(dir.path().join("entries"), clock.clone()).expect("open");
        (dir, clock, store)
    }

    #[test]
    fn missing_file_is_a_miss() {
        let (_dir, _clock, store) = store_at(100);
        let key = CacheKey::from_raw("states_0000000000000000");
        assert!(store.get(&key, Duration::from_secs(8)).expect("get").is_none());
    }

    #[test]
    fn entries_expire_after_max_age() {
        let (_dir, clock, store) = store_at(100);
        let key = CacheKey::from_raw("states_0000000000000001");
        store
            .set(CacheEntry::new(&key, 100, json!({"ok": true})))
            .expect("set");

        clock.set(108);
        let hit = store.get(&key, Duration::from_secs(8)).expect("get");
        assert_eq!(hit.map(|entry| entry.payload), Some(json!({"ok": true})));

        clock.set(109);
        assert!(store.get(&key, Duration::from_secs(8)).expect("get").is_none());
    }

    #[test]
    fn overwrite_replaces_whole_document() {
        let (_dir, _clock, store) = store_at(100);
        let key = CacheKey::from_raw("convert_0000000000000002");
        store
            .set(CacheEntry::new(&key, 100, json!({"rates": {"EUR": 0.9, "GBP": 0.8}})))
            .expect("first");
        store
            .set(CacheEntry::new(&key, 100, json!(null)))
            .expect("second");

        let raw = fs::read_to_string(store.root().join(key.file_name())).expect("read");
        let entry: CacheEntry = serde_json::from_str(&raw).expect("complete json");
        assert_eq!(entry.payload, json!(null));
    }

    #[test]
    fn corrupt_entry_surfaces_decode_error() {
        let (_dir, _clock, store) = store_at(100);
        let key = CacheKey::from_raw("tracks_0000000000000003");
        fs::write(store.root().join(key.file_name()), b"{not json").expect("write");

        let err = store.get(&key, Duration::from_secs(30)).expect_err("decode");
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn prune_removes_stale_and_corrupt_entries() {
        let (_dir, clock, store) = store_at(1_000);
        let old = CacheKey::from_raw("states_000000000000000a");
        let fresh = CacheKey::from_raw("states_000000000000000b");
        store
            .set(CacheEntry::new(&old, 900, json!(1)))
            .expect("old");
        store
            .set(CacheEntry::new(&fresh, 1_000, json!(2)))
            .expect("fresh");
        fs::write(store.root().join("broken.json"), b"").expect("broken");
        fs::write(store.root().join("notes.txt"), b"keep").expect("other");

        clock.set(1_010);
        let removed = store.prune(Duration::from_secs(30)).expect("prune");

        assert_eq!(removed, 2);
        assert!(store.get(&fresh, Duration::from_secs(30)).expect("get").is_some());
        assert!(store.root().join("notes.txt").exists());
    }
}
