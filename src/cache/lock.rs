use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Lock `lock`, taking the guard back from a poisoned mutex.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    backend: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'a, T>>| {
        warn!(
            target = "wayfarer::cache",
            backend,
            op,
            result = "poisoned_recovered",
            "Cache mutex was poisoned; continuing with its current contents"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn poisoned_mutex_still_yields_guard() {
        let shared = Arc::new(Mutex::new(7));
        let clone = Arc::clone(&shared);
        let _ = thread::spawn(move || {
            let _guard = clone.lock();
            panic!("poison the lock");
        })
        .join();

        assert!(shared.is_poisoned());
        assert_eq!(*mutex_lock(&shared, "memory", "test"), 7);
    }
}
