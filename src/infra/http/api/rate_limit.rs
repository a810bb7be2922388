use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Admission checks between sweeps of idle client buckets.
const SWEEP_EVERY: u64 = 256;

/// Outcome of a sliding-window admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

/// Sliding-window limiter keyed by client identity.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    checks: Arc<AtomicU64>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn check(&self, client: &str) -> Admission {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Admission {
        let window = self.window;
        // Sweep before taking the entry guard; `retain` locks every shard.
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep_at(now);
        }

        let mut entry = self.buckets.entry(client.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        let remaining = self.max_requests.saturating_sub(used);
        if remaining == 0 {
            // The oldest request in the window is the next to expire.
            let wait = entry
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return Admission::Limited {
                retry_after_secs: ceil_secs(wait),
            };
        }

        entry.push(now);
        Admission::Allowed {
            remaining: remaining - 1,
        }
    }
}

impl ApiRateLimiter {
    /// Drop clients with no request inside the window.
    fn sweep_at(&self, now: Instant) {
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

fn ceil_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_applies_per_client() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert_eq!(
            limiter.check_at("10.0.0.1", start),
            Admission::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("10.0.0.1", start),
            Admission::Allowed { remaining: 0 }
        );
        assert!(matches!(
            limiter.check_at("10.0.0.1", start),
            Admission::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("10.0.0.2", start),
            Admission::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn window_slides_and_reports_wait() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 1);
        let start = Instant::now();
        assert!(matches!(
            limiter.check_at("client", start),
            Admission::Allowed { .. }
        ));

        let later = start + Duration::from_millis(20_500);
        assert_eq!(
            limiter.check_at("client", later),
            Admission::Limited { retry_after_secs: 40 }
        );

        let after_window = start + Duration::from_secs(60);
        assert!(matches!(
            limiter.check_at("client", after_window),
            Admission::Allowed { .. }
        ));
    }

    #[test]
    fn idle_clients_are_swept_after_window() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 1_000);
        let start = Instant::now();
        for client in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            limiter.check_at(client, start);
        }
        assert_eq!(limiter.tracked_clients(), 3);

        let later = start + Duration::from_secs(61);
        limiter.sweep_at(later);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn admission_checks_trigger_periodic_sweep() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 1_000);
        let start = Instant::now();
        for n in 0..10 {
            limiter.check_at(&format!("10.0.1.{n}"), start);
        }
        assert_eq!(limiter.tracked_clients(), 10);

        let later = start + Duration::from_secs(61);
        for _ in 10..SWEEP_EVERY {
            limiter.check_at("10.0.2.1", later);
        }
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
