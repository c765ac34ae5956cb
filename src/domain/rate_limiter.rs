//! Per-client sliding-window admission control.
//!
//! [`RateLimiter`] keeps, for each client key, the instants of requests it
//! admitted during the trailing window. A request is admitted while fewer
//! than `limit` admissions remain in the window, evaluated continuously
//! rather than per calendar-aligned bucket.
//!
//! # Concurrency
//!
//! The prune-compare-append sequence for a key runs under one
//! [`std::sync::Mutex`] guard and never awaits, so the `<= limit` bound holds
//! under any number of concurrent callers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was recorded and may proceed.
    Admitted {
        /// Admissions still available to this key in the current window.
        remaining: usize,
    },
    /// The key is at its limit; nothing was recorded.
    Rejected {
        /// Time until the oldest admission leaves the window.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` for [`Admission::Admitted`].
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// In-memory sliding-window limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    entries: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `limit` requests per `window`.
    ///
    /// A zero `limit` is raised to one.
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Maximum admissions per window.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Length of the trailing window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Checks and, if admitted, records a request from `key` at the current
    /// instant.
    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Checks and, if admitted, records a request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let mut entries = self.lock();
        let stamps = entries.entry(key.to_string()).or_default();
        prune(stamps, now, self.window);

        if stamps.len() >= self.limit {
            let retry_after = stamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or_default();
            return Admission::Rejected { retry_after };
        }

        stamps.push_back(now);
        Admission::Admitted {
            remaining: self.limit - stamps.len(),
        }
    }

    /// Drops keys whose admissions have all left the window.
    ///
    /// Returns the number of keys removed.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, stamps| {
            prune(stamps, now, self.window);
            !stamps.is_empty()
        });
        before - entries.len()
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        // No code path panics while holding the guard; recover the map anyway.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes admissions older than `now - window`.
fn prune(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = stamps.front() {
        if now.saturating_duration_since(*oldest) > window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let t0 = Instant::now();
        for i in 0..10 {
            assert!(limiter.check_at("10.0.0.1", t0 + MS * i).is_admitted());
        }
        assert!(!limiter.check_at("10.0.0.1", t0 + MS * 50).is_admitted());
    }

    #[test]
    fn admits_again_once_window_elapses() {
        let window = Duration::from_secs(60);
        let limiter = RateLimiter::new(10, window);
        let t0 = Instant::now();
        for _ in 0..10 {
            let _ = limiter.check_at("k", t0);
        }
        assert!(!limiter.check_at("k", t0 + window).is_admitted());
        assert!(limiter.check_at("k", t0 + window + MS).is_admitted());
    }

    #[test]
    fn window_slides_rather_than_resetting() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0).is_admitted());
        assert!(limiter.check_at("k", t0 + MS * 900).is_admitted());
        // First admission expired, second is still inside the window.
        assert!(limiter.check_at("k", t0 + MS * 1_001).is_admitted());
        assert!(!limiter.check_at("k", t0 + MS * 1_100).is_admitted());
    }

    #[test]
    fn rejection_is_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0).is_admitted());
        for i in 1..20 {
            assert!(!limiter.check_at("k", t0 + MS * i).is_admitted());
        }
        // Only the single admission counts, so it frees up at t0 + window.
        assert!(limiter.check_at("k", t0 + MS * 1_001).is_admitted());
    }

    #[test]
    fn reports_remaining_and_retry_after() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(
            limiter.check_at("k", t0),
            Admission::Admitted { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("k", t0),
            Admission::Admitted { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at("k", t0 + MS * 400),
            Admission::Rejected {
                retry_after: MS * 600
            }
        );
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).is_admitted());
        assert!(!limiter.check_at("a", t0).is_admitted());
        assert!(limiter.check_at("b", t0).is_admitted());
    }

    #[test]
    fn purge_idle_drops_only_expired_keys() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let t0 = Instant::now();
        let _ = limiter.check_at("old", t0);
        let _ = limiter.check_at("fresh", t0 + MS * 900);
        assert_eq!(limiter.tracked_keys(), 2);

        assert_eq!(limiter.purge_idle(t0 + MS * 1_500), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.limit(), 1);
        assert!(limiter.check("k").is_admitted());
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(25, Duration::from_secs(60)));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if limiter.check("shared").is_admitted() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn real_clock_scenario() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        assert!(limiter.check("client").is_admitted());
        assert!(limiter.check("client").is_admitted());
        assert!(!limiter.check("client").is_admitted());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(limiter.check("client").is_admitted());
    }
}
