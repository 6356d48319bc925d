//! Keyed fixed-window rate limiting for outbound RPC calls.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const DEFAULT_MAX_REQUESTS: u32 = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1_000);

/// Admission budget of a key: `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitQuota {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitQuota {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub window_start: Instant,
    pub request_count: u32,
    pub last_request: Instant,
    /// Window the entry was opened with.
    pub window: Duration,
}

impl RateLimitEntry {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            window_start: now,
            request_count: 1,
            last_request: now,
            window,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub request_count: u32,
    pub time_until_reset: Duration,
}

/// Fixed-window counter per key.
///
/// The window is a strict reset: once `window` has elapsed since the first
/// admitted request, the counter starts again at one.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a caller may proceed right now, consuming one slot of
    /// the current window when it may. A denied call does not touch the entry.
    pub fn can_make_request(&self, key: &str, quota: RateLimitQuota) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(key) else {
            entries.insert(key.to_owned(), RateLimitEntry::new(now, quota.window));
            return true;
        };

        if entry.is_expired(now, quota.window) {
            *entry = RateLimitEntry::new(now, quota.window);
            return true;
        }

        if entry.request_count < quota.max_requests {
            entry.request_count += 1;
            entry.last_request = now;
            return true;
        }

        trace!(
            "Rate limit reached for {} ({}/{})",
            key,
            entry.request_count,
            quota.max_requests
        );
        false
    }

    /// Sleeps until the current window of `key` is over. Returns at once when
    /// the key is unknown or its window already elapsed.
    pub async fn wait_for_window_reset(&self, key: &str, window: Duration) {
        let remaining = {
            let entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) => window.saturating_sub(entry.window_start.elapsed()),
                None => Duration::ZERO,
            }
        };

        if !remaining.is_zero() {
            debug!("Waiting {:?} for the rate limit window of {}", remaining, key);
            tokio::time::sleep(remaining).await;
        }
    }

    pub fn status(&self, key: &str) -> Option<RateLimitStatus> {
        let entries = self.entries.lock();
        entries.get(key).map(|entry| RateLimitStatus {
            request_count: entry.request_count,
            time_until_reset: entry.window.saturating_sub(entry.window_start.elapsed()),
        })
    }

    /// Waits for admission under `quota`, then runs `f` exactly once.
    ///
    /// The check and the slot consumption happen under a single lock, so two
    /// callers can never both take the last slot of a window.
    pub async fn execute_with_rate_limit<F, Fut, T>(
        &self,
        key: &str,
        quota: RateLimitQuota,
        f: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        while !self.can_make_request(key, quota) {
            self.wait_for_window_reset(key, quota.window).await;
        }
        f().await
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn clear_key(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quota(max_requests: u32) -> RateLimitQuota {
        RateLimitQuota::new(max_requests, Duration::from_millis(1_000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_max_requests_then_denies() {
        let limiter = RateLimiter::new();

        for _ in 0..DEFAULT_MAX_REQUESTS {
            assert!(limiter.can_make_request("rpc", RateLimitQuota::default()));
        }
        assert!(!limiter.can_make_request("rpc", RateLimitQuota::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_call_does_not_mutate_entry() {
        let limiter = RateLimiter::new();
        assert!(limiter.can_make_request("rpc", quota(1)));
        assert!(!limiter.can_make_request("rpc", quota(1)));
        assert!(!limiter.can_make_request("rpc", quota(1)));

        assert_eq!(limiter.status("rpc").unwrap().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_a_strict_reset() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.can_make_request("rpc", quota(3)));
        }

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.can_make_request("rpc", quota(3)));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.can_make_request("rpc", quota(3)));
        assert_eq!(limiter.status("rpc").unwrap().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_admitted_calls() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.status("rpc"), None);

        for _ in 0..4 {
            limiter.can_make_request("rpc", quota(10));
        }
        tokio::time::advance(Duration::from_millis(250)).await;

        let status = limiter.status("rpc").unwrap();
        assert_eq!(status.request_count, 4);
        assert_eq!(status.time_until_reset, Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.can_make_request("a", quota(1)));
        assert!(!limiter.can_make_request("a", quota(1)));
        assert!(limiter.can_make_request("b", quota(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_window_reset_scenario() {
        let limiter = RateLimiter::new();

        assert!(limiter.can_make_request("rpc", quota(3)));
        assert!(limiter.can_make_request("rpc", quota(3)));
        assert!(limiter.can_make_request("rpc", quota(3)));
        assert!(!limiter.can_make_request("rpc", quota(3)));

        let before = Instant::now();
        limiter
            .wait_for_window_reset("rpc", Duration::from_millis(1_000))
            .await;
        assert_eq!(before.elapsed(), Duration::from_millis(1_000));

        assert!(limiter.can_make_request("rpc", quota(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_window_reset_is_noop_for_unknown_or_expired_key() {
        let limiter = RateLimiter::new();
        let before = Instant::now();
        limiter
            .wait_for_window_reset("missing", Duration::from_millis(1_000))
            .await;
        assert_eq!(before.elapsed(), Duration::ZERO);

        limiter.can_make_request("rpc", quota(1));
        tokio::time::advance(Duration::from_millis(1_500)).await;
        let before = Instant::now();
        limiter
            .wait_for_window_reset("rpc", Duration::from_millis(1_000))
            .await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_rate_limit_waits_when_denied() {
        let limiter = RateLimiter::new();
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        for _ in 0..3 {
            limiter
                .execute_with_rate_limit("rpc", quota(2), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
        assert_eq!(limiter.status("rpc").unwrap().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_rate_limit_never_exceeds_quota_concurrently() {
        let limiter = Arc::new(RateLimiter::new());
        let admitted_at = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted_at = Arc::clone(&admitted_at);
                tokio::spawn(async move {
                    limiter
                        .execute_with_rate_limit("rpc", quota(2), || async move {
                            admitted_at.lock().push(start.elapsed());
                        })
                        .await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let admitted_at = admitted_at.lock();
        assert_eq!(admitted_at.len(), 6);
        for window in 0..3u64 {
            let in_window = admitted_at
                .iter()
                .filter(|elapsed| elapsed.as_millis() as u64 / 1_000 == window)
                .count();
            assert_eq!(in_window, 2, "window {} admitted {}", window, in_window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_clear_key() {
        let limiter = RateLimiter::new();
        limiter.can_make_request("a", quota(1));
        limiter.can_make_request("b", quota(1));

        limiter.clear_key("a");
        assert_eq!(limiter.status("a"), None);
        assert!(limiter.status("b").is_some());

        limiter.clear();
        assert_eq!(limiter.status("b"), None);
        assert!(limiter.can_make_request("b", quota(1)));
    }
}
