use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use folio_core::config::{RateLimitConfig, RateLimitPolicy};

/// Endpoint families with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPurpose {
    /// Reserved for a contact-form endpoint; no route consumes it yet.
    Contact,
    VisitorTracking,
    PageView,
}

impl RateLimitPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::VisitorTracking => "visitor_tracking",
            Self::PageView => "page_view",
        }
    }
}

struct Window {
    count: u32,
    started_at: Instant,
    length: Duration,
}

/// Fixed-window request counter keyed by `"{purpose}:{ip}"`.
///
/// A window starts at the first request for a key and resets in full once
/// its length has elapsed, so a client can burst up to twice the limit
/// across a boundary.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Record a request against `key`. Returns `true` when the caller is
    /// over budget; in that case nothing is recorded.
    pub async fn is_limited(&self, key: &str, limit: u32, window: Duration) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started_at: now,
            length: window,
        });
        if now.duration_since(entry.started_at) >= entry.length {
            entry.count = 0;
            entry.started_at = now;
            entry.length = window;
        }

        if entry.count >= limit {
            return true;
        }
        entry.count += 1;
        false
    }

    /// Check `ip` against the configured policy for `purpose`.
    pub async fn is_rate_limited(&self, purpose: RateLimitPurpose, ip: &str) -> bool {
        if self.config.disabled {
            return false;
        }
        let policy = self.policy(purpose);
        let key = format!("{}:{}", purpose.as_str(), ip);
        self.is_limited(&key, policy.limit, policy.window()).await
    }

    pub fn policy(&self, purpose: RateLimitPurpose) -> RateLimitPolicy {
        match purpose {
            RateLimitPurpose::Contact => self.config.contact,
            RateLimitPurpose::VisitorTracking => self.config.visitor_tracking,
            RateLimitPurpose::PageView => self.config.page_view,
        }
    }

    /// Drop every window that has run its course. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started_at) < w.length);
        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        for _ in 0..3 {
            assert!(!limiter.is_limited("k", 3, MINUTE).await);
        }
        assert!(limiter.is_limited("k", 3, MINUTE).await);
        assert!(limiter.is_limited("k", 3, MINUTE).await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_elapsing() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        assert!(!limiter.is_limited("k", 1, MINUTE).await);
        assert!(limiter.is_limited("k", 1, MINUTE).await);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(limiter.is_limited("k", 1, MINUTE).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!limiter.is_limited("k", 1, MINUTE).await);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_scoped_by_purpose_and_ip() {
        let config = RateLimitConfig {
            visitor_tracking: RateLimitPolicy {
                limit: 1,
                window_secs: 60,
            },
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config);

        assert!(!limiter.is_rate_limited(RateLimitPurpose::VisitorTracking, "203.0.113.5").await);
        assert!(limiter.is_rate_limited(RateLimitPurpose::VisitorTracking, "203.0.113.5").await);
        assert!(!limiter.is_rate_limited(RateLimitPurpose::VisitorTracking, "203.0.113.6").await);
        assert!(!limiter.is_rate_limited(RateLimitPurpose::PageView, "203.0.113.5").await);
    }

    #[tokio::test]
    async fn disabled_limiter_never_limits() {
        let config = RateLimitConfig {
            disabled: true,
            contact: RateLimitPolicy {
                limit: 0,
                window_secs: 60,
            },
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config);
        for _ in 0..10 {
            assert!(!limiter.is_rate_limited(RateLimitPurpose::Contact, "203.0.113.5").await);
        }
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_elapsed_windows() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.is_limited("short", 5, Duration::from_secs(10)).await;
        limiter.is_limited("long", 5, MINUTE).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.purge_expired().await, 1);
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn contact_budget_is_five_per_hour() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        for _ in 0..5 {
            assert!(!limiter.is_rate_limited(RateLimitPurpose::Contact, "203.0.113.5").await);
        }
        assert!(limiter.is_rate_limited(RateLimitPurpose::Contact, "203.0.113.5").await);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!limiter.is_rate_limited(RateLimitPurpose::Contact, "203.0.113.5").await);
    }

    #[test]
    fn purpose_names() {
        assert_eq!(RateLimitPurpose::Contact.as_str(), "contact");
        assert_eq!(RateLimitPurpose::VisitorTracking.as_str(), "visitor_tracking");
        assert_eq!(RateLimitPurpose::PageView.as_str(), "page_view");
    }
}
