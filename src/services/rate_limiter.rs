//! Failed-login throttling
//!
//! A username that collects [`MAX_FAILED_ATTEMPTS`] failed logins inside
//! [`WINDOW_MINUTES`] is refused until the oldest failure ages out.
//! Usernames are compared case-insensitively.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MAX_FAILED_ATTEMPTS: usize = 5;
pub const WINDOW_MINUTES: i64 = 15;

/// Per-username sliding window of failed login timestamps
#[derive(Clone, Default)]
pub struct LoginRateLimiter {
    failures: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(username: &str) -> String {
        username.trim().to_lowercase()
    }

    fn cutoff() -> DateTime<Utc> {
        Utc::now() - Duration::minutes(WINDOW_MINUTES)
    }

    /// Whether `username` has used up its failures for the current window
    pub async fn is_limited(&self, username: &str) -> bool {
        let cutoff = Self::cutoff();
        let failures = self.failures.read().await;
        failures
            .get(&Self::key(username))
            .map(|times| times.iter().filter(|t| **t > cutoff).count() >= MAX_FAILED_ATTEMPTS)
            .unwrap_or(false)
    }

    pub async fn record_failure(&self, username: &str) {
        let cutoff = Self::cutoff();
        let mut failures = self.failures.write().await;
        let times = failures.entry(Self::key(username)).or_default();
        times.retain(|t| *t > cutoff);
        times.push(Utc::now());
    }

    /// Forget a username's failures after a successful login
    pub async fn clear(&self, username: &str) {
        self.failures.write().await.remove(&Self::key(username));
    }

    /// Drop expired timestamps and empty entries; run periodically
    pub async fn cleanup(&self) {
        let cutoff = Self::cutoff();
        let mut failures = self.failures.write().await;
        failures.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_usernames(&self) -> usize {
        self.failures.read().await.len()
    }

    #[cfg(test)]
    async fn backdate(&self, username: &str, minutes: i64) {
        if let Some(times) = self.failures.write().await.get_mut(&Self::key(username)) {
            for t in times.iter_mut() {
                *t = *t - Duration::minutes(minutes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limited_after_five_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            limiter.record_failure("testuser").await;
            assert!(!limiter.is_limited("testuser").await);
        }
        limiter.record_failure("testuser").await;

        assert!(limiter.is_limited("testuser").await);
        assert!(!limiter.is_limited("someoneelse").await);
    }

    #[tokio::test]
    async fn test_clear_resets_username() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            limiter.record_failure("testuser").await;
        }

        limiter.clear("testuser").await;

        assert!(!limiter.is_limited("testuser").await);
    }

    #[tokio::test]
    async fn test_username_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failure("TestUser").await;
        limiter.record_failure("testuser").await;
        limiter.record_failure("TESTUSER").await;
        limiter.record_failure(" testuser ").await;
        assert!(!limiter.is_limited("testuser").await);

        limiter.record_failure("testUSER").await;
        assert!(limiter.is_limited("TestUser").await);
    }

    #[tokio::test]
    async fn test_old_failures_age_out() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            limiter.record_failure("slowpoke").await;
        }
        limiter.backdate("slowpoke", WINDOW_MINUTES + 1).await;

        assert!(!limiter.is_limited("slowpoke").await);

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_usernames().await, 0);
    }
}
