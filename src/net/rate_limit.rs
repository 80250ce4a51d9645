//! Request pacing and retry delays
//!
//! One `RateLimiter` is shared by every outbound call. The last-request
//! timestamp sits behind an async mutex that is held across the wait, so
//! concurrent callers are released one interval apart.

use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

pub struct RateLimiter {
    min_interval: Duration,
    base_delay: Duration,
    max_delay: Duration,
    last_request: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, base_delay: Duration, max_delay: Duration) -> Self {
        let min_interval = Duration::from_secs(60) / requests_per_minute.max(1);
        Self {
            min_interval,
            base_delay,
            max_delay,
            // the first request also waits a full interval after startup
            last_request: Mutex::new(Instant::now()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_minute,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until at least `min_interval` has passed since the last permitted request
    pub async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            let wait = self.min_interval - elapsed;
            debug!("Throttling for {:?}", wait);
            sleep(wait).await;
        }
        *last = Instant::now();
    }

    /// `min(max_delay, base_delay * 2^attempt)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, self.max_delay, attempt)
    }
}

/// Exponential delay capped at `max`
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Classifies failed responses as rate limited
#[derive(Debug, Clone)]
pub struct RateLimitDetector {
    patterns: Vec<Regex>,
}

impl RateLimitDetector {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("Invalid rate limit pattern {}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// HTTP 429 always counts; other statuses count when the body matches a pattern
    pub fn is_rate_limited(&self, status: u16, body: &str) -> bool {
        status == 429 || self.patterns.iter().any(|p| p.is_match(body))
    }

    /// Turn a non-success response into the matching error
    pub fn classify(&self, status: u16, body: String) -> Error {
        if self.is_rate_limited(status, &body) {
            Error::RateLimit {
                status,
                detail: body,
            }
        } else {
            Error::UnexpectedStatus { status, body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(15, Duration::from_millis(2000), Duration::from_millis(10000))
    }

    #[test]
    fn test_backoff_delay_doubles_then_saturates() {
        let limiter = limiter();
        assert_eq!(limiter.backoff_delay(0), Duration::from_millis(2000));
        assert_eq!(limiter.backoff_delay(1), Duration::from_millis(4000));
        assert_eq!(limiter.backoff_delay(2), Duration::from_millis(8000));
        assert_eq!(limiter.backoff_delay(3), Duration::from_millis(10000));
        assert_eq!(limiter.backoff_delay(40), Duration::from_millis(10000));
        assert_eq!(limiter.backoff_delay(u32::MAX), Duration::from_millis(10000));
    }

    #[test]
    fn test_backoff_delay_matches_formula() {
        let base = Duration::from_millis(3);
        let max = Duration::from_millis(1000);
        for attempt in 0..20u32 {
            let expected = (3u64 * 2u64.pow(attempt)).min(1000);
            assert_eq!(
                backoff_delay(base, max, attempt),
                Duration::from_millis(expected)
            );
        }
    }

    #[test]
    fn test_min_interval_from_rpm() {
        assert_eq!(limiter().min_interval(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_requests() {
        let limiter = limiter();
        let start = Instant::now();

        limiter.throttle().await;
        limiter.throttle().await;
        limiter.throttle().await;

        assert!(start.elapsed() >= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_does_not_wait_when_idle() {
        let limiter = limiter();
        tokio::time::advance(Duration::from_secs(10)).await;

        let start = Instant::now();
        limiter.throttle().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[test]
    fn test_detector_status_and_body() {
        let detector = RateLimitDetector::new(&["rate limit exceeded".to_string()]).unwrap();
        assert!(detector.is_rate_limited(429, ""));
        assert!(detector.is_rate_limited(400, "{\"error\":\"Rate limit exceeded\"}"));
        assert!(!detector.is_rate_limited(500, "internal error"));

        assert!(detector.classify(503, "Rate Limit Exceeded".to_string()).is_rate_limited());
        assert!(!detector.classify(500, "boom".to_string()).is_rate_limited());
    }

    #[test]
    fn test_detector_rejects_bad_pattern() {
        assert!(RateLimitDetector::new(&["(".to_string()]).is_err());
    }
}
