//! Rate limiting for WebSocket commands.
//!
//! Each connection gets a [`RateLimiter`] with two sliding windows: a short
//! burst window and a longer sustained one. A message must fit in both.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Sliding window of recent message times
#[derive(Debug)]
struct Window {
    timestamps: VecDeque<Instant>,
    limit: usize,
    span: Duration,
}

impl Window {
    fn new(limit: usize, span: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(limit.min(128)),
            limit,
            span,
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) >= self.span {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_full(&self) -> bool {
        self.timestamps.len() >= self.limit
    }

    fn retry_in(&self, now: Instant) -> Duration {
        self.timestamps
            .front()
            .map(|oldest| self.span.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default()
    }
}

/// Which window turned a message away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limited {
    Burst,
    Sustained,
}

impl Limited {
    pub fn label(self) -> &'static str {
        match self {
            Self::Burst => "burst",
            Self::Sustained => "sustained",
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    burst: Window,
    sustained: Window,
}

impl RateLimiter {
    /// Create a rate limiter
    ///
    /// # Arguments
    ///
    /// * `config` - Messages allowed per second and per minute
    ///
    /// # Example
    ///
    /// ```
    /// use pc_server::{api::rate_limiter::RateLimiter, config::RateLimitConfig};
    ///
    /// let mut limiter = RateLimiter::new(RateLimitConfig { burst: 2, sustained: 10 });
    /// assert!(limiter.check().is_ok());
    /// assert!(limiter.check().is_ok());
    /// assert!(limiter.check().is_err());
    /// ```
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            burst: Window::new(config.burst, Duration::from_secs(1)),
            sustained: Window::new(config.sustained, Duration::from_secs(60)),
        }
    }

    /// Record a message if both windows have room.
    ///
    /// # Errors
    ///
    /// Returns the window that is full. Rejected messages are not recorded.
    pub fn check(&mut self) -> Result<(), Limited> {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> Result<(), Limited> {
        self.burst.expire(now);
        self.sustained.expire(now);

        if self.burst.is_full() {
            return Err(Limited::Burst);
        }
        if self.sustained.is_full() {
            return Err(Limited::Sustained);
        }

        self.burst.timestamps.push_back(now);
        self.sustained.timestamps.push_back(now);
        Ok(())
    }

    /// Time until the given window accepts another message.
    pub fn retry_in(&self, limited: Limited) -> Duration {
        let now = Instant::now();
        match limited {
            Limited::Burst => self.burst.retry_in(now),
            Limited::Sustained => self.sustained.retry_in(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: usize, sustained: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig { burst, sustained })
    }

    #[test]
    fn test_burst_blocks_within_a_second() {
        let mut limiter = limiter(3, 100);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at(start).is_ok());
        }
        assert_eq!(limiter.check_at(start), Err(Limited::Burst));
        assert!(limiter.check_at(start + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_sustained_blocks_across_seconds() {
        let mut limiter = limiter(2, 4);
        let start = Instant::now();
        for second in 0..2 {
            let now = start + Duration::from_secs(second);
            assert!(limiter.check_at(now).is_ok());
            assert!(limiter.check_at(now).is_ok());
        }
        let later = start + Duration::from_secs(5);
        assert_eq!(limiter.check_at(later), Err(Limited::Sustained));
        assert!(limiter.check_at(start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let mut limiter = limiter(1, 100);
        let start = Instant::now();
        assert!(limiter.check_at(start).is_ok());
        for _ in 0..10 {
            assert!(limiter.check_at(start).is_err());
        }
        assert_eq!(limiter.sustained.timestamps.len(), 1);
    }

    #[test]
    fn test_retry_in_is_bounded_by_window() {
        let mut limiter = limiter(1, 100);
        assert!(limiter.retry_in(Limited::Burst).is_zero());
        limiter.check().unwrap();
        assert!(limiter.retry_in(Limited::Burst) <= Duration::from_secs(1));
        assert_eq!(Limited::Sustained.label(), "sustained");
    }
}
