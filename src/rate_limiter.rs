//! Windowed (non-sliding) rate limiter.
//!
//! Three independent tiers keyed by client identity: anonymous-BYOK-off,
//! anonymous-BYOK-on, and BYOK-authenticated-by-session. Counters live in a
//! `DashMap` the same way `flight_tracker`'s aircraft state map does,
//! generalized here to a fixed window that resets wholesale once it elapses
//! rather than sliding continuously.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitTier {
    pub limit: u32,
    pub window: Duration,
}

pub const ANONYMOUS_BYOK_OFF: RateLimitTier = RateLimitTier {
    limit: 100,
    window: Duration::from_secs(15 * 60),
};
pub const ANONYMOUS_BYOK_ON: RateLimitTier = RateLimitTier {
    limit: 10,
    window: Duration::from_secs(60),
};
pub const BYOK_AUTHENTICATED: RateLimitTier = RateLimitTier {
    limit: 100,
    window: Duration::from_secs(15 * 60),
};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
}

struct Window {
    count: u32,
    started_at: Instant,
    reset_at: i64,
}

/// Fixed-window counters, one entry per client identity (IP address for
/// anonymous callers, session id for BYOK-authenticated ones).
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { windows: DashMap::new() })
    }

    pub fn check(&self, identity: &str, tier: RateLimitTier) -> RateLimitDecision {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert_with(|| Window {
                count: 0,
                started_at: now,
                reset_at: (chrono::Utc::now() + chrono::Duration::from_std(tier.window).unwrap()).timestamp(),
            });

        if now.duration_since(entry.started_at) >= tier.window {
            entry.count = 0;
            entry.started_at = now;
            entry.reset_at = (chrono::Utc::now() + chrono::Duration::from_std(tier.window).unwrap()).timestamp();
        }

        if entry.count >= tier.limit {
            return RateLimitDecision {
                allowed: false,
                limit: tier.limit,
                remaining: 0,
                reset_at: entry.reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: tier.limit,
            remaining: tier.limit - entry.count,
            reset_at: entry.reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new();
        let tier = RateLimitTier {
            limit: 3,
            window: Duration::from_secs(60),
        };
        for _ in 0..3 {
            assert!(limiter.check("client-a", tier).allowed);
        }
    }

    #[test]
    fn blocks_requests_over_the_limit() {
        let limiter = RateLimiter::new();
        let tier = RateLimitTier {
            limit: 2,
            window: Duration::from_secs(60),
        };
        assert!(limiter.check("client-b", tier).allowed);
        assert!(limiter.check("client-b", tier).allowed);
        let decision = limiter.check("client-b", tier);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn identities_are_tracked_independently() {
        let limiter = RateLimiter::new();
        let tier = RateLimitTier {
            limit: 1,
            window: Duration::from_secs(60),
        };
        assert!(limiter.check("client-c", tier).allowed);
        assert!(limiter.check("client-d", tier).allowed);
    }
}
