//! Per-caller rate limiting.
//!
//! Two independent fixed windows guard the aggregator: a short burst window
//! and a longer sustained window whose ceiling is higher for authenticated
//! callers. Authenticated callers are keyed by identity, anonymous callers by
//! client address. A request is admitted only when both windows have room,
//! and only then are both counters charged.
//!
//! The limiter trusts whatever identity and address it is given; callers must
//! derive them from headers an upstream proxy controls.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::SearchError;

/// Who a request is charged to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerKey {
    /// Authenticated identity.
    User(String),
    /// Anonymous caller, by client address.
    Address(String),
}

impl CallerKey {
    /// Prefer the authenticated identity; fall back to the client address.
    pub fn resolve(caller_id: Option<&str>, address: Option<&str>) -> Self {
        match caller_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => CallerKey::User(id.to_string()),
            None => CallerKey::Address(address.unwrap_or("unknown").to_string()),
        }
    }

    fn is_authenticated(&self) -> bool {
        matches!(self, CallerKey::User(_))
    }

    fn storage_key(&self) -> String {
        match self {
            CallerKey::User(id) => format!("user:{}", id),
            CallerKey::Address(addr) => format!("addr:{}", addr),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn current(slot: Option<Window>, now: Instant, span: Duration) -> Window {
        match slot {
            Some(w) if now.saturating_duration_since(w.started) < span => w,
            _ => Window {
                started: now,
                count: 0,
            },
        }
    }

    fn retry_after(&self, now: Instant, span: Duration) -> u64 {
        let remaining = span.saturating_sub(now.saturating_duration_since(self.started));
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// Fixed-window limiter with a burst and a sustained window per caller.
pub struct RateLimiter {
    config: RateLimitConfig,
    burst: DashMap<String, Window>,
    sustained: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            burst: DashMap::new(),
            sustained: DashMap::new(),
        }
    }

    /// Admit or reject one request from `caller` at the current instant.
    pub fn admit(&self, caller: &CallerKey) -> Result<(), SearchError> {
        self.admit_at(caller, Instant::now())
    }

    /// Admit or reject one request from `caller` at `now`.
    ///
    /// On rejection neither window is charged.
    pub fn admit_at(&self, caller: &CallerKey, now: Instant) -> Result<(), SearchError> {
        let key = caller.storage_key();
        let burst_span = Duration::from_secs(self.config.burst_window_secs);
        let sustained_span = Duration::from_secs(self.config.sustained_window_secs);
        let sustained_max = if caller.is_authenticated() {
            self.config.sustained_max_authenticated
        } else {
            self.config.sustained_max_anonymous
        };

        // Hold the burst entry for the whole decision so two concurrent
        // requests from one caller cannot both take the last slot.
        let mut burst_slot = self.burst.entry(key.clone()).or_insert(Window {
            started: now,
            count: 0,
        });
        let mut burst = Window::current(Some(*burst_slot), now, burst_span);
        if burst.count >= self.config.burst_max {
            return Err(SearchError::RateLimitExceeded {
                retry_after_secs: burst.retry_after(now, burst_span),
            });
        }

        let mut sustained_slot = self.sustained.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        let mut sustained = Window::current(Some(*sustained_slot), now, sustained_span);
        if sustained.count >= sustained_max {
            return Err(SearchError::RateLimitExceeded {
                retry_after_secs: sustained.retry_after(now, sustained_span),
            });
        }

        burst.count += 1;
        sustained.count += 1;
        *burst_slot = burst;
        *sustained_slot = sustained;
        Ok(())
    }

    /// Forget windows that have fully elapsed.
    pub fn prune(&self, now: Instant) {
        let burst_span = Duration::from_secs(self.config.burst_window_secs);
        let sustained_span = Duration::from_secs(self.config.sustained_window_secs);
        self.burst
            .retain(|_, w| now.saturating_duration_since(w.started) < burst_span);
        self.sustained
            .retain(|_, w| now.saturating_duration_since(w.started) < sustained_span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: u32, anon: u32, auth: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            burst_max: burst,
            burst_window_secs: 60,
            sustained_window_secs: 900,
            sustained_max_anonymous: anon,
            sustained_max_authenticated: auth,
        })
    }

    #[test]
    fn test_twenty_first_request_denied_with_full_window() {
        let rl = limiter(20, 100, 200);
        let caller = CallerKey::User("u1".into());
        let now = Instant::now();
        for _ in 0..20 {
            rl.admit_at(&caller, now).unwrap();
        }
        assert_eq!(
            rl.admit_at(&caller, now),
            Err(SearchError::RateLimitExceeded {
                retry_after_secs: 60,
            })
        );
    }

    #[test]
    fn test_burst_window_resets() {
        let rl = limiter(2, 100, 200);
        let caller = CallerKey::Address("10.0.0.1".into());
        let t0 = Instant::now();
        rl.admit_at(&caller, t0).unwrap();
        rl.admit_at(&caller, t0).unwrap();
        let denied = rl.admit_at(&caller, t0 + Duration::from_secs(45));
        assert_eq!(
            denied,
            Err(SearchError::RateLimitExceeded {
                retry_after_secs: 15,
            })
        );
        assert!(rl.admit_at(&caller, t0 + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_sustained_ceiling_depends_on_authentication() {
        let rl = limiter(100, 3, 5);
        let anon = CallerKey::Address("1.2.3.4".into());
        let user = CallerKey::User("alice".into());
        let now = Instant::now();
        for _ in 0..3 {
            rl.admit_at(&anon, now).unwrap();
        }
        assert!(matches!(
            rl.admit_at(&anon, now),
            Err(SearchError::RateLimitExceeded {
                retry_after_secs: 900,
            })
        ));
        for _ in 0..5 {
            rl.admit_at(&user, now).unwrap();
        }
        assert!(rl.admit_at(&user, now).is_err());
    }

    #[test]
    fn test_rejection_does_not_charge_burst() {
        let rl = limiter(10, 1, 1);
        let caller = CallerKey::User("bob".into());
        let now = Instant::now();
        rl.admit_at(&caller, now).unwrap();
        for _ in 0..20 {
            assert!(rl.admit_at(&caller, now).is_err());
        }
        let entry = rl.burst.get("user:bob").unwrap();
        assert_eq!(entry.count, 1);
    }

    #[test]
    fn test_callers_are_isolated() {
        let rl = limiter(1, 10, 10);
        let now = Instant::now();
        rl.admit_at(&CallerKey::User("a".into()), now).unwrap();
        rl.admit_at(&CallerKey::User("b".into()), now).unwrap();
        rl.admit_at(&CallerKey::Address("a".into()), now).unwrap();
    }

    #[test]
    fn test_resolve_prefers_identity() {
        assert_eq!(
            CallerKey::resolve(Some("u"), Some("1.1.1.1")),
            CallerKey::User("u".into())
        );
        assert_eq!(
            CallerKey::resolve(Some("  "), Some("1.1.1.1")),
            CallerKey::Address("1.1.1.1".into())
        );
    }

    #[test]
    fn test_prune_drops_elapsed_windows() {
        let rl = limiter(5, 5, 5);
        let t0 = Instant::now();
        rl.admit_at(&CallerKey::User("x".into()), t0).unwrap();
        rl.prune(t0 + Duration::from_secs(61));
        assert!(rl.burst.is_empty());
        assert_eq!(rl.sustained.len(), 1);
    }
}
