//! Fixed-window admission control over a shared counter store.

use std::time::Duration;

use tenet_core::error::TenetResult;
use tenet_core::repository::RateCounterRepository;

/// Counter key for unauthenticated attempts from one client address.
pub fn auth_key(client_ip: &str) -> String {
    format!("auth-{client_ip}")
}

/// Counter key for an authenticated identity.
pub fn private_key(user_id: &str) -> String {
    format!("private-{user_id}")
}

/// Admission check backed by a [`RateCounterRepository`].
///
/// Every check spends one unit of the key's current window, whether the
/// verdict is allow or deny. Retrying a denied request therefore keeps the
/// window full instead of racing its edge.
#[derive(Debug, Clone)]
pub struct RateLimiter<R: RateCounterRepository> {
    counters: R,
    window: Duration,
}

impl<R: RateCounterRepository> RateLimiter<R> {
    pub fn new(counters: R, window: Duration) -> Self {
        Self { counters, window }
    }

    /// True when the request fits within `limit` for the key's window.
    /// A zero limit denies everything; the attempt is still counted.
    pub async fn check(&self, key: &str, limit: u32) -> TenetResult<bool> {
        let count = self.counters.increment(key, self.window).await?;
        Ok(limit > 0 && count <= u64::from(limit))
    }
}
