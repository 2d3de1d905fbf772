//! Domain Rate Limiter (C7).
//!
//! Generalises `middleware::rate_limit`'s per-IP sliding-window HTTP
//! rate limiter into a per-domain minimum-inter-acquire delay:
//! `acquire(domain)` blocks until `now >= last_release(domain) +
//! d(domain)`, then stamps the release time and returns. Exactly one
//! fetch to a given domain may proceed at a time, and successive
//! fetches are spaced by at least `d`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
pub struct DomainRateLimiter {
    default_delay: Duration,
    domain_delays: Arc<HashMap<String, Duration>>,
    state: Arc<Mutex<HashMap<String, Instant>>>,
}

impl DomainRateLimiter {
    pub fn new(default_delay: Duration, domain_delays: HashMap<String, Duration>) -> Self {
        Self {
            default_delay,
            domain_delays: Arc::new(domain_delays),
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn delay_for(&self, domain: &str) -> Duration {
        self.domain_delays
            .get(domain)
            .copied()
            .unwrap_or(self.default_delay)
    }

    /// Blocks the caller until this domain's token is available, then
    /// stamps the release time. Cancellation-safe: if the returned
    /// future is dropped before completion (e.g. by `tokio::select!`),
    /// the token is never stamped, so no acquisition is lost.
    pub async fn acquire(&self, domain: &str) {
        let delay = self.delay_for(domain);
        loop {
            let wait = {
                let guard = self.state.lock();
                match guard.get(domain) {
                    Some(&last) => {
                        let ready_at = last + delay;
                        let now = Instant::now();
                        if now >= ready_at {
                            None
                        } else {
                            Some(ready_at - now)
                        }
                    }
                    None => None,
                }
            };

            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => break,
            }
        }

        let mut guard = self.state.lock();
        // Re-check under the lock: another caller may have raced us
        // between the sleep above and this stamp.
        let now = Instant::now();
        let ready = match guard.get(domain) {
            Some(&last) => now >= last + delay,
            None => true,
        };
        if ready {
            guard.insert(domain.to_string(), now);
        } else {
            drop(guard);
            // Lost the race; recurse to wait out the new holder's window.
            Box::pin(self.acquire(domain)).await;
        }
    }
}
