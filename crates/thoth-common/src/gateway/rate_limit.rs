//! Token-bucket rate limiting, one bucket per named service.
//!
//! Guarantees FIFO among waiters for the same service (§5 ordering
//! guarantees) by queuing acquire attempts behind a `Mutex` and handing the
//! token to whichever waiter entered the queue first.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::{AppError, Result};

struct BucketState {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

impl BucketState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// A single service's token bucket. Process-global: one instance is shared
/// by every caller of that service.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    notify: Notify,
}

impl RateLimiter {
    /// `requests_per_second` is both the refill rate and the bucket
    /// capacity, so a caller can burst up to one second's budget.
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: requests_per_second,
                capacity: requests_per_second,
                refill_per_sec: requests_per_second,
                last_refill: Instant::now(),
                waiters: VecDeque::new(),
                next_ticket: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Block (cooperatively) until a token is available or `deadline`
    /// elapses, whichever is first.
    pub async fn acquire(&self, deadline: Duration) -> Result<()> {
        let start = Instant::now();
        let ticket = {
            let mut st = self.state.lock().await;
            let t = st.next_ticket;
            st.next_ticket += 1;
            st.waiters.push_back(t);
            t
        };

        loop {
            {
                let mut st = self.state.lock().await;
                st.refill();
                let is_front = st.waiters.front() == Some(&ticket);
                if is_front && st.tokens >= 1.0 {
                    st.tokens -= 1.0;
                    st.waiters.pop_front();
                    drop(st);
                    self.notify.notify_waiters();
                    return Ok(());
                }
            }

            if start.elapsed() >= deadline {
                let mut st = self.state.lock().await;
                st.waiters.retain(|t| *t != ticket);
                return Err(AppError::RateLimited(format!(
                    "rate limit deadline ({:?}) exceeded waiting for a token",
                    deadline
                )));
            }

            let remaining = deadline.saturating_sub(start.elapsed());
            let _ = tokio::time::timeout(remaining.min(Duration::from_millis(50)), self.notify.notified()).await;
        }
    }
}

/// Registry of per-service rate limiters, keyed by service name.
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: Mutex<std::collections::HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, service: &str, requests_per_second: f64) {
        let mut limiters = self.limiters.lock().await;
        limiters.insert(service.to_string(), Arc::new(RateLimiter::new(requests_per_second)));
    }

    pub async fn get(&self, service: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.lock().await.get(service).cloned()
    }
}
