use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time source for the dispatcher. Swapped out in tests so backoff can be
/// observed without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Linear backoff: the wait before in-invocation attempt `k` is `base * k`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub base: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// `attempt` is 1-based within one dispatcher invocation. The first attempt
    /// never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.base.saturating_mul(attempt)
        }
    }
}
