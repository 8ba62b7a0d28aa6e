//! Sliding-window send limiter.
//!
//! Window state lives in this process only. Several gateway instances behind
//! a load balancer each keep their own windows, so a sender spread across
//! instances can exceed the ceiling.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::{ChatError, ChatResult};

/// Ceiling of `max_sends` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_sends: usize,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_sends: usize, window: Duration) -> Self {
        Self { max_sends, window }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    limit: RateLimit,
    windows: Arc<DashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: RateLimit) -> Self {
        Self {
            name,
            limit,
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Records a send attempt for `sender_key` and rejects it when the window
    /// already holds the ceiling. Rejected attempts still occupy the window.
    pub fn check(&self, sender_key: &str) -> ChatResult<()> {
        let now = Instant::now();
        let mut window = self.windows.entry(sender_key.to_string()).or_default();
        while window
            .front()
            .is_some_and(|sent| now.duration_since(*sent) >= self.limit.window)
        {
            window.pop_front();
        }
        window.push_back(now);

        if window.len() > self.limit.max_sends {
            tracing::debug!(
                limiter = self.name,
                sender = sender_key,
                attempts = window.len(),
                "send rejected by rate limiter"
            );
            return Err(ChatError::RateLimitExceeded);
        }
        Ok(())
    }

    /// Drops timestamps older than the window and forgets idle senders.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window_len = self.limit.window;
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.retain(|sent| now.duration_since(*sent) < window_len);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }

    /// Sweeps every `interval` until the runtime shuts down.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let dropped = limiter.sweep();
                if dropped > 0 {
                    tracing::debug!(
                        limiter = limiter.name,
                        dropped,
                        tracked = limiter.tracked_senders(),
                        "swept idle rate windows"
                    );
                }
            }
        })
    }
}
