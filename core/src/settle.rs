//! Waiting for the page to finish re-rendering after a mutation.

use crate::page::Page;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Default pause after a mutating step.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Capability the runners await after mutating actions and between steps.
#[async_trait]
pub trait Settle: Send + Sync {
    async fn settle(&self, page: &dyn Page);
}

/// Sleep for a fixed time regardless of page activity.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_SETTLE_DELAY)
    }
}

#[async_trait]
impl Settle for FixedDelay {
    async fn settle(&self, _page: &dyn Page) {
        if !self.0.is_zero() {
            sleep(self.0).await;
        }
    }
}

/// Return at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

#[async_trait]
impl Settle for Immediate {
    async fn settle(&self, _page: &dyn Page) {}
}

/// Poll the page's mutation revision until it has not moved for
/// `stable_for`, giving up after `max_wait`.
#[derive(Debug, Clone, Copy)]
pub struct Quiescence {
    pub poll: Duration,
    pub stable_for: Duration,
    pub max_wait: Duration,
}

impl Default for Quiescence {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            stable_for: Duration::from_millis(50),
            max_wait: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl Settle for Quiescence {
    async fn settle(&self, page: &dyn Page) {
        let started = Instant::now();
        let mut last = page.revision();
        let mut quiet_since = Instant::now();
        loop {
            sleep(self.poll).await;
            let revision = page.revision();
            if revision != last {
                last = revision;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= self.stable_for {
                break;
            }
            if started.elapsed() >= self.max_wait {
                trace!(revision, "settle gave up waiting for quiescence");
                break;
            }
        }
    }
}
