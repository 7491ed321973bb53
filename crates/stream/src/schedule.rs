//! Deferred task scheduling
//!
//! Creation events are normalized only after a settling delay so companion
//! upstream data (metadata documents, indexer state) has time to appear.
//! Each deferred task runs on its own; scheduling never blocks the caller.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct DeferredScheduler {
    settle_delay: Duration,
}

impl DeferredScheduler {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Run `task` once the settling delay has elapsed
    pub fn schedule<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let delay = self.settle_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await
        })
    }
}
