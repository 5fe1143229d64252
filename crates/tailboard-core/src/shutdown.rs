//! Caller-controlled cancellation for the polling loop.
//!
//! A [`ShutdownSignal`] is shared (usually in an [`Arc`]) between the task
//! running [`Scheduler::run`] and whoever decides when to stop, such as a
//! Ctrl-C handler. Requesting a stop also wakes a loop that is sleeping
//! between idle rounds.
//!
//! [`Arc`]: std::sync::Arc
//! [`Scheduler::run`]: crate::scheduler::Scheduler::run

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared stop flag with wake-up.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stop_requested: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a clean stop and wake any waiter.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested. Returns immediately if it already was.
    pub async fn stopped(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn starts_unfired() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_stop_requested());
        signal.request_stop();
        assert!(signal.is_stop_requested());
    }

    #[tokio::test]
    async fn stopped_returns_once_fired() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request_stop();

        let joined = tokio::time::timeout(Duration::from_secs(5), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn stopped_after_fire_is_immediate() {
        let signal = ShutdownSignal::new();
        signal.request_stop();
        let waited = tokio::time::timeout(Duration::from_secs(1), signal.stopped()).await;
        assert!(waited.is_ok());
    }
}
