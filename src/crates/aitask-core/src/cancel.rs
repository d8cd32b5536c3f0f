//! Cooperative cancellation
//!
//! A [`CancelSignal`] is threaded explicitly through every async call that
//! participates in a generation: the registry, workflows, the validation-retry
//! wrapper, transforms, tools and the provider call. Each suspension point
//! races its work against the signal, so triggering it drops the in-flight
//! future (and with it any network stream) instead of merely ignoring its
//! output.
//!
//! Signals form a tree. [`CancelSignal::child`] creates a scope that is
//! cancelled with its parent but can also be cancelled on its own, which is
//! how a single rejected attempt is aborted without stopping the task.

use crate::error::{Result, TaskError};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation handle shared between the owner of a run and its workers
#[derive(Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl CancelSignal {
    /// Create a new, untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope that is cancelled whenever this signal is
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Cancellation requested");
        }
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Return [`TaskError::Cancelled`] if cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive `future` to completion unless cancellation wins the race.
    ///
    /// The future is dropped as soon as the signal fires.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Cancelled),
            value = future => Ok(value),
        }
    }

    /// Like [`CancelSignal::run`] for futures that already return a `Result`
    pub async fn run_fallible<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.run(future).await?
    }

    /// Sleep for `duration`, returning early with `Cancelled` if triggered
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<()> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_signal_is_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());
    }

    #[test]
    fn test_child_follows_parent_but_not_the_reverse() {
        let parent = CancelSignal::new();
        let first = parent.child();
        first.cancel();
        assert!(first.is_cancelled());
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
        assert!(matches!(second.check(), Err(TaskError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_returns_cancelled_when_triggered() {
        let signal = CancelSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = signal.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(TaskError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancellation() {
        let signal = CancelSignal::new();
        assert!(signal.sleep(Duration::from_secs(5)).await.is_ok());
    }
}
