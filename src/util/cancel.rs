//! Cooperative cancellation.
//!
//! A [`CancellationSource`] owns the right to cancel; the
//! [`CancellationToken`]s it hands out can only observe.
//!
//! Work checks its token at suspension points, either synchronously with
//! [`CancellationToken::check`] or by racing [`CancellationToken::cancelled`]
//! against the awaited future.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::core::errors::BuildError;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelState {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A read-only handle that observes cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn none() -> Self {
        CancellationToken {
            state: Arc::new(CancelState::default()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Fail with [`BuildError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), BuildError> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a concurrent cancel
            // cannot slip between the check and the wait.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        CancellationToken::none()
    }
}

/// Controls a family of cancellation tokens.
#[derive(Debug, Default)]
pub struct CancellationSource {
    state: Arc<CancelState>,
}

impl CancellationSource {
    pub fn new() -> Self {
        CancellationSource::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Arc::clone(&self.state),
        }
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_sets_flag() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        source.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(BuildError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_future_wakes() {
        let source = CancellationSource::new();
        let token = source.token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_none_token_never_fires() {
        let token = CancellationToken::none();
        let res = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(res.is_err());
    }
}
