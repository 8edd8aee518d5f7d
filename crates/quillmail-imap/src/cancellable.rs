//! Deadline-bounded, cancellable units of asynchronous work.
//!
//! A [`CancellableOperation`] races three things: the work itself, an
//! explicit [`cancel`](CancellableOperation::cancel), and a deadline. The
//! first to happen settles the operation; every later attempt is a no-op.
//!
//! The work runs on its own task and is **not** aborted when the deadline
//! elapses or when the operation is cancelled. It keeps running until it
//! finishes on its own and its result is discarded. Anything stateful it
//! holds (a socket half, for example) stays with it, so callers must treat a
//! timed-out resource as gone and rebuild it.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// How an operation was settled.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The work finished first (successfully or not).
    Completed(Result<T>),
    /// [`CancellableOperation::cancel`] was called first.
    Cancelled(Error),
    /// The deadline elapsed first.
    TimedOut {
        /// Description given when the operation was started.
        operation: String,
        /// The deadline that elapsed.
        duration: Duration,
    },
}

impl<T> Outcome<T> {
    /// Flattens the outcome into a result.
    ///
    /// # Errors
    ///
    /// Returns the work's error, the cancellation reason, or
    /// [`Error::Timeout`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Completed(result) => result,
            Self::Cancelled(reason) => Err(reason),
            Self::TimedOut {
                operation,
                duration,
            } => Err(Error::timeout(operation, duration)),
        }
    }

    /// Returns true if the deadline settled the operation.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Shared settle-once state.
struct Settlement<T> {
    sender: Mutex<Option<oneshot::Sender<Outcome<T>>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Settlement<T> {
    /// Delivers `outcome` if nothing settled before. Clears the timer either way.
    fn settle(&self, outcome: Outcome<T>) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.clear_timer();

        match sender {
            Some(sender) => {
                // The receiver may be gone already; settlement still counts.
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    fn clear_timer(&self) {
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }

    fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn timer_active(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

/// A unit of asynchronous work bounded by a deadline.
pub struct CancellableOperation<T> {
    settlement: Arc<Settlement<T>>,
    outcome: oneshot::Receiver<Outcome<T>>,
}

impl<T: Send + 'static> CancellableOperation<T> {
    /// Starts `work` on its own task with a deadline of `timeout`.
    ///
    /// `description` names the operation in the resulting timeout error.
    /// Must be called from within a Tokio runtime.
    pub fn start<W, F>(work: W, timeout: Duration, description: impl Into<String>) -> Self
    where
        W: FnOnce() -> F,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, outcome) = oneshot::channel();
        let settlement = Arc::new(Settlement {
            sender: Mutex::new(Some(sender)),
            timer: Mutex::new(None),
        });

        let operation = description.into();
        let timer_settlement = Arc::clone(&settlement);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_settlement.settle(Outcome::TimedOut {
                operation,
                duration: timeout,
            }) {
                tracing::debug!(?timeout, "operation deadline elapsed");
            }
        });
        *settlement
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(timer);

        let future = work();
        let work_settlement = Arc::clone(&settlement);
        tokio::spawn(async move {
            let result = future.await;
            work_settlement.settle(Outcome::Completed(result));
        });

        Self {
            settlement,
            outcome,
        }
    }

    /// Settles the operation with `reason` unless it is already settled.
    ///
    /// Returns true if this call decided the outcome.
    pub fn cancel(&self, reason: Error) -> bool {
        self.settlement.settle(Outcome::Cancelled(reason))
    }

    /// Stops the deadline; the operation then settles only by completion or
    /// cancellation.
    pub fn disable_timeout(&self) {
        self.settlement.clear_timer();
    }

    /// Returns a handle that can cancel this operation from elsewhere.
    #[must_use]
    pub fn canceller(&self) -> Canceller<T> {
        Canceller {
            settlement: Arc::clone(&self.settlement),
        }
    }

    /// Returns true once an outcome has been decided.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    /// Returns true while the deadline timer is still armed.
    #[must_use]
    pub fn is_timer_active(&self) -> bool {
        self.settlement.timer_active()
    }

    /// Waits for the outcome.
    pub async fn outcome(self) -> Outcome<T> {
        match self.outcome.await {
            Ok(outcome) => outcome,
            // Only reachable if every holder of the settlement went away
            // without settling it.
            Err(_) => Outcome::Completed(Err(Error::connection("operation task aborted"))),
        }
    }

    /// Waits for the outcome and flattens it into a result.
    ///
    /// # Errors
    ///
    /// See [`Outcome::into_result`].
    pub async fn wait(self) -> Result<T> {
        self.outcome().await.into_result()
    }
}

impl<T> std::fmt::Debug for CancellableOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableOperation")
            .field("settled", &self.settlement.is_settled())
            .finish_non_exhaustive()
    }
}

/// Cancels a [`CancellableOperation`] from another owner.
pub struct Canceller<T> {
    settlement: Arc<Settlement<T>>,
}

impl<T> Canceller<T> {
    /// See [`CancellableOperation::cancel`].
    pub fn cancel(&self, reason: Error) -> bool {
        self.settlement.settle(Outcome::Cancelled(reason))
    }

    /// Returns true once an outcome has been decided.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }
}

impl<T> Clone for Canceller<T> {
    fn clone(&self) -> Self {
        Self {
            settlement: Arc::clone(&self.settlement),
        }
    }
}

impl<T> std::fmt::Debug for Canceller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canceller")
            .field("settled", &self.settlement.is_settled())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completion_wins() {
        let op = CancellableOperation::start(
            || async { Ok(42) },
            Duration::from_secs(5),
            "answer",
        );
        while !op.is_settled() {
            tokio::task::yield_now().await;
        }
        assert!(!op.cancel(Error::connection("too late")));
        assert_eq!(op.wait().await.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_later_completion() {
        let op = CancellableOperation::start(
            || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(1)
            },
            Duration::from_secs(5),
            "slow",
        );
        assert!(op.cancel(Error::connection("closing")));
        assert!(!op.is_timer_active());

        tokio::time::sleep(Duration::from_secs(2)).await;
        match op.outcome().await {
            Outcome::Cancelled(Error::Connection { message, .. }) => assert_eq!(message, "closing"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_work_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let op = CancellableOperation::start(
            move || async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
            Duration::from_secs(1),
            "ghost",
        );

        match op.outcome().await {
            Outcome::TimedOut {
                operation,
                duration,
            } => {
                assert_eq!(operation, "ghost");
                assert_eq!(duration, Duration::from_secs(1));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!finished.load(Ordering::SeqCst));

        // The work was not aborted and still runs to completion.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_cleared_after_completion() {
        let op = CancellableOperation::start(
            || async { Ok("done") },
            Duration::from_secs(1),
            "quick",
        );
        while !op.is_settled() {
            tokio::task::yield_now().await;
        }
        assert!(!op.is_timer_active());

        // No timeout can fire any more.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(op.wait().await.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_timeout() {
        let op = CancellableOperation::start(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(7)
            },
            Duration::from_secs(1),
            "unbounded",
        );
        op.disable_timeout();
        assert!(!op.is_timer_active());
        assert_eq!(op.wait().await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceller_from_other_owner() {
        let op = CancellableOperation::start(
            std::future::pending::<Result<()>>,
            Duration::from_secs(60),
            "forever",
        );
        let canceller = op.canceller();
        tokio::spawn(async move {
            canceller.cancel(Error::connection("force closed"));
        });
        assert!(matches!(op.wait().await, Err(Error::Connection { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_error_is_completed() {
        let op = CancellableOperation::<()>::start(
            || async { Err(Error::NotConnected) },
            Duration::from_secs(1),
            "failing",
        );
        match op.outcome().await {
            Outcome::Completed(Err(Error::NotConnected)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
