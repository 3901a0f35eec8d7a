//! Cancellable background operations
//!
//! [`run_async`] starts a fallible future on its own tokio task and hands
//! back an [`AsyncUnit`]. The unit is waited on exactly once: both wait
//! methods take `self`, so a second wait does not compile.
//!
//! When [`AsyncUnit::wait_context`] loses the race against cancellation the
//! task is aborted. Dropping the in-flight future closes whatever socket it
//! was blocked on, so nothing keeps running after the caller has given up.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Error, SyncResult};

/// How a [`AsyncUnit::wait_context`] call ended
#[derive(Debug)]
pub enum WaitOutcome<T> {
    /// The token fired first; the operation was aborted
    Canceled,
    Failed(Error),
    Succeeded(T),
}

impl<T> WaitOutcome<T> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, WaitOutcome::Canceled)
    }

    /// Collapse into a result, reporting cancellation as context closed
    pub fn into_result(self) -> SyncResult<T> {
        match self {
            WaitOutcome::Canceled => Err(Error::context_closed()),
            WaitOutcome::Failed(err) => Err(err),
            WaitOutcome::Succeeded(value) => Ok(value),
        }
    }
}

/// One background operation and the single slot its result lands in
#[derive(Debug)]
pub struct AsyncUnit<T> {
    result: oneshot::Receiver<SyncResult<T>>,
    handle: JoinHandle<()>,
}

/// Start `operation` on a new task immediately
pub fn run_async<F, T>(operation: F) -> AsyncUnit<T>
where
    F: Future<Output = SyncResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        // The receiver is gone when the caller was canceled or dropped the unit.
        let _ = tx.send(operation.await);
    });

    AsyncUnit { result: rx, handle }
}

impl<T> AsyncUnit<T> {
    /// Block until the operation finishes
    pub async fn wait(self) -> SyncResult<T> {
        self.result.await.unwrap_or_else(|_| Err(lost_result()))
    }

    /// Block until the operation finishes or `token` is cancelled.
    ///
    /// An already-cancelled token always wins, even if the operation has
    /// completed in the meantime.
    pub async fn wait_context(self, token: &CancellationToken) -> WaitOutcome<T> {
        let AsyncUnit { result, handle } = self;

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                handle.abort();
                WaitOutcome::Canceled
            }
            outcome = result => match outcome {
                Ok(Ok(value)) => WaitOutcome::Succeeded(value),
                Ok(Err(err)) => WaitOutcome::Failed(err),
                Err(_) => WaitOutcome::Failed(lost_result()),
            },
        }
    }

    /// Whether the operation already finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn lost_result() -> Error {
    Error::internal("background operation ended without a result")
}
