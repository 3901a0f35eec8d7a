//! Constant-interval retry driven by error classification

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, ErrorKind};

/// Fixed delay between attempts, optionally capped in attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackoff {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl ConstantBackoff {
    /// Retry forever, waiting `interval` between attempts
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Stop after `attempts` attempts in total
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Failure of one attempt, as judged by the caller
#[derive(Debug)]
pub enum Backoff {
    /// Try again after the interval
    Transient(Error),
    /// Give up now
    Permanent(Error),
}

/// Why [`retry`] stopped without a success
#[derive(Debug)]
pub enum RetryError {
    /// The token fired before or between attempts
    Canceled,
    /// A permanent failure, or the last failure once attempts ran out
    Stopped(Error),
}

impl RetryError {
    /// Whether the token stopped the loop, directly or through an attempt
    /// that observed it
    pub fn is_canceled(&self) -> bool {
        match self {
            RetryError::Canceled => true,
            RetryError::Stopped(err) => err.kind() == ErrorKind::ContextClosed,
        }
    }

    /// Flatten into an engine error, reporting cancellation as context closed
    pub fn into_error(self) -> Error {
        match self {
            RetryError::Canceled => Error::context_closed(),
            RetryError::Stopped(err) => err,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts or `token` is cancelled. `operation` receives the 1-based
/// attempt number.
pub async fn retry<T, F, Fut>(
    policy: &ConstantBackoff,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Backoff>>,
{
    let mut attempt = 0u32;

    loop {
        if token.is_cancelled() {
            return Err(RetryError::Canceled);
        }
        attempt += 1;

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(Backoff::Permanent(err)) => return Err(RetryError::Stopped(err)),
            Err(Backoff::Transient(err)) => err,
        };

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(RetryError::Stopped(err));
        }

        tokio::select! {
            _ = token.cancelled() => return Err(RetryError::Canceled),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}
