//! Per-call cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::commons::error::Error;


//------------ CallContext ---------------------------------------------------

/// The context an operation runs under.
///
/// A context carries a cancellation signal and an optional deadline. Clones
/// share the same signal, so cancelling any clone cancels them all. Bounded
/// contexts derived via [`CallContext::bounded`] are cancelled along with
/// their parent but not the other way around.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        CallContext {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns a child context that expires after `timeout`.
    ///
    /// If the context already has a deadline, the caller chose it and it
    /// is kept as is.
    pub fn bounded(&self, timeout: Option<Duration>) -> Self {
        CallContext {
            cancel: self.cancel.child_token(),
            deadline: self
                .deadline
                .or_else(|| timeout.map(|timeout| Instant::now() + timeout)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns an error if the call should not go on.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Err(Error::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Runs `fut` until it completes or the context ends.
    ///
    /// If the context ends first, the future is dropped and the matching
    /// error returned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        self.check()?;
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = expired => Err(Error::DeadlineExceeded),
            res = fut => res,
        }
    }
}


//------------ Tests ---------------------------------------------------------
