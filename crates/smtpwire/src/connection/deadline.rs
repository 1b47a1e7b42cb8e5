//! Deadlines for session operations.
//!
//! Every suspending session call (connect, command, data transfer, close)
//! runs under a [`Deadline`]. The guarded future and its timer race; the
//! loser is dropped on the spot, so a finished operation never leaves a
//! timer behind and a timed-out operation never completes later.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{Error, Result};

/// Time limit applied to one operation.
///
/// A zero duration means the operation may run indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Duration);

impl Deadline {
    /// Creates a deadline that expires `duration` after the operation starts.
    #[must_use]
    pub const fn after(duration: Duration) -> Self {
        Self(duration)
    }

    /// Creates a deadline that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self(Duration::ZERO)
    }

    /// Returns the configured duration.
    #[must_use]
    pub const fn duration(self) -> Duration {
        self.0
    }

    /// Returns true if this deadline never expires.
    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        self.0.is_zero()
    }

    /// Runs `operation`, failing with [`Error::Timeout`] if it has not
    /// settled when the deadline expires.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or [`Error::Timeout`].
    pub async fn run<T, F>(self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_unbounded() {
            return operation.await;
        }

        timeout(self.0, operation)
            .await
            .unwrap_or(Err(Error::Timeout(self.0)))
    }
}

impl From<Duration> for Deadline {
    fn from(duration: Duration) -> Self {
        Self::after(duration)
    }
}
