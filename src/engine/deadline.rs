//! Per-call deadline and cancellation signal.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Longest budget a deadline carries; larger timeouts are clamped to it.
const MAX_BUDGET: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The time budget ran out.
    TimedOut,
    /// The caller canceled the call.
    Canceled,
}

/// Absolute deadline plus a cancellation token.
///
/// Cloning is cheap; clones share the token, so canceling one cancels all.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Deadline `timeout` from now with a fresh token.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::with_token(timeout, CancellationToken::new())
    }

    /// Deadline `timeout` from now, canceled through `token`.
    ///
    /// Timeouts beyond thirty years are clamped so the instant never overflows.
    #[must_use]
    pub fn with_token(timeout: Duration, token: CancellationToken) -> Self {
        Self {
            at: Instant::now() + timeout.min(MAX_BUDGET),
            token,
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Time left before the deadline, zero once passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Non-blocking check. Cancellation wins over a simultaneous timeout.
    #[must_use]
    pub fn check(&self) -> Option<Expiry> {
        if self.token.is_cancelled() {
            Some(Expiry::Canceled)
        } else if Instant::now() >= self.at {
            Some(Expiry::TimedOut)
        } else {
            None
        }
    }

    /// Resolves as soon as the deadline passes or the token is canceled.
    pub async fn expired(&self) -> Expiry {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Expiry::Canceled,
            () = sleep_until(self.at) => Expiry::TimedOut,
        }
    }
}
