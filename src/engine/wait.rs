//! Poll-based wait engine.
//!
//! Repeatedly fetches an object's status, classifies each observation and
//! sleeps a fixed interval between attempts. Every fetch and every sleep is
//! raced against the call's [`Deadline`], so an expiring deadline returns
//! promptly instead of waiting for an in-flight request.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::control_plane::{FetchResponse, Intent, RemoteSnapshot, is_success_status};
use crate::error::{Observation, ReconcileError, Result};

use super::classifier::{Classification, StatusTable};
use super::deadline::{Deadline, Expiry};

/// Terminal result of a wait.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The object reached a stable state; carries its snapshot.
    Succeeded(RemoteSnapshot),
    /// The object does not exist.
    AlreadyAbsent,
    /// The deadline passed first.
    TimedOut(Observation),
    /// The caller canceled first.
    Canceled(Observation),
    /// Terminal remote failure or non-retryable fetch error.
    Failed(Observation),
}

/// Result of a wait plus what it took to get there.
#[derive(Debug, Clone)]
pub struct WaitReport {
    /// Terminal outcome.
    pub outcome: WaitOutcome,
    /// Number of fetches started.
    pub attempts: u32,
    /// Wall time spent waiting.
    pub elapsed: Duration,
}

/// Fixed-interval polling loop.
#[derive(Debug, Clone, Copy)]
pub struct WaitEngine {
    poll_interval: Duration,
}

impl WaitOutcome {
    fn expired(expiry: Expiry, last: Observation) -> Self {
        match expiry {
            Expiry::TimedOut => Self::TimedOut(last),
            Expiry::Canceled => Self::Canceled(last),
        }
    }

    /// Returns true for `Succeeded` and `AlreadyAbsent`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::AlreadyAbsent)
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::AlreadyAbsent => "already absent",
            Self::TimedOut(_) => "timed out",
            Self::Canceled(_) => "canceled",
            Self::Failed(_) => "failed",
        }
    }

    /// Maps a non-success outcome to the error surfaced to the caller.
    ///
    /// Expiry maps to the wait errors on every intent. On the Read path any
    /// other failure is a fetch failure; for mutations a failure without any
    /// response is a fetch failure too.
    #[must_use]
    pub fn error_for(&self, intent: Intent, key: &str) -> Option<ReconcileError> {
        let key = key.to_string();
        match self {
            Self::Succeeded(_) | Self::AlreadyAbsent => None,
            Self::Canceled(observation) => Some(ReconcileError::WaitCanceled {
                key,
                observation: observation.clone(),
            }),
            Self::TimedOut(observation) => Some(ReconcileError::WaitTimedOut {
                key,
                observation: observation.clone(),
            }),
            Self::Failed(observation) if intent == Intent::Read || observation.status.is_none() => {
                Some(ReconcileError::FetchFailed {
                    key,
                    observation: observation.clone(),
                })
            }
            Self::Failed(observation) => Some(ReconcileError::RemoteFailure {
                key,
                observation: observation.clone(),
            }),
        }
    }
}

impl WaitEngine {
    /// Creates an engine polling at the given interval.
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Polls `fetch` until a terminal classification or the deadline.
    pub async fn wait<F, Fut>(
        &self,
        intent: Intent,
        table: &StatusTable,
        deadline: &Deadline,
        mut fetch: F,
    ) -> WaitReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<FetchResponse>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last = Observation::default();

        let outcome = loop {
            if let Some(expiry) = deadline.check() {
                break WaitOutcome::expired(expiry, last);
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                expiry = deadline.expired() => break WaitOutcome::expired(expiry, last),
                result = fetch() => result,
            };

            match result {
                Ok(response) => {
                    last = observe(&response);
                    let class =
                        table.classify(intent, response.status, response.remote_status.as_deref());
                    debug!(
                        "Poll #{attempts} for {intent}: {} -> {class:?}",
                        last
                    );

                    match class {
                        Classification::Succeeded => match response.snapshot {
                            Some(snapshot) => break WaitOutcome::Succeeded(snapshot),
                            None => {
                                last.error =
                                    Some(String::from("success response carried no snapshot"));
                                break WaitOutcome::Failed(last);
                            }
                        },
                        Classification::AlreadyAbsent => break WaitOutcome::AlreadyAbsent,
                        Classification::RemoteFailure => break WaitOutcome::Failed(last),
                        Classification::StillPending => {}
                    }
                }
                Err(err) => {
                    let remote_status = last.remote_status.take();
                    last = Observation::transport_error(&err);
                    last.remote_status = remote_status;
                    if !err.is_retryable() {
                        warn!("Poll #{attempts} for {intent} failed: {err}");
                        break WaitOutcome::Failed(last);
                    }
                    debug!("Poll #{attempts} for {intent} failed, retrying: {err}");
                }
            }

            tokio::select! {
                biased;
                expiry = deadline.expired() => break WaitOutcome::expired(expiry, last),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        let elapsed = started.elapsed();
        info!(
            "Wait for {intent} {} after {attempts} attempt(s) in {}ms",
            outcome.label(),
            elapsed.as_millis()
        );

        WaitReport {
            outcome,
            attempts,
            elapsed,
        }
    }
}

fn observe(response: &FetchResponse) -> Observation {
    let mut observation = Observation::response(response.status, response.remote_status.clone());
    if !is_success_status(response.status) {
        observation.error.clone_from(&response.message);
    }
    observation
}
