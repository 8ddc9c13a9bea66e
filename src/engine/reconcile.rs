//! Applies a wait outcome to durable state.
//!
//! Only confirmed remote snapshots are ever written here. Planned values
//! never reach the store: a non-success outcome leaves the prior state as
//! it was.

use serde::Serialize;
use tracing::{debug, info};

use crate::control_plane::Intent;
use crate::error::Result;
use crate::state::{ResourceIdentity, ResourceState, StateStore};

use super::wait::WaitOutcome;

/// What the durable state looks like after a lifecycle call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "state", rename_all = "lowercase")]
pub enum FinalState {
    /// The object is tracked with this state.
    Present(ResourceState),
    /// The object is no longer tracked.
    Removed,
    /// Nothing was ever tracked for this call.
    Untracked,
    /// The store could not be read; nothing was written.
    Unknown,
}

/// Writes the result of a wait into the state store.
#[derive(Debug)]
pub struct StateReconciler<'a, S: StateStore> {
    store: &'a S,
}

impl FinalState {
    /// State that was there before the call.
    #[must_use]
    pub fn unchanged(prior: Option<ResourceState>) -> Self {
        prior.map_or(Self::Untracked, Self::Present)
    }

    /// Short label for logs and output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Present(state) if state.is_complete() => "complete",
            Self::Present(_) => "partial",
            Self::Removed => "removed",
            Self::Untracked => "untracked",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the tracked state, if any.
    #[must_use]
    pub const fn state(&self) -> Option<&ResourceState> {
        match self {
            Self::Present(state) => Some(state),
            _ => None,
        }
    }
}

impl<'a, S: StateStore> StateReconciler<'a, S> {
    /// Creates a reconciler writing to `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Applies `outcome` for `intent`.
    ///
    /// `prior` is the state as it was before the wait (the partial state for
    /// Create). It is returned untouched whenever the outcome is not a
    /// success for this intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn apply(
        &self,
        intent: Intent,
        kind: &str,
        identity: &ResourceIdentity,
        outcome: WaitOutcome,
        prior: Option<ResourceState>,
    ) -> Result<FinalState> {
        let key = identity.key();

        match (intent, outcome) {
            (Intent::Delete, WaitOutcome::Succeeded(_) | WaitOutcome::AlreadyAbsent)
            | (Intent::Read, WaitOutcome::AlreadyAbsent) => {
                self.store.remove(&key).await?;
                info!("Removed state for {key} after {intent}");
                Ok(FinalState::Removed)
            }
            (_, WaitOutcome::Succeeded(snapshot)) => {
                let state = ResourceState::complete(kind, identity.clone(), snapshot);
                self.store.commit(&state).await?;
                info!("Reconciled {key} from remote snapshot after {intent}");
                Ok(FinalState::Present(state))
            }
            (_, outcome) => {
                debug!("Leaving state for {key} untouched after {intent} {}", outcome.label());
                Ok(FinalState::unchanged(prior))
            }
        }
    }
}
