//! Drift correction for the Read path.
//!
//! Fetches the current snapshot and overwrites local state field for field,
//! or removes it when the object is gone. A [`DriftReport`] records what
//! changed relative to the previously stored state.

use serde::Serialize;
use tracing::{info, warn};

use crate::control_plane::{Attributes, ControlPlane, Intent, RemoteSnapshot};
use crate::error::{ReconcileError, Result};
use crate::state::{AttributeHasher, ResourceIdentity, ResourceState, StateStore};

use super::classifier::StatusTable;
use super::deadline::Deadline;
use super::reconcile::{FinalState, StateReconciler};
use super::wait::{WaitEngine, WaitOutcome};

/// Differences between stored state and the remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Durable key of the object.
    pub key: String,
    /// Attributes whose value differs, was added or disappeared.
    pub changed_fields: Vec<String>,
    /// Whether the object no longer exists remotely.
    pub removed: bool,
    /// Hash of the previously stored attributes.
    pub previous_hash: Option<String>,
    /// Hash of the fetched snapshot.
    pub current_hash: Option<String>,
}

/// Result of a drift correction.
#[derive(Debug)]
pub struct DriftCorrection {
    /// State after correction.
    pub state: FinalState,
    /// What changed, when the fetch produced a verdict.
    pub drift: Option<DriftReport>,
    /// Fetch error, if the fetch did not produce a verdict.
    pub error: Option<ReconcileError>,
    /// Number of fetches issued.
    pub attempts: u32,
}

/// Read-path corrector.
#[derive(Debug)]
pub struct DriftCorrector<'a, P: ControlPlane, S: StateStore> {
    plane: &'a P,
    store: &'a S,
    engine: WaitEngine,
}

impl DriftReport {
    /// Compares stored state (if any) with a fresh snapshot.
    #[must_use]
    pub fn compare(key: &str, prior: Option<&ResourceState>, snapshot: &RemoteSnapshot) -> Self {
        let hasher = AttributeHasher::new();
        let empty = Attributes::new();
        let previous = prior.map_or(&empty, |p| &p.attributes);
        let current = snapshot.attributes();

        let mut changed_fields: Vec<String> = current
            .iter()
            .filter(|(field, value)| previous.get(*field) != Some(*value))
            .map(|(field, _)| field.clone())
            .collect();
        changed_fields.extend(
            previous
                .keys()
                .filter(|field| !current.contains_key(*field))
                .cloned(),
        );
        changed_fields.sort();

        Self {
            key: key.to_string(),
            changed_fields,
            removed: false,
            previous_hash: prior.map(|p| {
                p.snapshot_hash
                    .clone()
                    .unwrap_or_else(|| hasher.hash_attributes(&p.attributes))
            }),
            current_hash: Some(hasher.hash_attributes(current)),
        }
    }

    /// Report for an object that disappeared remotely.
    #[must_use]
    pub fn gone(key: &str, prior: Option<&ResourceState>) -> Self {
        Self {
            key: key.to_string(),
            changed_fields: Vec::new(),
            removed: prior.is_some(),
            previous_hash: prior.and_then(|p| p.snapshot_hash.clone()),
            current_hash: None,
        }
    }

    /// Returns true if anything differs.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.removed || !self.changed_fields.is_empty()
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.removed {
            write!(f, "{} no longer exists remotely", self.key)
        } else if self.changed_fields.is_empty() {
            write!(f, "No drift detected for {}", self.key)
        } else {
            writeln!(f, "Drift detected for {}:", self.key)?;
            for field in &self.changed_fields {
                writeln!(f, "  - {field}")?;
            }
            Ok(())
        }
    }
}

impl<'a, P: ControlPlane, S: StateStore> DriftCorrector<'a, P, S> {
    /// Creates a corrector.
    #[must_use]
    pub const fn new(plane: &'a P, store: &'a S, engine: WaitEngine) -> Self {
        Self {
            plane,
            store,
            engine,
        }
    }

    /// Refreshes the state of one object.
    ///
    /// Transient fetch failures are retried until the deadline; any other
    /// failure leaves the stored state untouched and is reported in
    /// [`DriftCorrection::error`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the state store fails.
    pub async fn correct(
        &self,
        kind: &str,
        identity: &ResourceIdentity,
        table: &StatusTable,
        deadline: &Deadline,
    ) -> Result<DriftCorrection> {
        let key = identity.key();
        let prior = self.store.load(&key).await?;

        let report = self
            .engine
            .wait(Intent::Read, table, deadline, || {
                self.plane.fetch_status(kind, identity)
            })
            .await;

        let drift = match &report.outcome {
            WaitOutcome::Succeeded(snapshot) => {
                Some(DriftReport::compare(&key, prior.as_ref(), snapshot))
            }
            WaitOutcome::AlreadyAbsent => Some(DriftReport::gone(&key, prior.as_ref())),
            _ => None,
        };
        let error = report.outcome.error_for(Intent::Read, &key);

        match (&drift, &error) {
            (Some(drift), _) if drift.has_drift() => info!("{drift}"),
            (_, Some(err)) => warn!("Read of {key} failed: {err}"),
            _ => {}
        }

        let state = StateReconciler::new(self.store)
            .apply(Intent::Read, kind, identity, report.outcome, prior)
            .await?;

        Ok(DriftCorrection {
            state,
            drift,
            error,
            attempts: report.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::testing::{FetchStep, ScriptedControlPlane};
    use crate::state::MemoryStateStore;
    use serde_json::json;
    use std::time::Duration;

    fn identity() -> ResourceIdentity {
        ResourceIdentity::new("proj", None, "zone-a", None)
    }

    fn stored(ttl: i64) -> ResourceState {
        let snapshot = RemoteSnapshot::new(Attributes::from([
            (String::from("name"), json!("example.com")),
            (String::from("ttl"), json!(ttl)),
        ]));
        ResourceState::complete("dns_zone", identity(), snapshot)
    }

    async fn correct(plane: &ScriptedControlPlane, store: &MemoryStateStore) -> DriftCorrection {
        DriftCorrector::new(plane, store, WaitEngine::new(Duration::from_millis(50)))
            .correct(
                "dns_zone",
                &identity(),
                &StatusTable::default(),
                &Deadline::after(Duration::from_secs(5)),
            )
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrites_changed_fields() {
        let store = MemoryStateStore::with_entries([stored(300)]);
        let plane = ScriptedControlPlane::new().with_fetch(FetchStep::found(
            &[("name", json!("example.com")), ("ttl", json!(60))],
            None,
        ));

        let correction = correct(&plane, &store).await;

        let drift = correction.drift.unwrap();
        assert_eq!(drift.changed_fields, vec![String::from("ttl")]);
        assert_ne!(drift.previous_hash, drift.current_hash);
        assert!(correction.error.is_none());
        assert_eq!(correction.state.state(), Some(&stored(60)));
        assert_eq!(store.load("proj/zone-a").await.unwrap(), Some(stored(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_drift_still_rewrites() {
        let store = MemoryStateStore::with_entries([stored(300)]);
        let plane = ScriptedControlPlane::new().with_fetch(FetchStep::found(
            &[("name", json!("example.com")), ("ttl", json!(300))],
            None,
        ));

        let correction = correct(&plane, &store).await;

        assert!(!correction.drift.unwrap().has_drift());
        assert_eq!(correction.state, FinalState::Present(stored(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gone_removes_state() {
        let store = MemoryStateStore::with_entries([stored(300)]);
        let plane = ScriptedControlPlane::new().with_fetch(FetchStep::status(410));

        let correction = correct(&plane, &store).await;

        assert_eq!(correction.state, FinalState::Removed);
        assert!(correction.drift.unwrap().removed);
        assert!(store.load("proj/zone-a").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_fetch_error_keeps_state() {
        let store = MemoryStateStore::with_entries([stored(300)]);
        let plane = ScriptedControlPlane::new().with_fetch(FetchStep::status(403));

        let correction = correct(&plane, &store).await;

        assert!(matches!(correction.error, Some(ReconcileError::FetchFailed { .. })));
        assert!(correction.drift.is_none());
        assert_eq!(correction.state, FinalState::Present(stored(300)));
        assert_eq!(correction.attempts, 1);
        assert_eq!(store.load("proj/zone-a").await.unwrap(), Some(stored(300)));
    }
}
