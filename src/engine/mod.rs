//! Mutate-then-reconcile engine.
//!
//! The pieces the orchestrator sequences for each lifecycle call:
//! classification of observations, the per-call deadline, the polling loop,
//! identity persistence, state reconciliation and Read-path drift correction.

mod classifier;
mod deadline;
mod drift;
mod persister;
mod reconcile;
mod wait;

pub use classifier::{Classification, StatusClassifier, StatusTable};
pub use deadline::{Deadline, Expiry};
pub use drift::{DriftCorrection, DriftCorrector, DriftReport};
pub use persister::IdentityPersister;
pub use reconcile::{FinalState, StateReconciler};
pub use wait::{WaitEngine, WaitOutcome, WaitReport};
