//! Lifecycle orchestration.
//!
//! This module sequences one lifecycle call: validate the request, dispatch
//! the mutation (or go straight to the fetch for a Read), persist the new
//! identity for a Create, wait for the remote object to settle, and apply
//! the outcome to durable state.

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::control_plane::{
    Attributes, ControlPlane, Intent, MutationRequest, MutationResponse, MutationTarget, Scope,
};
use crate::engine::{
    Deadline, DriftCorrector, DriftReport, FinalState, IdentityPersister, StateReconciler,
    StatusClassifier, WaitEngine, WaitOutcome,
};
use crate::error::{ConfigError, LifecycleError, ReconcileError, Result};
use crate::state::{ResourceIdentity, ResourceState, StateStore};

/// One lifecycle call.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleRequest {
    /// Create a new object in `scope`.
    Create {
        /// Resource type.
        kind: String,
        /// Where to create it.
        scope: Scope,
        /// Requested attributes.
        payload: Attributes,
    },
    /// Refresh the state of an object.
    Read {
        /// Resource type.
        kind: String,
        /// Object to read.
        identity: ResourceIdentity,
    },
    /// Modify an existing object.
    Update {
        /// Resource type.
        kind: String,
        /// Object to modify.
        identity: ResourceIdentity,
        /// Requested attributes.
        payload: Attributes,
    },
    /// Remove an object.
    Delete {
        /// Resource type.
        kind: String,
        /// Object to remove.
        identity: ResourceIdentity,
    },
}

/// Outcome of one lifecycle call: the final state and the error, if any.
#[derive(Debug)]
pub struct Reconciliation {
    /// Identifier tagging every log line of this call.
    pub operation_id: Uuid,
    /// Intent of the call.
    pub intent: Intent,
    /// Resource type.
    pub kind: String,
    /// Durable key, once known.
    pub key: Option<String>,
    /// State after the call.
    pub state: FinalState,
    /// Drift observed on the Read path.
    pub drift: Option<DriftReport>,
    /// Number of status fetches issued.
    pub attempts: u32,
    /// Error surfaced to the caller.
    pub error: Option<LifecycleError>,
}

/// Lifecycle orchestrator.
pub struct Reconciler<'a, P: ControlPlane, S: StateStore> {
    /// Configuration.
    config: &'a LifecycleConfig,
    /// Control plane client.
    plane: &'a P,
    /// State store.
    store: &'a S,
    /// Terminal-status tables per kind.
    classifier: StatusClassifier,
}

impl LifecycleRequest {
    /// Returns the intent of the request.
    #[must_use]
    pub const fn intent(&self) -> Intent {
        match self {
            Self::Create { .. } => Intent::Create,
            Self::Read { .. } => Intent::Read,
            Self::Update { .. } => Intent::Update,
            Self::Delete { .. } => Intent::Delete,
        }
    }

    /// Returns the resource type of the request.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Create { kind, .. }
            | Self::Read { kind, .. }
            | Self::Update { kind, .. }
            | Self::Delete { kind, .. } => kind,
        }
    }

    /// Returns the durable key, unless the object does not exist yet.
    #[must_use]
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Create { .. } => None,
            Self::Read { identity, .. }
            | Self::Update { identity, .. }
            | Self::Delete { identity, .. } => Some(identity.key()),
        }
    }
}

impl Reconciliation {
    fn begin(operation_id: Uuid, request: &LifecycleRequest) -> Self {
        Self {
            operation_id,
            intent: request.intent(),
            kind: request.kind().to_string(),
            key: request.key(),
            state: FinalState::Untracked,
            drift: None,
            attempts: 0,
            error: None,
        }
    }

    fn failed(mut self, error: impl Into<LifecycleError>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if the call finished without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into the final state, or the error.
    ///
    /// # Errors
    ///
    /// Returns the error of the call, if any.
    pub fn into_result(self) -> Result<FinalState> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.state),
        }
    }
}

impl<'a, P: ControlPlane, S: StateStore> Reconciler<'a, P, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(config: &'a LifecycleConfig, plane: &'a P, store: &'a S) -> Self {
        Self {
            config,
            plane,
            store,
            classifier: StatusClassifier::from_types(&config.resource_types),
        }
    }

    /// Builds a fresh deadline for a call on `kind`.
    #[must_use]
    pub fn deadline_for(&self, kind: &str) -> Deadline {
        Deadline::after(self.config.timeout(kind))
    }

    /// Runs one lifecycle call to completion.
    ///
    /// Never panics and never returns early: every failure is reported in
    /// [`Reconciliation::error`] alongside whatever state was committed.
    pub async fn reconcile(
        &self,
        request: LifecycleRequest,
        deadline: &Deadline,
    ) -> Reconciliation {
        let operation_id = Uuid::new_v4();
        let span = info_span!(
            "reconcile",
            operation = %operation_id,
            intent = %request.intent(),
            kind = request.kind()
        );

        async move {
            let out = Reconciliation::begin(operation_id, &request);
            info!("Starting {} of {}", out.intent, out.kind);

            if let Err(err) = self.validate(&request) {
                return out.failed(err);
            }

            let out = match request {
                LifecycleRequest::Create {
                    kind,
                    scope,
                    payload,
                } => self.create(out, &kind, scope, payload, deadline).await,
                LifecycleRequest::Read { kind, identity } => {
                    self.read(out, &kind, &identity, deadline).await
                }
                LifecycleRequest::Update {
                    kind,
                    identity,
                    payload,
                } => self.update(out, &kind, identity, payload, deadline).await,
                LifecycleRequest::Delete { kind, identity } => {
                    self.delete(out, &kind, identity, deadline).await
                }
            };

            match &out.error {
                Some(err) => warn!("{} of {} failed: {err}", out.intent, out.kind),
                None => info!("{} of {} finished: {}", out.intent, out.kind, out.state.label()),
            }
            out
        }
        .instrument(span)
        .await
    }

    /// Checks the request before anything is dispatched.
    fn validate(&self, request: &LifecycleRequest) -> Result<()> {
        let kind = request.kind();
        let rtype = self.config.resource_type(kind).ok_or_else(|| ConfigError::UnknownKind {
            kind: kind.to_string(),
        })?;

        let invalid = |message: String| ReconcileError::InvalidRequest { message };

        match request {
            LifecycleRequest::Create { scope, .. } => {
                if scope.project.is_empty() {
                    return Err(invalid(String::from("project cannot be empty")).into());
                }
                match scope.region.as_deref() {
                    Some("") => return Err(invalid(String::from("region cannot be empty")).into()),
                    None if rtype.requires_region() => {
                        return Err(invalid(format!("{kind} requires a region")).into());
                    }
                    _ => {}
                }
            }
            LifecycleRequest::Read { identity, .. }
            | LifecycleRequest::Update { identity, .. }
            | LifecycleRequest::Delete { identity, .. } => {
                identity.validate().map_err(invalid)?;
            }
        }

        Ok(())
    }

    fn engine(&self, kind: &str) -> WaitEngine {
        WaitEngine::new(self.config.poll_interval(kind))
    }

    /// Dispatches a mutation; non-2xx responses become `MutationRejected`,
    /// except 404/410 for a Delete.
    async fn dispatch(&self, request: &MutationRequest) -> Result<MutationResponse> {
        info!("Dispatching {} of {}", request.intent, request.kind);
        let response = self.plane.mutate(request).await?;

        if response.is_success() || (request.intent == Intent::Delete && response.is_absent()) {
            return Ok(response);
        }

        Err(ReconcileError::MutationRejected {
            intent: request.intent,
            kind: request.kind.clone(),
            status: response.status,
            message: response
                .message
                .unwrap_or_else(|| format!("status {}", response.status)),
        }
        .into())
    }

    async fn wait(
        &self,
        out: &mut Reconciliation,
        intent: Intent,
        kind: &str,
        identity: &ResourceIdentity,
        deadline: &Deadline,
    ) -> WaitOutcome {
        let engine = self.engine(kind);
        debug!(
            "Waiting for {} every {:?}, {:?} left",
            identity.key(),
            engine.poll_interval(),
            deadline.remaining()
        );
        let report = engine
            .wait(intent, self.classifier.table(kind), deadline, || {
                self.plane.fetch_status(kind, identity)
            })
            .await;
        out.attempts = report.attempts;
        report.outcome
    }

    /// Applies a wait outcome and records the resulting state and error.
    async fn settle(
        &self,
        mut out: Reconciliation,
        kind: &str,
        identity: &ResourceIdentity,
        outcome: WaitOutcome,
        prior: Option<ResourceState>,
    ) -> Reconciliation {
        let error = outcome.error_for(out.intent, &identity.key());
        let fallback = FinalState::unchanged(prior.clone());

        match StateReconciler::new(self.store)
            .apply(out.intent, kind, identity, outcome, prior)
            .await
        {
            Ok(state) => {
                out.state = state;
                out.error = error.map(LifecycleError::from);
                out
            }
            Err(err) => {
                if let Some(wait_error) = error {
                    warn!("Discarding wait error after state failure: {wait_error}");
                }
                out.state = fallback;
                out.failed(err)
            }
        }
    }

    async fn create(
        &self,
        mut out: Reconciliation,
        kind: &str,
        scope: Scope,
        payload: Attributes,
        deadline: &Deadline,
    ) -> Reconciliation {
        let request = MutationRequest {
            intent: Intent::Create,
            kind: kind.to_string(),
            target: MutationTarget::Collection(scope.clone()),
            payload,
        };

        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => return out.failed(err),
        };

        let partial = match IdentityPersister::new(self.store)
            .persist(kind, &scope, &response)
            .await
        {
            Ok(partial) => partial,
            Err(err) => return out.failed(err),
        };

        let identity = partial.identity.clone();
        out.key = Some(identity.key());
        out.state = FinalState::Present(partial.clone());

        let outcome = self.wait(&mut out, Intent::Create, kind, &identity, deadline).await;
        self.settle(out, kind, &identity, outcome, Some(partial)).await
    }

    async fn read(
        &self,
        mut out: Reconciliation,
        kind: &str,
        identity: &ResourceIdentity,
        deadline: &Deadline,
    ) -> Reconciliation {
        let corrector = DriftCorrector::new(self.plane, self.store, self.engine(kind));

        match corrector
            .correct(kind, identity, self.classifier.table(kind), deadline)
            .await
        {
            Ok(correction) => {
                out.state = correction.state;
                out.drift = correction.drift;
                out.attempts = correction.attempts;
                out.error = correction.error.map(LifecycleError::from);
                out
            }
            Err(err) => {
                out.state = FinalState::Unknown;
                out.failed(err)
            }
        }
    }

    async fn update(
        &self,
        mut out: Reconciliation,
        kind: &str,
        identity: ResourceIdentity,
        payload: Attributes,
        deadline: &Deadline,
    ) -> Reconciliation {
        let key = identity.key();
        let prior = match self.store.load(&key).await {
            Ok(Some(prior)) => prior,
            Ok(None) => return out.failed(ReconcileError::NotTracked { key }),
            Err(err) => {
                out.state = FinalState::Unknown;
                return out.failed(err);
            }
        };
        out.state = FinalState::Present(prior.clone());

        let request = MutationRequest {
            intent: Intent::Update,
            kind: kind.to_string(),
            target: MutationTarget::Object(identity.clone()),
            payload,
        };

        // The mutate response may echo planned values; nothing is committed
        // until the wait confirms them.
        if let Err(err) = self.dispatch(&request).await {
            return out.failed(err);
        }

        let outcome = self.wait(&mut out, Intent::Update, kind, &identity, deadline).await;
        self.settle(out, kind, &identity, outcome, Some(prior)).await
    }

    async fn delete(
        &self,
        mut out: Reconciliation,
        kind: &str,
        identity: ResourceIdentity,
        deadline: &Deadline,
    ) -> Reconciliation {
        let key = identity.key();
        let prior = match self.store.load(&key).await {
            Ok(prior) => prior,
            Err(err) => {
                out.state = FinalState::Unknown;
                return out.failed(err);
            }
        };
        out.state = FinalState::unchanged(prior.clone());

        let request = MutationRequest {
            intent: Intent::Delete,
            kind: kind.to_string(),
            target: MutationTarget::Object(identity.clone()),
            payload: Attributes::new(),
        };

        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => return out.failed(err),
        };

        if response.is_absent() {
            info!("{key} already gone (status {}), skipping wait", response.status);
            return self.settle(out, kind, &identity, WaitOutcome::AlreadyAbsent, prior).await;
        }

        let outcome = self.wait(&mut out, Intent::Delete, kind, &identity, deadline).await;
        self.settle(out, kind, &identity, outcome, prior).await
    }
}

/// Serializable view of a [`Reconciliation`].
#[derive(Debug, Serialize)]
pub struct ReconciliationSummary<'a> {
    operation_id: String,
    intent: Intent,
    kind: &'a str,
    key: Option<&'a str>,
    state: &'a FinalState,
    drift: Option<&'a DriftReport>,
    attempts: u32,
    error: Option<String>,
    retryable: bool,
}

impl Reconciliation {
    /// Returns a serializable summary.
    #[must_use]
    pub fn summary(&self) -> ReconciliationSummary<'_> {
        ReconciliationSummary {
            operation_id: self.operation_id.to_string(),
            intent: self.intent,
            kind: &self.kind,
            key: self.key.as_deref(),
            state: &self.state,
            drift: self.drift.as_ref(),
            attempts: self.attempts,
            error: self.error.as_ref().map(ToString::to_string),
            retryable: self.error.as_ref().is_some_and(LifecycleError::is_retryable),
        }
    }
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_success() { "succeeded" } else { "failed" };
        writeln!(f, "{} of {} {status}:", self.intent, self.kind)?;
        if let Some(key) = &self.key {
            writeln!(f, "  Key: {key}")?;
        }
        writeln!(f, "  State: {}", self.state.label())?;
        writeln!(f, "  Polls: {}", self.attempts)?;
        if let Some(error) = &self.error {
            writeln!(f, "  Error: {error}")?;
        }
        Ok(())
    }
}
