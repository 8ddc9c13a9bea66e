//! Scripted control plane used by engine and reconciler tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{ApiError, LifecycleError, Result};
use crate::state::ResourceIdentity;

use super::plane::ControlPlane;
use super::types::{Attributes, FetchResponse, MutationRequest, MutationResponse, RemoteSnapshot};

/// One scripted answer to `fetch_status`.
#[derive(Debug, Clone)]
pub(crate) enum FetchStep {
    Response(FetchResponse),
    NetworkError(String),
    InvalidResponse(String),
}

/// Control plane that replays queued responses.
///
/// The last fetch step repeats once the queue runs dry.
#[derive(Debug, Default)]
pub(crate) struct ScriptedControlPlane {
    mutations: Mutex<VecDeque<MutationResponse>>,
    fetches: Mutex<VecDeque<(Duration, FetchStep)>>,
    requests: Mutex<Vec<MutationRequest>>,
    mutate_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FetchStep {
    /// 200 with a snapshot built from `pairs` and an optional status.
    pub(crate) fn found(pairs: &[(&str, serde_json::Value)], remote_status: Option<&str>) -> Self {
        let attributes: Attributes = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Self::Response(FetchResponse::found(
            200,
            RemoteSnapshot::new(attributes),
            remote_status.map(ToString::to_string),
        ))
    }

    /// Response without a snapshot.
    pub(crate) fn status(status: u16) -> Self {
        Self::Response(FetchResponse::without_snapshot(status, format!("status {status}")))
    }
}

impl ScriptedControlPlane {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_mutation(self, response: MutationResponse) -> Self {
        self.lock_mutations().push_back(response);
        self
    }

    pub(crate) fn with_fetch(self, step: FetchStep) -> Self {
        self.with_delayed_fetch(Duration::ZERO, step)
    }

    pub(crate) fn with_delayed_fetch(self, delay: Duration, step: FetchStep) -> Self {
        self.lock_fetches().push_back((delay, step));
        self
    }

    pub(crate) fn mutate_calls(&self) -> usize {
        self.mutate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<MutationRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    fn lock_mutations(&self) -> std::sync::MutexGuard<'_, VecDeque<MutationResponse>> {
        self.mutations.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_fetches(&self) -> std::sync::MutexGuard<'_, VecDeque<(Duration, FetchStep)>> {
        self.fetches.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_fetch(&self) -> Option<(Duration, FetchStep)> {
        let mut fetches = self.lock_fetches();
        if fetches.len() > 1 {
            fetches.pop_front()
        } else {
            fetches.front().cloned()
        }
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResponse> {
        self.mutate_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        self.lock_mutations()
            .pop_front()
            .ok_or_else(|| LifecycleError::internal("no scripted mutation response"))
    }

    async fn fetch_status(
        &self,
        _kind: &str,
        _identity: &ResourceIdentity,
    ) -> Result<FetchResponse> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let (delay, step) = self
            .next_fetch()
            .ok_or_else(|| LifecycleError::internal("no scripted fetch response"))?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match step {
            FetchStep::Response(response) => Ok(response),
            FetchStep::NetworkError(message) => Err(ApiError::network(message).into()),
            FetchStep::InvalidResponse(message) => Err(ApiError::invalid_response(message).into()),
        }
    }
}
