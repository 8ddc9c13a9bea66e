//! Control plane trait definition.
//!
//! This module defines the two calls the lifecycle engine consumes.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::ResourceIdentity;

use super::types::{FetchResponse, MutationRequest, MutationResponse};

/// Trait for control-plane clients.
///
/// Implementations return `Ok` for every HTTP response, whatever its status
/// code, and `Err` only when no usable response was obtained.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Dispatches a Create, Update, or Delete call.
    ///
    /// For deletes, a 404/410 status is a valid non-error result.
    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResponse>;

    /// Fetches the current status of an object.
    async fn fetch_status(&self, kind: &str, identity: &ResourceIdentity) -> Result<FetchResponse>;
}

#[async_trait]
impl<T: ControlPlane + ?Sized> ControlPlane for Box<T> {
    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResponse> {
        (**self).mutate(request).await
    }

    async fn fetch_status(&self, kind: &str, identity: &ResourceIdentity) -> Result<FetchResponse> {
        (**self).fetch_status(kind, identity).await
    }
}
