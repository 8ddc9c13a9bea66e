//! Identity persistence after an accepted Create.

use tracing::info;

use crate::control_plane::{MutationResponse, Scope};
use crate::error::{ApiError, LifecycleError, Result};
use crate::state::{ResourceIdentity, ResourceState, StateStore};

/// Commits the identity of a freshly created object before any waiting.
#[derive(Debug)]
pub struct IdentityPersister<'a, S: StateStore> {
    store: &'a S,
}

impl<'a, S: StateStore> IdentityPersister<'a, S> {
    /// Creates a persister writing to `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Extracts the identity from an accepted mutate response and commits
    /// it, together with the response fields, as partial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries no usable identifier or if
    /// the commit fails.
    pub async fn persist(
        &self,
        kind: &str,
        scope: &Scope,
        response: &MutationResponse,
    ) -> Result<ResourceState> {
        let id = response.id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            LifecycleError::Api(ApiError::invalid_response(format!(
                "create of {kind} accepted with status {} but returned no identifier",
                response.status
            )))
        })?;

        let identity = ResourceIdentity::from_scope(scope, id, response.sub_id.clone());
        identity.validate().map_err(|message| {
            LifecycleError::Api(ApiError::invalid_response(format!(
                "create of {kind} returned an unusable identifier: {message}"
            )))
        })?;

        let state = ResourceState::partial(kind, identity, response.fields.clone());
        self.store.commit(&state).await?;

        info!("Persisted identity {} for new {kind}", state.key());
        Ok(state)
    }
}
