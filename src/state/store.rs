//! State store trait definition.
//!
//! This module defines the common interface for durable state backends.

use async_trait::async_trait;

use crate::error::Result;
use super::types::ResourceState;

/// Trait for state storage backends.
///
/// Implementations serialize writes per key; the engine never holds a lock
/// of its own across a lifecycle call.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the state of one object.
    ///
    /// Returns `None` if the key is not tracked.
    async fn load(&self, key: &str) -> Result<Option<ResourceState>>;

    /// Commits the state of one object, replacing any previous entry.
    async fn commit(&self, state: &ResourceState) -> Result<()>;

    /// Removes the state of one object. Removing an untracked key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Lists every tracked object.
    async fn list(&self) -> Result<Vec<ResourceState>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self, key: &str) -> Result<Option<ResourceState>> {
        (**self).load(key).await
    }

    async fn commit(&self, state: &ResourceState) -> Result<()> {
        (**self).commit(state).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn list(&self) -> Result<Vec<ResourceState>> {
        (**self).list().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
