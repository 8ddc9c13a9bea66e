//! In-memory state backend.
//!
//! Used by tests and embedders that keep state elsewhere. Nothing survives
//! process exit.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{LifecycleError, Result, StateError};

use super::store::StateStore;
use super::types::ResourceState;

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, ResourceState>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = ResourceState>) -> Self {
        let entries = entries.into_iter().map(|s| (s.key(), s)).collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> LifecycleError {
    LifecycleError::State(StateError::Corrupted {
        message: String::from("in-memory state lock poisoned"),
    })
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<ResourceState>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn commit(&self, state: &ResourceState) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(state.key(), state.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResourceState>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.values().cloned().collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
