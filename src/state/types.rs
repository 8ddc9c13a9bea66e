//! State types for tracking managed objects.
//!
//! These types represent the durable, consumer-visible projection of each
//! remote object: its immutable identity and the attributes last confirmed
//! by the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control_plane::{Attributes, RemoteSnapshot, Scope};
use crate::error::{LifecycleError, Result, StateError};

use super::hash::AttributeHasher;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Separator used when joining identity components into a key.
const KEY_SEPARATOR: char = '/';

/// Scoping keys of a remote object.
///
/// Fields are private: an identity is built once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_id: Option<String>,
}

/// Whether a state entry holds a full snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Identity (and mutate response fields) only.
    Partial,
    /// Identity plus a full remote snapshot.
    Complete,
}

/// Durable state of one object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceState {
    /// Resource type.
    pub kind: String,
    /// Immutable identity.
    pub identity: ResourceIdentity,
    /// Partial or complete.
    pub completeness: Completeness,
    /// Remote-sourced attributes.
    pub attributes: Attributes,
    /// Hash of the snapshot the attributes came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_hash: Option<String>,
}

/// Stored document wrapping one tracked object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    /// State format version.
    pub version: String,
    /// The tracked object.
    pub resource: ResourceState,
    /// When the document was last written.
    pub last_updated: DateTime<Utc>,
}

impl ResourceIdentity {
    /// Creates an identity from its components.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        region: Option<String>,
        id: impl Into<String>,
        sub_id: Option<String>,
    ) -> Self {
        Self {
            project: project.into(),
            region,
            id: id.into(),
            sub_id,
        }
    }

    /// Creates an identity from a creation scope and the identifiers the
    /// control plane returned.
    #[must_use]
    pub fn from_scope(scope: &Scope, id: impl Into<String>, sub_id: Option<String>) -> Self {
        Self::new(scope.project.clone(), scope.region.clone(), id, sub_id)
    }

    /// Returns the opaque durable key.
    #[must_use]
    pub fn key(&self) -> String {
        let mut parts = vec![self.project.as_str()];
        if let Some(region) = &self.region {
            parts.push(region);
        }
        parts.push(&self.id);
        if let Some(sub_id) = &self.sub_id {
            parts.push(sub_id);
        }
        parts.join(&KEY_SEPARATOR.to_string())
    }

    /// Returns the scope this identity lives in.
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope::new(self.project.clone(), self.region.clone())
    }

    /// Owning project.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Region, if scoped to one.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Primary identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Secondary identifier.
    #[must_use]
    pub fn sub_id(&self) -> Option<&str> {
        self.sub_id.as_deref()
    }

    /// Checks that every component is non-empty and free of the key separator.
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending component.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let components = [
            ("project", Some(self.project.as_str())),
            ("region", self.region.as_deref()),
            ("id", Some(self.id.as_str())),
            ("sub_id", self.sub_id.as_deref()),
        ];

        for (name, value) in components {
            let Some(value) = value else { continue };
            if value.is_empty() {
                return Err(format!("identity {name} cannot be empty"));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(format!("identity {name} '{value}' cannot contain '{KEY_SEPARATOR}'"));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl ResourceState {
    /// State committed right after a successful Create, before waiting.
    #[must_use]
    pub fn partial(kind: &str, identity: ResourceIdentity, fields: Attributes) -> Self {
        Self {
            kind: kind.to_string(),
            identity,
            completeness: Completeness::Partial,
            attributes: fields,
            snapshot_hash: None,
        }
    }

    /// State fully described by a remote snapshot.
    ///
    /// Every snapshot-backed write goes through here, so a Create that
    /// converged and a Read of the same snapshot produce equal state.
    #[must_use]
    pub fn complete(kind: &str, identity: ResourceIdentity, snapshot: RemoteSnapshot) -> Self {
        let snapshot_hash = AttributeHasher::new().hash_attributes(snapshot.attributes());
        Self {
            kind: kind.to_string(),
            identity,
            completeness: Completeness::Complete,
            attributes: snapshot.into_attributes(),
            snapshot_hash: Some(snapshot_hash),
        }
    }

    /// Returns the durable key.
    #[must_use]
    pub fn key(&self) -> String {
        self.identity.key()
    }

    /// Returns true once a full snapshot has been recorded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.completeness, Completeness::Complete)
    }

    /// Gets an attribute.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

impl StateDocument {
    /// Wraps a state in a document stamped with the current version.
    #[must_use]
    pub fn new(resource: ResourceState) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            resource,
            last_updated: Utc::now(),
        }
    }

    /// Serializes a state as a pretty-printed document.
    pub fn render(state: &ResourceState) -> Result<String> {
        serde_json::to_string_pretty(&Self::new(state.clone())).map_err(|e| {
            LifecycleError::State(StateError::serialization(format!(
                "Failed to serialize state: {e}"
            )))
        })
    }

    /// Parses a stored document, rejecting other format versions.
    pub fn parse(content: &str) -> Result<ResourceState> {
        let document: Self = serde_json::from_str(content).map_err(|e| {
            LifecycleError::State(StateError::Corrupted {
                message: format!("Failed to parse state: {e}"),
            })
        })?;

        if document.version != STATE_VERSION {
            return Err(LifecycleError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: document.version,
            }));
        }

        Ok(document.resource)
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let completeness = match self {
            Self::Partial => "partial",
            Self::Complete => "complete",
        };
        write!(f, "{completeness}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_joins_present_components() {
        let full = ResourceIdentity::new(
            "proj",
            Some(String::from("eu-1")),
            "db-1",
            Some(String::from("user-7")),
        );
        assert_eq!(full.key(), "proj/eu-1/db-1/user-7");

        let global = ResourceIdentity::new("proj", None, "zone-a", None);
        assert_eq!(global.key(), "proj/zone-a");
    }

    #[test]
    fn test_identity_validation() {
        assert!(ResourceIdentity::new("proj", None, "id", None).validate().is_ok());
        assert!(ResourceIdentity::new("", None, "id", None).validate().is_err());
        assert!(ResourceIdentity::new("proj", None, "a/b", None).validate().is_err());
        assert!(
            ResourceIdentity::new("proj", Some(String::new()), "id", None)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_complete_state_carries_hash() {
        let identity = ResourceIdentity::new("proj", None, "tok-1", None);
        let snapshot =
            RemoteSnapshot::new(Attributes::from([(String::from("scope"), json!("read"))]));

        let state = ResourceState::complete("token", identity, snapshot);
        assert!(state.is_complete());
        assert!(state.snapshot_hash.is_some());
        assert_eq!(state.get("scope"), Some(&json!("read")));
    }

    #[test]
    fn test_document_render_and_parse() {
        let identity = ResourceIdentity::new("proj", None, "net-1", None);
        let state = ResourceState::partial("network", identity, Attributes::new());

        let content = StateDocument::render(&state).unwrap();
        assert!(content.contains(&format!("\"version\": \"{STATE_VERSION}\"")));
        assert_eq!(StateDocument::parse(&content).unwrap(), state);

        let stale = content.replacen(STATE_VERSION, "0.1", 1);
        assert!(matches!(
            StateDocument::parse(&stale),
            Err(LifecycleError::State(StateError::VersionMismatch { .. }))
        ));
        assert!(matches!(
            StateDocument::parse("{}"),
            Err(LifecycleError::State(StateError::Corrupted { .. }))
        ));
    }
}
