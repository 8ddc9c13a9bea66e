//! Control-plane request and response types.
//!
//! These types are the narrow boundary between the lifecycle engine and
//! whatever client actually talks to the remote API. Field marshaling into
//! and out of wire payloads happens on the other side of this boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::state::ResourceIdentity;

/// Ordered attribute map of a remote object.
pub type Attributes = BTreeMap<String, Value>;

/// Lifecycle intent of a call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Create a new object.
    Create,
    /// Refresh local state from the remote object.
    Read,
    /// Modify an existing object.
    Update,
    /// Remove an object.
    Delete,
}

/// Scope under which a new object is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scope {
    /// Owning project.
    pub project: String,
    /// Optional region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// What a mutating call is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationTarget {
    /// The collection an object is created in.
    Collection(Scope),
    /// An existing object.
    Object(ResourceIdentity),
}

/// A mutating call to dispatch.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    /// Intent of the call (never `Read`).
    pub intent: Intent,
    /// Resource type.
    pub kind: String,
    /// Target of the call.
    pub target: MutationTarget,
    /// Requested attributes (empty for deletes).
    pub payload: Attributes,
}

/// Response of a mutating call.
///
/// Any HTTP response is represented here, including 4xx and 5xx.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResponse {
    /// Transport status code.
    pub status: u16,
    /// Primary identifier assigned or echoed by the control plane.
    pub id: Option<String>,
    /// Secondary identifier, for nested objects.
    pub sub_id: Option<String>,
    /// Fields returned directly by the call.
    pub fields: Attributes,
    /// Error message for non-2xx responses.
    pub message: Option<String>,
}

/// Complete set of observable attributes of an existing remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    attributes: Attributes,
}

/// Response of a status fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// Transport status code.
    pub status: u16,
    /// Snapshot; always present for 2xx responses.
    pub snapshot: Option<RemoteSnapshot>,
    /// Remote status value reported by the object.
    pub remote_status: Option<String>,
    /// Error message for non-2xx responses.
    pub message: Option<String>,
}

/// Returns true for 2xx transport codes.
#[must_use]
pub const fn is_success_status(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Returns true for the codes that mean "object does not exist".
#[must_use]
pub const fn is_absent_status(status: u16) -> bool {
    status == 404 || status == 410
}

impl Intent {
    /// Returns true for intents that mutate the remote object.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let intent = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{intent}")
    }
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub fn new(project: impl Into<String>, region: Option<String>) -> Self {
        Self {
            project: project.into(),
            region,
        }
    }
}

impl MutationTarget {
    /// Returns the scope the target lives in.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match self {
            Self::Collection(scope) => scope.clone(),
            Self::Object(identity) => identity.scope(),
        }
    }
}

impl MutationResponse {
    /// Returns true for 2xx responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        is_success_status(self.status)
    }

    /// Returns true for 404/410 responses.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        is_absent_status(self.status)
    }
}

impl RemoteSnapshot {
    /// Creates a snapshot from its attributes.
    #[must_use]
    pub const fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Returns the snapshot attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Consumes the snapshot, returning its attributes.
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Returns a string attribute, if present.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }
}

impl FetchResponse {
    /// A 2xx response carrying the object's snapshot.
    #[must_use]
    pub const fn found(
        status: u16,
        snapshot: RemoteSnapshot,
        remote_status: Option<String>,
    ) -> Self {
        Self {
            status,
            snapshot: Some(snapshot),
            remote_status,
            message: None,
        }
    }

    /// A response without a snapshot (404, 5xx, ...).
    #[must_use]
    pub fn without_snapshot(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            snapshot: None,
            remote_status: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(is_success_status(200));
        assert!(is_success_status(202));
        assert!(!is_success_status(304));
        assert!(is_absent_status(404));
        assert!(is_absent_status(410));
        assert!(!is_absent_status(400));
    }

    #[test]
    fn test_intent_serde_and_display() {
        let json = serde_json::to_string(&Intent::Delete).unwrap();
        assert_eq!(json, "\"delete\"");
        assert_eq!(Intent::Update.to_string(), "update");
        assert!(!Intent::Read.is_mutation());
        assert!(Intent::Create.is_mutation());
    }

    #[test]
    fn test_target_scope() {
        let identity = ResourceIdentity::new("proj", Some(String::from("eu-1")), "lb-1", None);
        let target = MutationTarget::Object(identity);
        assert_eq!(target.scope(), Scope::new("proj", Some(String::from("eu-1"))));
    }
}
