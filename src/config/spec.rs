//! Configuration specification types for the lifecycle engine.
//!
//! This module defines the structs that map to the `lifecycle.yaml` file:
//! where the control plane lives, how long to poll, where durable state is
//! kept, and the per-type terminal-status tables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct LifecycleConfig {
    /// Control plane connection settings.
    #[validate(nested)]
    pub control_plane: ControlPlaneConfig,
    /// Default polling behavior.
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Managed resource types.
    #[serde(default)]
    #[validate(nested)]
    pub resource_types: Vec<ResourceTypeConfig>,
}

/// Control plane connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ControlPlaneConfig {
    /// Base URL of the API.
    #[validate(url)]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    #[validate(length(min = 1))]
    pub token_env: String,
}

/// Default polling behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct EngineConfig {
    /// Fixed interval between status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 50, max = 60_000))]
    pub poll_interval_ms: u64,
    /// Default per-call deadline, in seconds.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 86_400))]
    pub timeout_secs: u64,
}

/// State backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: StateBackend,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
    /// Local state directory (for local backend).
    #[serde(default)]
    pub path: Option<String>,
}

/// State backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Local file-based state storage.
    #[default]
    Local,
    /// AWS S3-based state storage.
    S3,
}

/// Configuration of one managed resource type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ResourceTypeConfig {
    /// Type name used in requests and state (e.g. `load_balancer`).
    #[validate(length(min = 1))]
    pub kind: String,
    /// Collection path template, may contain `{project}` and `{region}`.
    #[validate(length(min = 1))]
    pub path: String,
    /// Response field carrying the primary identifier.
    #[serde(default = "default_id_field")]
    #[validate(length(min = 1))]
    pub id_field: String,
    /// Response field carrying the secondary identifier, if any.
    #[serde(default)]
    pub sub_id_field: Option<String>,
    /// Snapshot field carrying the remote status value, if any.
    #[serde(default)]
    pub status_field: Option<String>,
    /// Poll interval override, in milliseconds.
    #[serde(default)]
    #[validate(range(min = 50, max = 60_000))]
    pub poll_interval_ms: Option<u64>,
    /// Deadline override, in seconds.
    #[serde(default)]
    #[validate(range(min = 1, max = 86_400))]
    pub timeout_secs: Option<u64>,
    /// Terminal status values.
    #[serde(default)]
    pub statuses: StatusSets,
}

/// Terminal remote status values of a resource type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusSets {
    /// Values meaning the object is stable and ready.
    #[serde(default)]
    pub success: Vec<String>,
    /// Values meaning the object failed terminally.
    #[serde(default)]
    pub failure: Vec<String>,
    /// Values meaning the object is gone although still listed.
    #[serde(default)]
    pub absent: Vec<String>,
}

// Default value functions

const fn default_request_timeout() -> u64 {
    30
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_timeout_secs() -> u64 {
    600
}

fn default_token_env() -> String {
    String::from("CONTROL_PLANE_TOKEN")
}

fn default_id_field() -> String {
    String::from("id")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LifecycleConfig {
    /// Gets a resource type by kind.
    #[must_use]
    pub fn resource_type(&self, kind: &str) -> Option<&ResourceTypeConfig> {
        self.resource_types.iter().find(|t| t.kind == kind)
    }

    /// Returns all configured kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.resource_types.iter().map(|t| t.kind.as_str()).collect()
    }

    /// Poll interval for a kind, falling back to the engine default.
    #[must_use]
    pub fn poll_interval(&self, kind: &str) -> Duration {
        let ms = self
            .resource_type(kind)
            .and_then(|t| t.poll_interval_ms)
            .unwrap_or(self.engine.poll_interval_ms);
        Duration::from_millis(ms)
    }

    /// Per-call deadline for a kind, falling back to the engine default.
    #[must_use]
    pub fn timeout(&self, kind: &str) -> Duration {
        let secs = self
            .resource_type(kind)
            .and_then(|t| t.timeout_secs)
            .unwrap_or(self.engine.timeout_secs);
        Duration::from_secs(secs)
    }
}

impl ResourceTypeConfig {
    /// Creates a resource type with default field names and no statuses.
    #[must_use]
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
            id_field: default_id_field(),
            sub_id_field: None,
            status_field: None,
            poll_interval_ms: None,
            timeout_secs: None,
            statuses: StatusSets::default(),
        }
    }

    /// Sets the status field and terminal values.
    #[must_use]
    pub fn with_statuses(mut self, field: &str, statuses: StatusSets) -> Self {
        self.status_field = Some(field.to_string());
        self.statuses = statuses;
        self
    }

    /// Returns true if the path needs a region.
    #[must_use]
    pub fn requires_region(&self) -> bool {
        self.path.contains("{region}")
    }
}

impl StatusSets {
    /// Creates status sets from string slices.
    #[must_use]
    pub fn new(success: &[&str], failure: &[&str], absent: &[&str]) -> Self {
        let owned = |values: &[&str]| values.iter().map(|v| (*v).to_string()).collect();
        Self {
            success: owned(success),
            failure: owned(failure),
            absent: owned(absent),
        }
    }
}
