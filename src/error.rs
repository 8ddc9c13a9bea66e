//! Error types for the Halldyll lifecycle engine.
//!
//! This module provides the error hierarchy for every stage of a lifecycle
//! call: configuration, durable state, control-plane transport, and the
//! mutate-then-reconcile flow itself.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::control_plane::Intent;

/// The main error type for the Halldyll lifecycle engine.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Control-plane transport errors.
    #[error("Control plane error: {0}")]
    Api(#[from] ApiError),

    /// Lifecycle reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate resource type definition.
    #[error("Duplicate resource type: {kind}")]
    DuplicateKind {
        /// The duplicated kind.
        kind: String,
    },

    /// A request referenced a resource type with no configuration.
    #[error("Unknown resource type: {kind}")]
    UnknownKind {
        /// The unknown kind.
        kind: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Local filesystem backend error.
    #[error("Local state backend error: {message}")]
    Local {
        /// Description of the filesystem error.
        message: String,
    },

    /// S3 backend error.
    #[error("S3 state backend error: {message}")]
    S3Error {
        /// Description of the S3 error.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Control-plane transport errors.
///
/// HTTP responses are never errors at this level: their status codes travel
/// inside the response types and are classified by the engine. These
/// variants cover calls that produced no usable response at all.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("Control plane authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// Rate limited.
    #[error("Control plane rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with the control plane: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from the control plane: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Last thing the engine saw from the control plane before giving up.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Observation {
    /// Last transport status code, if a response was received.
    pub status: Option<u16>,
    /// Last remote status value reported by the object.
    pub remote_status: Option<String>,
    /// Last transport error message, if the call failed outright.
    pub error: Option<String>,
    /// Whether the last failed call may succeed when repeated.
    pub retryable: bool,
}

/// Lifecycle reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The mutating call failed before an identity was known.
    #[error("{intent} of {kind} rejected (status {status}): {message}")]
    MutationRejected {
        /// Intent of the rejected call.
        intent: Intent,
        /// Resource type.
        kind: String,
        /// Transport status returned by the control plane.
        status: u16,
        /// Message returned by the control plane.
        message: String,
    },

    /// The deadline passed before the object reached a terminal state.
    #[error("Timed out waiting for {key} ({observation})")]
    WaitTimedOut {
        /// Durable key of the object.
        key: String,
        /// Last observation before the deadline.
        observation: Observation,
    },

    /// The call was canceled while waiting.
    #[error("Canceled while waiting for {key} ({observation})")]
    WaitCanceled {
        /// Durable key of the object.
        key: String,
        /// Last observation before cancellation.
        observation: Observation,
    },

    /// The control plane reported a terminal failure for the object.
    #[error("Remote failure for {key} ({observation})")]
    RemoteFailure {
        /// Durable key of the object.
        key: String,
        /// Observation carrying the failure status.
        observation: Observation,
    },

    /// A Read-path fetch failed.
    #[error("Failed to fetch {key} ({observation})")]
    FetchFailed {
        /// Durable key of the object.
        key: String,
        /// Observation of the failed fetch.
        observation: Observation,
    },

    /// The request failed input validation.
    #[error("Invalid lifecycle request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The identity has no durable state to update.
    #[error("No tracked state for {key}")]
    NotTracked {
        /// Durable key that was looked up.
        key: String,
    },
}

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

impl LifecycleError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if re-invoking the same intent may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_retryable(),
            Self::Reconcile(
                ReconcileError::WaitTimedOut { .. } | ReconcileError::WaitCanceled { .. },
            ) => true,
            Self::Reconcile(ReconcileError::FetchFailed { observation, .. }) => {
                observation.is_transient()
            }
            _ => false,
        }
    }

    /// Returns the last observation carried by this error, if any.
    #[must_use]
    pub const fn observation(&self) -> Option<&Observation> {
        match self {
            Self::Reconcile(
                ReconcileError::WaitTimedOut { observation, .. }
                | ReconcileError::WaitCanceled { observation, .. }
                | ReconcileError::RemoteFailure { observation, .. }
                | ReconcileError::FetchFailed { observation, .. },
            ) => Some(observation),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates an S3 error with the given message.
    #[must_use]
    pub fn s3(message: impl Into<String>) -> Self {
        Self::S3Error {
            message: message.into(),
        }
    }

    /// Creates a local backend error with the given message.
    #[must_use]
    pub fn local(message: impl Into<String>) -> Self {
        Self::Local {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ApiError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if the failure is transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::NetworkError { .. })
    }
}

impl Observation {
    /// Observation of a received response.
    #[must_use]
    pub const fn response(status: u16, remote_status: Option<String>) -> Self {
        Self {
            status: Some(status),
            remote_status,
            error: None,
            retryable: status == 429 || status >= 500,
        }
    }

    /// Observation of a failed transport call.
    ///
    /// Retryability follows the error class: network failures and rate
    /// limits may clear up, invalid responses and auth failures will not.
    #[must_use]
    pub fn transport_error(error: &LifecycleError) -> Self {
        Self {
            status: None,
            remote_status: None,
            error: Some(error.to_string()),
            retryable: error.is_retryable(),
        }
    }

    /// Returns true if the last status was a transient one (429 or 5xx),
    /// or if the last transport error was retryable.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self.status {
            Some(status) => status == 429 || status >= 500,
            None => self.retryable,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.remote_status, &self.error) {
            (None, None, None) => write!(f, "no response observed"),
            (status, remote, error) => {
                let mut parts = Vec::new();
                if let Some(status) = status {
                    parts.push(format!("last status {status}"));
                }
                if let Some(remote) = remote {
                    parts.push(format!("remote status '{remote}'"));
                }
                if let Some(error) = error {
                    parts.push(format!("last error: {error}"));
                }
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}
