//! Configuration validation for the lifecycle engine.
//!
//! Field-level ranges come from the `validator` derives on the configuration types;
//! this module adds the cross-field checks a derive cannot express and
//! collects non-fatal warnings alongside the errors.

use crate::error::{ConfigError, LifecycleError, Result};
use std::collections::HashSet;
use tracing::debug;
use validator::Validate;

use super::spec::{LifecycleConfig, ResourceTypeConfig, StateBackend, StateConfig};

/// Placeholders a collection path may contain.
const KNOWN_PLACEHOLDERS: &[&str] = &["project", "region"];

/// Poll intervals above this are legal but suspicious.
const SLOW_POLL_MS: u64 = 10_000;

/// Validator for engine configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an engine configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Duplicate kinds are reported as
    /// [`ConfigError::DuplicateKind`], everything else as
    /// [`ConfigError::ValidationError`].
    pub fn validate(&self, config: &LifecycleConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if let Err(e) = config.validate() {
            let mut fields: Vec<String> = e.errors().keys().map(ToString::to_string).collect();
            fields.sort();
            result.errors.push(ValidationError {
                field: fields.join(", "),
                message: e.to_string(),
            });
        }

        Self::validate_state(&config.state, &mut result);
        Self::validate_engine(config, &mut result);
        if let Some(kind) = Self::validate_types(&config.resource_types, &mut result) {
            return Err(LifecycleError::Config(ConfigError::DuplicateKind { kind }));
        }

        if result.errors.is_empty() {
            debug!(
                "Configuration validation passed with {} warning(s)",
                result.warnings.len()
            );
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(LifecycleError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates state configuration.
    fn validate_state(state: &StateConfig, result: &mut ValidationResult) {
        match state.backend {
            StateBackend::S3 => {
                if state.bucket.as_ref().is_none_or(String::is_empty) {
                    result.errors.push(ValidationError {
                        field: String::from("state.bucket"),
                        message: String::from("S3 bucket name is required when using S3 backend"),
                    });
                }
            }
            StateBackend::Local => {
                if state.bucket.is_some() {
                    result
                        .warnings
                        .push(String::from("state.bucket is ignored by the local backend"));
                }
            }
        }
    }

    fn validate_engine(config: &LifecycleConfig, result: &mut ValidationResult) {
        if config.engine.poll_interval_ms > SLOW_POLL_MS {
            result.warnings.push(format!(
                "engine.poll_interval_ms is {}ms; convergence will be observed slowly",
                config.engine.poll_interval_ms
            ));
        }

        if config.resource_types.is_empty() {
            result
                .warnings
                .push(String::from("No resource types defined in configuration"));
        }
    }

    /// Validates all resource types. Returns the first duplicated kind.
    fn validate_types(
        types: &[ResourceTypeConfig],
        result: &mut ValidationResult,
    ) -> Option<String> {
        let mut seen = HashSet::new();
        let mut duplicate = None;

        for (i, rtype) in types.iter().enumerate() {
            let prefix = format!("resource_types[{i}]");

            if !seen.insert(rtype.kind.as_str()) && duplicate.is_none() {
                duplicate = Some(rtype.kind.clone());
            }

            if !is_valid_kind(&rtype.kind) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.kind"),
                    message: format!(
                        "Kind '{}' is invalid. Must be lowercase alphanumeric with underscores.",
                        rtype.kind
                    ),
                });
            }

            Self::validate_path(&rtype.path, &prefix, result);
            Self::validate_statuses(rtype, &prefix, result);

            if let (Some(poll), Some(timeout)) = (rtype.poll_interval_ms, rtype.timeout_secs)
                && poll >= timeout.saturating_mul(1_000)
            {
                result.warnings.push(format!(
                    "{prefix}: poll interval {poll}ms is not shorter than the {timeout}s deadline"
                ));
            }
        }

        duplicate
    }

    /// Checks that every `{placeholder}` in a path is known, closed and
    /// fills a whole segment.
    fn validate_path(path: &str, prefix: &str, result: &mut ValidationResult) {
        for segment in path.split('/').filter(|s| s.contains(['{', '}'])) {
            if !(segment.starts_with('{') && segment.ends_with('}')) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.path"),
                    message: format!(
                        "Placeholder segment '{segment}' must be a whole path segment"
                    ),
                });
                return;
            }
        }

        let mut rest = path;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.path"),
                    message: format!("Unclosed placeholder in path '{path}'"),
                });
                return;
            };

            let name = &after[..close];
            if !KNOWN_PLACEHOLDERS.contains(&name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.path"),
                    message: format!(
                        "Unknown placeholder '{{{name}}}' in path '{path}'. Expected one of: {}",
                        KNOWN_PLACEHOLDERS.join(", ")
                    ),
                });
            }
            rest = &after[close + 1..];
        }

        if rest.contains('}') {
            result.errors.push(ValidationError {
                field: format!("{prefix}.path"),
                message: format!("Unbalanced '}}' in path '{path}'"),
            });
        }
    }

    /// Status values must belong to at most one terminal set.
    fn validate_statuses(rtype: &ResourceTypeConfig, prefix: &str, result: &mut ValidationResult) {
        let sets = &rtype.statuses;
        let named = [
            ("success", &sets.success),
            ("failure", &sets.failure),
            ("absent", &sets.absent),
        ];

        for (i, (left_name, left)) in named.iter().enumerate() {
            for (right_name, right) in &named[i + 1..] {
                for value in left.iter().filter(|v| right.contains(v)) {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.statuses"),
                        message: format!(
                            "Status '{value}' appears in both {left_name} and {right_name}"
                        ),
                    });
                }
            }
        }

        let has_values = named.iter().any(|(_, values)| !values.is_empty());
        if has_values && rtype.status_field.is_none() {
            result.warnings.push(format!(
                "{prefix}: statuses are listed but status_field is not set; they will never match"
            ));
        }
    }
}

/// Validates that a kind follows the naming convention.
/// Kinds must be lowercase alphanumeric with underscores, starting with a letter.
fn is_valid_kind(kind: &str) -> bool {
    let mut chars = kind.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return false;
    }

    !kind.ends_with('_') && !kind.contains("__")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlPlaneConfig, EngineConfig, StatusSets};

    fn config_with(types: Vec<ResourceTypeConfig>) -> LifecycleConfig {
        LifecycleConfig {
            control_plane: ControlPlaneConfig {
                base_url: String::from("https://api.example.com/v1"),
                timeout_secs: 30,
                token_env: String::from("TOKEN"),
            },
            engine: EngineConfig::default(),
            state: StateConfig::default(),
            resource_types: types,
        }
    }

    fn load_balancer() -> ResourceTypeConfig {
        ResourceTypeConfig::new(
            "load_balancer",
            "projects/{project}/regions/{region}/load-balancers",
        )
        .with_statuses(
            "provisioning_status",
            StatusSets::new(&["ACTIVE"], &["ERROR"], &["DELETED"]),
        )
    }

    fn field_of(err: &LifecycleError) -> Option<&str> {
        match err {
            LifecycleError::Config(ConfigError::ValidationError { field, .. }) => field.as_deref(),
            _ => None,
        }
    }

    #[test]
    fn test_valid_kind() {
        assert!(is_valid_kind("load_balancer"));
        assert!(is_valid_kind("token"));
        assert!(is_valid_kind("net2"));
    }

    #[test]
    fn test_invalid_kind() {
        assert!(!is_valid_kind(""));
        assert!(!is_valid_kind("LoadBalancer")); // uppercase
        assert!(!is_valid_kind("2net")); // starts with number
        assert!(!is_valid_kind("load-balancer")); // hyphen
        assert!(!is_valid_kind("token_")); // trailing underscore
        assert!(!is_valid_kind("load__balancer")); // consecutive underscores
    }

    #[test]
    fn test_valid_config_passes() {
        let result = ConfigValidator::new()
            .validate(&config_with(vec![load_balancer()]))
            .unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_duplicate_kind() {
        let err = ConfigValidator::new()
            .validate(&config_with(vec![load_balancer(), load_balancer()]))
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Config(ConfigError::DuplicateKind { ref kind })
                if kind == "load_balancer"
        ));
    }

    #[test]
    fn test_overlapping_statuses() {
        let rtype = ResourceTypeConfig::new("db", "projects/{project}/dbs")
            .with_statuses("status", StatusSets::new(&["READY"], &["READY"], &[]));
        let err = ConfigValidator::new()
            .validate(&config_with(vec![rtype]))
            .unwrap_err();
        assert_eq!(field_of(&err), Some("resource_types[0].statuses"));
    }

    #[test]
    fn test_unknown_placeholder() {
        let rtype = ResourceTypeConfig::new("db", "projects/{project}/zones/{zone}/dbs");
        let err = ConfigValidator::new()
            .validate(&config_with(vec![rtype]))
            .unwrap_err();
        assert_eq!(field_of(&err), Some("resource_types[0].path"));

        let rtype = ResourceTypeConfig::new("db", "projects/{project/dbs");
        assert!(ConfigValidator::new().validate(&config_with(vec![rtype])).is_err());

        let rtype = ResourceTypeConfig::new("db", "projects/p-{project}/dbs");
        assert!(ConfigValidator::new().validate(&config_with(vec![rtype])).is_err());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut config = config_with(vec![load_balancer()]);
        config.state.backend = StateBackend::S3;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(field_of(&err), Some("state.bucket"));

        config.state.bucket = Some(String::from("lifecycle-state"));
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_field_range_errors_surface() {
        let mut config = config_with(vec![load_balancer()]);
        config.control_plane.base_url = String::from("not a url");
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(field_of(&err).is_some_and(|f| f.contains("control_plane")));
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let mut config = config_with(Vec::new());
        config.engine.poll_interval_ms = 30_000;
        let mut rtype = ResourceTypeConfig::new("db", "projects/{project}/dbs");
        rtype.statuses = StatusSets::new(&["READY"], &[], &[]);
        config.resource_types.push(rtype);

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
    }
}
