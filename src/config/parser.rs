//! Configuration parser for loading engine configuration.
//!
//! This module handles loading configuration from YAML files, `.env` files
//! and environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, LifecycleError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::LifecycleConfig;

/// Overrides `control_plane.base_url`.
pub const ENV_BASE_URL: &str = "HALLDYLL_LIFECYCLE_BASE_URL";
/// Overrides `state.bucket`.
pub const ENV_STATE_BUCKET: &str = "HALLDYLL_LIFECYCLE_STATE_BUCKET";
/// Overrides `state.prefix`.
pub const ENV_STATE_PREFIX: &str = "HALLDYLL_LIFECYCLE_STATE_PREFIX";
/// Overrides `engine.poll_interval_ms`.
pub const ENV_POLL_INTERVAL_MS: &str = "HALLDYLL_LIFECYCLE_POLL_INTERVAL_MS";

/// Configuration parser for loading engine configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LifecycleConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(LifecycleError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<LifecycleConfig> {
        debug!("Parsing YAML configuration");

        let config: LifecycleConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            LifecycleError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration with {} resource type(s)",
            config.resource_types.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<LifecycleConfig> {
        let mut config = self.load_file(path)?;
        apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                LifecycleError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Applies overrides looked up through `lookup`.
fn apply_overrides(
    config: &mut LifecycleConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(url) = lookup(ENV_BASE_URL) {
        debug!("Overriding control_plane.base_url from environment");
        config.control_plane.base_url = url;
    }

    if let Some(bucket) = lookup(ENV_STATE_BUCKET) {
        debug!("Overriding state.bucket from environment");
        config.state.bucket = Some(bucket);
    }

    if let Some(prefix) = lookup(ENV_STATE_PREFIX) {
        debug!("Overriding state.prefix from environment");
        config.state.prefix = Some(prefix);
    }

    if let Some(interval) = lookup(ENV_POLL_INTERVAL_MS) {
        debug!("Overriding engine.poll_interval_ms from environment");
        config.engine.poll_interval_ms = interval.trim().parse().map_err(|e| {
            LifecycleError::Config(ConfigError::ParseError {
                message: format!("Invalid poll interval '{interval}': {e}"),
                location: Some(ENV_POLL_INTERVAL_MS.to_string()),
            })
        })?;
    }

    Ok(())
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "lifecycle.yaml",
    "lifecycle.yml",
    "halldyll.lifecycle.yaml",
];

/// Finds the configuration file in the given directory or its parents,
/// then in the user configuration directory (`~/.config/halldyll/`).
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        if let Some(found) = find_in(&current) {
            return Ok(found);
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(found) = dirs::config_dir().and_then(|dir| find_in(&dir.join("halldyll"))) {
        return Ok(found);
    }

    Err(LifecycleError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
        .inspect(|path| info!("Found configuration file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateBackend;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const FULL: &str = r#"
control_plane:
  base_url: https://api.example.com/v1
  token_env: EXAMPLE_TOKEN

engine:
  poll_interval_ms: 1000
  timeout_secs: 300

state:
  backend: s3
  bucket: lifecycle-state
  prefix: team/prod

resource_types:
  - kind: load_balancer
    path: "projects/{project}/regions/{region}/load-balancers"
    status_field: provisioning_status
    poll_interval_ms: 500
    statuses:
      success: [ACTIVE]
      failure: [ERROR]
      absent: [DELETED]
  - kind: token
    path: "projects/{project}/tokens"
    id_field: token_id
"#;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
control_plane:
  base_url: https://api.example.com
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.control_plane.timeout_secs, 30);
        assert_eq!(config.control_plane.token_env, "CONTROL_PLANE_TOKEN");
        assert_eq!(config.engine.poll_interval_ms, 2_000);
        assert_eq!(config.state.backend, StateBackend::Local);
        assert!(config.resource_types.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ConfigParser::new().parse_yaml(FULL, None).unwrap();

        assert_eq!(config.kinds(), vec!["load_balancer", "token"]);
        let lb = config.resource_type("load_balancer").unwrap();
        assert_eq!(lb.status_field.as_deref(), Some("provisioning_status"));
        assert_eq!(lb.statuses.absent, vec![String::from("DELETED")]);
        assert_eq!(config.resource_type("token").unwrap().id_field, "token_id");
        assert_eq!(config.state.bucket.as_deref(), Some("lifecycle-state"));
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = ConfigParser::new()
            .parse_yaml("control_plane: [", Some(Path::new("lifecycle.yaml")))
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(FULL, None).unwrap();
        let env = HashMap::from([
            (ENV_BASE_URL, "https://staging.example.com"),
            (ENV_STATE_PREFIX, "team/staging"),
            (ENV_POLL_INTERVAL_MS, " 750 "),
        ]);

        apply_overrides(&mut config, |name| env.get(name).map(ToString::to_string)).unwrap();

        assert_eq!(config.control_plane.base_url, "https://staging.example.com");
        assert_eq!(config.state.prefix.as_deref(), Some("team/staging"));
        assert_eq!(config.state.bucket.as_deref(), Some("lifecycle-state"));
        assert_eq!(config.engine.poll_interval_ms, 750);

        let bad = HashMap::from([(ENV_POLL_INTERVAL_MS, "soon")]);
        assert!(
            apply_overrides(&mut config, |name| bad.get(name).map(ToString::to_string)).is_err()
        );
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("lifecycle.yml"), FULL).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, temp.path().join("lifecycle.yml"));

        let config = ConfigParser::new().load_file(&found).unwrap();
        assert_eq!(config.resource_types.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(temp.path().join("nope.yaml"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_dotenv_without_file_is_ok() {
        let temp = TempDir::new().unwrap();
        assert!(ConfigParser::new().with_base_path(temp.path()).load_dotenv().is_ok());
    }
}
