//! Configuration module for the lifecycle engine.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `lifecycle.yaml`
//! - Environment and `.env` overrides
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    ControlPlaneConfig, EngineConfig, LifecycleConfig, ResourceTypeConfig, StateBackend,
    StateConfig, StatusSets,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_BASE_URL, ENV_POLL_INTERVAL_MS, ENV_STATE_BUCKET,
    ENV_STATE_PREFIX, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
