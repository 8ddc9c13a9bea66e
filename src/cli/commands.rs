//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::control_plane::{Attributes, Scope};
use crate::error::{ConfigError, LifecycleError, Result};
use crate::reconciler::LifecycleRequest;
use crate::state::ResourceIdentity;

/// Halldyll lifecycle - mutate-then-reconcile control-plane resources.
#[derive(Parser, Debug)]
#[command(name = "halldyll-lifecycle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "HALLDYLL_LIFECYCLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Override the per-call deadline, in seconds (1 to 86400).
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout_secs: Option<u64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the engine configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Create an object and wait until it is ready.
    Create {
        /// Resource type.
        kind: String,

        /// Where to create the object.
        #[command(flatten)]
        scope: ScopeArgs,

        /// Requested attributes.
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Refresh local state from the remote object.
    Read {
        /// Resource type.
        kind: String,

        /// Object to read.
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Update an object and wait until it settles.
    Update {
        /// Resource type.
        kind: String,

        /// Object to update.
        #[command(flatten)]
        identity: IdentityArgs,

        /// Requested attributes.
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Delete an object and wait until it is gone.
    Delete {
        /// Resource type.
        kind: String,

        /// Object to delete.
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Inspect durable state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State inspection subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// List every tracked object.
    List,

    /// Show the stored state of one object.
    Show {
        /// Durable key (`project/[region/]id[/sub_id]`).
        key: String,
    },
}

/// Project and region of a new object.
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Owning project.
    #[arg(long)]
    pub project: String,

    /// Region, for regional resource types.
    #[arg(long)]
    pub region: Option<String>,
}

/// Identity of an existing object.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Owning project.
    #[arg(long)]
    pub project: String,

    /// Region, for regional resource types.
    #[arg(long)]
    pub region: Option<String>,

    /// Primary identifier.
    #[arg(long)]
    pub id: String,

    /// Secondary identifier, for nested objects.
    #[arg(long)]
    pub sub_id: Option<String>,
}

/// Attributes sent with a Create or Update.
#[derive(Args, Debug, Clone, Default)]
pub struct PayloadArgs {
    /// Attribute assignment `field=value`; the value is parsed as JSON and
    /// falls back to a plain string.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub set: Vec<String>,

    /// YAML or JSON file holding an attribute map. `--set` wins on conflict.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Builds the lifecycle request for the mutating and Read commands.
    ///
    /// Returns `Ok(None)` for commands that do not go through the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be read or parsed.
    pub fn to_request(&self) -> Result<Option<LifecycleRequest>> {
        let request = match self {
            Self::Create {
                kind,
                scope,
                payload,
            } => LifecycleRequest::Create {
                kind: kind.clone(),
                scope: Scope::new(scope.project.clone(), scope.region.clone()),
                payload: payload.attributes()?,
            },
            Self::Read { kind, identity } => LifecycleRequest::Read {
                kind: kind.clone(),
                identity: identity.identity(),
            },
            Self::Update {
                kind,
                identity,
                payload,
            } => LifecycleRequest::Update {
                kind: kind.clone(),
                identity: identity.identity(),
                payload: payload.attributes()?,
            },
            Self::Delete { kind, identity } => LifecycleRequest::Delete {
                kind: kind.clone(),
                identity: identity.identity(),
            },
            Self::Validate { .. } | Self::State { .. } => return Ok(None),
        };
        Ok(Some(request))
    }
}

impl IdentityArgs {
    /// Converts into a resource identity.
    #[must_use]
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(
            self.project.clone(),
            self.region.clone(),
            self.id.clone(),
            self.sub_id.clone(),
        )
    }
}

impl PayloadArgs {
    /// Merges the payload file and the `--set` assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a map, or an
    /// assignment has no `=`.
    pub fn attributes(&self) -> Result<Attributes> {
        let mut attributes = match &self.file {
            Some(path) => read_payload_file(path)?,
            None => Attributes::new(),
        };

        for assignment in &self.set {
            let (field, raw) = assignment.split_once('=').ok_or_else(|| {
                LifecycleError::Config(ConfigError::validation(
                    format!("Expected FIELD=VALUE, got '{assignment}'"),
                    "--set",
                ))
            })?;
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            attributes.insert(field.trim().to_string(), value);
        }

        Ok(attributes)
    }
}

fn read_payload_file(path: &Path) -> Result<Attributes> {
    if !path.exists() {
        return Err(LifecycleError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        LifecycleError::Config(ConfigError::ParseError {
            message: format!("Payload must be a map of attributes: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "halldyll-lifecycle",
            "--output",
            "json",
            "create",
            "load_balancer",
            "--project",
            "proj",
            "--region",
            "eu-west",
            "--set",
            "name=edge",
            "--set",
            "replicas=3",
            "--set",
            "tags=[\"a\"]",
        ])
        .unwrap();

        assert!(matches!(cli.output, OutputFormat::Json));
        let Some(LifecycleRequest::Create { kind, scope, payload }) =
            cli.command.to_request().unwrap()
        else {
            panic!("expected a create request");
        };
        assert_eq!(kind, "load_balancer");
        assert_eq!(scope, Scope::new("proj", Some(String::from("eu-west"))));
        assert_eq!(payload.get("name"), Some(&json!("edge")));
        assert_eq!(payload.get("replicas"), Some(&json!(3)));
        assert_eq!(payload.get("tags"), Some(&json!(["a"])));
    }

    #[test]
    fn test_parse_delete_identity() {
        let cli = Cli::try_parse_from([
            "halldyll-lifecycle",
            "delete",
            "token",
            "--project",
            "proj",
            "--id",
            "tok-1",
            "--timeout-secs",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.timeout_secs, Some(5));
        let request = cli.command.to_request().unwrap().unwrap();
        assert_eq!(request.key().as_deref(), Some("proj/tok-1"));
    }

    #[test]
    fn test_timeout_secs_out_of_range_is_rejected() {
        for value in ["0", "86401", "18446744073709551615"] {
            let parsed = Cli::try_parse_from([
                "halldyll-lifecycle",
                "--timeout-secs",
                value,
                "read",
                "token",
                "--project",
                "proj",
                "--id",
                "tok-1",
            ]);
            assert!(parsed.is_err(), "--timeout-secs {value} should be rejected");
        }
    }

    #[test]
    fn test_state_commands_have_no_request() {
        let cli =
            Cli::try_parse_from(["halldyll-lifecycle", "state", "show", "proj/tok-1"]).unwrap();
        assert!(cli.command.to_request().unwrap().is_none());
    }

    #[test]
    fn test_payload_file_merged_with_set() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("payload.yaml");
        std::fs::write(&file, "size: 10\nengine: postgres\n").unwrap();

        let payload = PayloadArgs {
            set: vec![String::from("size=20")],
            file: Some(file),
        };
        let attributes = payload.attributes().unwrap();

        assert_eq!(attributes.get("size"), Some(&json!(20)));
        assert_eq!(attributes.get("engine"), Some(&json!("postgres")));
    }

    #[test]
    fn test_assignment_without_equals() {
        let payload = PayloadArgs {
            set: vec![String::from("size")],
            file: None,
        };
        assert!(payload.attributes().is_err());
    }
}
