//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{LifecycleConfig, ValidationResult};
use crate::engine::{DriftReport, FinalState};
use crate::reconciler::Reconciliation;
use crate::state::{AttributeHasher, Completeness, ResourceState};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Tracked object row for table display.
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    completeness: String,
    #[tabled(rename = "Fields")]
    fields: usize,
    #[tabled(rename = "Hash")]
    hash: String,
}

/// Attribute row for table display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of a lifecycle call.
    #[must_use]
    pub fn format_reconciliation(&self, result: &Reconciliation) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&result.summary()).unwrap_or_default()
            }
            OutputFormat::Text => {
                let status = if result.is_success() {
                    format!("{} {} of {} succeeded", "✓".green(), result.intent, result.kind)
                } else {
                    format!("{} {} of {} failed", "✗".red(), result.intent, result.kind)
                };

                let mut output = format!("{status}\n\n");
                if let Some(key) = &result.key {
                    let _ = writeln!(output, "   Key: {key}");
                }
                let _ = writeln!(output, "   State: {}", Self::format_final_state(&result.state));
                let _ = writeln!(output, "   Polls: {}", result.attempts);
                let _ = writeln!(output, "   Operation: {}", result.operation_id);

                if let Some(drift) = &result.drift {
                    output.push('\n');
                    output.push_str(&Self::format_drift_text(drift));
                }

                if let Some(error) = &result.error {
                    let retry = if error.is_retryable() { " (retryable)" } else { "" };
                    let _ = write!(output, "\n{} Error: {error}{retry}\n", "⚠".yellow());
                    if let Some(observation) = error.observation() {
                        let _ = writeln!(output, "   Last observed: {observation}");
                    }
                }

                output
            }
        }
    }

    fn format_drift_text(report: &DriftReport) -> String {
        if report.removed {
            format!("{} {} no longer exists remotely; state removed.\n", "⚠".yellow(), report.key)
        } else if report.has_drift() {
            let mut output = format!("{} Drift corrected:\n", "⚠".yellow());
            for field in &report.changed_fields {
                let _ = writeln!(output, "   ~ {field}");
            }
            output
        } else {
            format!("{} No drift detected - state matches the remote object.\n", "✓".green())
        }
    }

    /// Formats the list of tracked objects.
    #[must_use]
    pub fn format_state_list(&self, states: &[ResourceState]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(states).unwrap_or_default(),
            OutputFormat::Text => {
                if states.is_empty() {
                    return String::from("No tracked objects.\n");
                }

                let hasher = AttributeHasher::new();
                let rows: Vec<StateRow> = states
                    .iter()
                    .map(|s| StateRow {
                        key: s.key(),
                        kind: s.kind.clone(),
                        completeness: Self::format_completeness(s.completeness),
                        fields: s.attributes.len(),
                        hash: s
                            .snapshot_hash
                            .as_deref()
                            .map_or_else(|| String::from("-"), |h| hasher.short_hash(h)),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let partial = states.iter().filter(|s| !s.is_complete()).count();
                let _ = write!(
                    output,
                    "\n\n{} object(s), {} partial\n",
                    states.len(),
                    partial
                );
                output
            }
        }
    }

    /// Formats the stored state of one object.
    #[must_use]
    pub fn format_state(&self, state: &ResourceState) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(output, "\n{} ({})\n\n", state.key(), state.kind);
                let _ = writeln!(output, "   Project: {}", state.identity.project());
                if let Some(region) = state.identity.region() {
                    let _ = writeln!(output, "   Region: {region}");
                }
                let _ = writeln!(
                    output,
                    "   State: {}",
                    Self::format_completeness(state.completeness)
                );
                if let Some(hash) = &state.snapshot_hash {
                    let _ = writeln!(output, "   Snapshot hash: {hash}");
                }

                if !state.attributes.is_empty() {
                    let rows: Vec<AttributeRow> = state
                        .attributes
                        .iter()
                        .map(|(field, value)| AttributeRow {
                            field: field.clone(),
                            value: Self::truncate(&value.to_string(), 60),
                        })
                        .collect();
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats a validation result with a short configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &LifecycleConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "warnings": result.warnings,
                "kinds": config.kinds(),
                "backend": config.state.backend,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());

                if show_warnings && result.warning_count() > 0 {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = write!(output, "\nConfiguration summary:\n");
                let _ = writeln!(output, "   Control plane: {}", config.control_plane.base_url);
                let _ = writeln!(output, "   State backend: {:?}", config.state.backend);
                let _ = writeln!(output, "   Resource types: {}", config.kinds().join(", "));
                output
            }
        }
    }

    /// Formats a final state with color.
    fn format_final_state(state: &FinalState) -> String {
        match state {
            FinalState::Present(s) if s.is_complete() => state.label().green().to_string(),
            FinalState::Present(_) => state.label().yellow().to_string(),
            FinalState::Removed => state.label().red().to_string(),
            FinalState::Untracked | FinalState::Unknown => state.label().dimmed().to_string(),
        }
    }

    /// Formats a completeness marker with color.
    fn format_completeness(completeness: Completeness) -> String {
        match completeness {
            Completeness::Complete => completeness.to_string().green().to_string(),
            Completeness::Partial => completeness.to_string().yellow().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}
