//! CLI module for the lifecycle engine.
//!
//! This module provides the command-line interface for driving single
//! lifecycle calls and inspecting durable state.

mod commands;
mod output;

pub use commands::{
    Cli, Commands, IdentityArgs, OutputFormat, PayloadArgs, ScopeArgs, StateCommands,
};
pub use output::OutputFormatter;
