// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Lifecycle
//!
//! A mutate-then-reconcile lifecycle engine for resources managed through an
//! eventually-consistent control-plane API.
//!
//! ## Overview
//!
//! Every Create, Update or Delete is dispatched once, then the remote object
//! is polled until it reaches a terminal state or the call's deadline fires.
//! Durable state only ever holds what the control plane confirmed:
//!
//! - A Create persists the new identity immediately, so a timeout never loses
//!   track of an object that exists remotely
//! - An Update never commits planned values; on failure the prior state stays
//! - A Delete treats "already gone" as success
//! - A Read overwrites local state field for field and reports drift
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`control_plane`]: Control plane boundary and REST client
//! - [`engine`]: Classification, deadlines, polling and state application
//! - [`state`]: State storage backends (local, S3, memory)
//! - [`reconciler`]: Per-call orchestration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! control_plane:
//!   base_url: https://api.example.com/v1
//!   token_env: EXAMPLE_TOKEN
//!
//! resource_types:
//!   - kind: load_balancer
//!     path: "projects/{project}/regions/{region}/load-balancers"
//!     status_field: provisioning_status
//!     statuses:
//!       success: [ACTIVE]
//!       failure: [ERROR]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod control_plane;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, LifecycleConfig};
pub use control_plane::{ControlPlane, HttpControlPlane};
pub use engine::{Deadline, FinalState, WaitEngine};
pub use error::{LifecycleError, Result};
pub use reconciler::{LifecycleRequest, Reconciler, Reconciliation, ReconciliationSummary};
pub use state::{LocalStateStore, MemoryStateStore, S3StateStore, StateStore};
