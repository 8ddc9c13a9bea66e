//! Control plane integration module.
//!
//! This module holds the two calls the lifecycle engine consumes from the
//! remote API (`Mutate` and `FetchStatus`), their request and response
//! types, and a generic REST implementation.

mod client;
mod plane;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::HttpControlPlane;
pub use plane::ControlPlane;
pub use types::{
    Attributes, FetchResponse, Intent, MutationRequest, MutationResponse, MutationTarget,
    RemoteSnapshot, Scope, is_absent_status, is_success_status,
};
