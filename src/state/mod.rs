//! Durable state for the lifecycle engine.
//!
//! This module provides the consumer-visible projection of every managed
//! object: identity types, snapshot hashing, and the storage backends that
//! persist them.

mod hash;
mod local;
mod memory;
mod s3;
mod store;
mod types;

pub use hash::AttributeHasher;
pub use local::LocalStateStore;
pub use memory::MemoryStateStore;
pub use s3::S3StateStore;
pub use store::StateStore;
pub use types::{Completeness, ResourceIdentity, ResourceState, STATE_VERSION, StateDocument};
