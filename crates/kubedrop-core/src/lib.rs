//! kubedrop Core - Core types for the kubedrop prototyping tool
//!
//! This crate provides the foundational types used throughout kubedrop:
//! - `identity`: Owner and release marker labels, ownership predicate
//! - `ReleaseId`: Per-invocation token distinguishing provisioning attempts
//! - `Deadline`: One absolute time bound shared by a whole operation
//! - `DeployOptions` / `DestroyOptions`: Caller input and its validation

pub mod deadline;
pub mod error;
pub mod identity;
pub mod options;
pub mod release;

pub use deadline::Deadline;
pub use error::{CoreError, Result};
pub use identity::{
    APP_LABEL, OWNER_LABEL, OWNER_VALUE, RELEASE_LABEL, is_owned_by_us, owner_labels,
    release_labels, release_selector,
};
pub use options::{
    DEFAULT_MOUNT_PATH, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT, DeployOptions, DestroyOptions,
    ExposureOptions, MAX_TIMEOUT, MIN_TIMEOUT, RouteOptions, storage_claim_name,
};
pub use release::ReleaseId;
