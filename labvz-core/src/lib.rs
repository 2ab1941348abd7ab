//! Core types for single-host container VM provisioning.
//!
//! Everything here is pure: identifier validation, address selection,
//! OS template resolution and control-tool argument formatting. The
//! privileged side lives in `labvz-executor`.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod address;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod id;
pub mod spec;
pub mod template;

pub use address::find_available_address;
pub use config::{PartialFailurePolicy, ProvisionConfig};
pub use endpoint::ManagementEndpoint;
pub use error::CoreError;
pub use id::{IdentifierValidator, VmId, DEFAULT_MAX_VM_ID, MIN_VM_ID_EXCLUSIVE};
pub use spec::{ProvisioningArgs, ProvisioningSpecBuilder, ResourceSpec};
pub use template::{OsTemplate, TemplateResolver};
