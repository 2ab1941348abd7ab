//! Privileged VM lifecycle management on a single OpenVZ host.
//!
//! Owns every invocation of the control and listing tools: timed command
//! execution, listing parsing, serialized address claims and the lifecycle
//! state machine.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod activator;
pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod vzctl;

pub use activator::{EndpointActivator, FixedPortActivator};
pub use backend::{ControlTool, ToolCommand};
pub use command::{run_tool, ToolOutput};
pub use config::ToolConfig;
pub use controller::{CreateStep, VmController, VmRecord, VmState};
pub use error::ExecutorError;
pub use gateway::{AllocationGateway, Claim};
pub use listing::{Listing, ListingEntry, VmStatus};
pub use vzctl::VzctlTool;
