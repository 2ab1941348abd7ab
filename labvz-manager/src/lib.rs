//! Lab glue around the VM controller.
//!
//! Synchronizes lab repositories, loads lab specs, triggers remote lab tests
//! and exposes everything through the `labvz` command line.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod cli;
pub mod config;
pub mod error;
pub mod labspec;
pub mod repo;
pub mod settings;
pub mod trigger;

pub use config::LabConfig;
pub use error::LabError;
pub use labspec::{read_lab_spec, LabSpec};
pub use repo::{repo_name, RepoSync};
pub use settings::Settings;
pub use trigger::{TestOutcome, TestTrigger};
