//! Error types for the executor crate.

use std::path::PathBuf;
use std::time::Duration;

use labvz_core::{CoreError, VmId};

/// Errors that can occur during VM lifecycle operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// Validation, allocation or template resolution failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A control or listing tool exited unsuccessfully.
    #[error("`{command}` failed ({}): {stderr}", describe_status(.status))]
    ToolInvocationFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// A tool did not finish within the configured timeout.
    #[error("`{command}` did not finish within {}s", .timeout.as_secs())]
    ToolTimeout { command: String, timeout: Duration },

    /// A tool could not be started at all.
    #[error("cannot execute `{command}`: {source}")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A tool binary is missing.
    #[error("tool binary not found at {path}")]
    BinaryNotFound { path: PathBuf },

    /// The VM is absent from the live listing.
    #[error("VM not found: {0}")]
    VmNotFound(VmId),

    /// The VM is listed but has no address.
    #[error("VM {0} has no assigned address")]
    AddressNotAssigned(VmId),

    /// The identifier is held by an existing VM or an in-flight request.
    #[error("VM id {0} is already in use")]
    IdentifierInUse(VmId),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match *status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_owned(),
    }
}
