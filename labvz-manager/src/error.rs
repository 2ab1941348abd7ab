//! Error types for the manager crate.

use std::path::PathBuf;

use labvz_executor::ExecutorError;

/// Errors raised while preparing or testing a lab.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LabError {
    /// The lab spec file is missing or is not a JSON object.
    #[error("lab spec invalid: {0}")]
    LabSpecInvalid(String),

    /// The lab id and repository url do not form a usable cache directory name.
    #[error("invalid lab repository: {0}")]
    InvalidRepository(String),

    /// An error propagated from the executor layer.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// The management agent could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The management endpoint or request URI is malformed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The lab test ran but did not report success.
    #[error("lab test failed: {0}")]
    TestFailed(String),

    /// The settings file could not be read or parsed.
    #[error("settings file {}: {reason}", .path.display())]
    Settings { path: PathBuf, reason: String },

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
