//! Control-tool locations and invocation limits.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the OpenVZ tools live and how long each invocation may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ToolConfig {
    /// Path to `vzctl`.
    pub vzctl_path: PathBuf,

    /// Path to `vzlist`.
    pub vzlist_path: PathBuf,

    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            vzctl_path: PathBuf::from("/usr/sbin/vzctl"),
            vzlist_path: PathBuf::from("/usr/sbin/vzlist"),
            timeout_secs: 300,
        }
    }
}

impl ToolConfig {
    /// Create a config with explicit paths and timeout.
    #[must_use]
    pub fn new(vzctl_path: PathBuf, vzlist_path: PathBuf, timeout: Duration) -> Self {
        Self {
            vzctl_path,
            vzlist_path,
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Per-invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
