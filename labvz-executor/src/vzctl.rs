//! OpenVZ control-tool implementation.
//!
//! Drives `vzctl` for lifecycle commands and `vzlist` for the live listing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{ControlTool, ToolCommand};
use crate::command::run_tool;
use crate::config::ToolConfig;
use crate::ExecutorError;

/// Columns requested from `vzlist`, in the order [`crate::listing`] parses them.
pub const LISTING_ARGS: [&str; 4] = ["-a", "-H", "-o", "ctid,status,ip,hostname"];

/// `vzctl`/`vzlist` backend.
#[derive(Debug, Clone)]
pub struct VzctlTool {
    /// Path to the `vzctl` binary.
    vzctl_path: PathBuf,

    /// Path to the `vzlist` binary.
    vzlist_path: PathBuf,

    /// Upper bound on any single invocation.
    timeout: Duration,
}

impl VzctlTool {
    /// Create a tool from explicit settings.
    #[must_use]
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            vzctl_path: config.vzctl_path.clone(),
            vzlist_path: config.vzlist_path.clone(),
            timeout: config.timeout(),
        }
    }

    /// Create a tool using the standard `/usr/sbin` locations.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(&ToolConfig::default())
    }
}

#[async_trait]
impl ControlTool for VzctlTool {
    async fn invoke(&self, command: &ToolCommand) -> Result<(), ExecutorError> {
        tracing::info!(vm_id = %command.id(), subcommand = command.subcommand(), "vzctl");
        run_tool(&self.vzctl_path, &command.to_args(), None, self.timeout).await?;
        Ok(())
    }

    async fn list(&self) -> Result<String, ExecutorError> {
        let args: Vec<String> = LISTING_ARGS.iter().map(|a| (*a).to_owned()).collect();
        let output = run_tool(&self.vzlist_path, &args, None, self.timeout).await?;
        Ok(output.stdout)
    }

    async fn health_check(&self) -> Result<(), ExecutorError> {
        which_binary(&self.vzctl_path)?;
        which_binary(&self.vzlist_path)?;
        Ok(())
    }
}

/// Verify a binary exists either at the given path or in PATH.
///
/// # Errors
/// Returns [`ExecutorError::BinaryNotFound`] if it does not.
pub fn which_binary(path: &Path) -> Result<(), ExecutorError> {
    if path.is_absolute() {
        if path.exists() {
            return Ok(());
        }
        return Err(ExecutorError::BinaryNotFound { path: path.to_owned() });
    }

    // Relative or bare name: check PATH
    let found = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(path).exists()))
        .unwrap_or(false);

    if found {
        Ok(())
    } else {
        Err(ExecutorError::BinaryNotFound { path: path.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn which_binary_finds_shell_on_path() {
        assert!(which_binary(Path::new("sh")).is_ok());
    }

    #[test]
    fn which_binary_rejects_missing_absolute_path() {
        let result = which_binary(Path::new("/nonexistent/vzctl"));
        assert!(matches!(result, Err(ExecutorError::BinaryNotFound { .. })));
    }

    #[tokio::test]
    async fn health_check_fails_without_tools() {
        let tool = VzctlTool::new(&ToolConfig::new(
            PathBuf::from("/nonexistent/vzctl"),
            PathBuf::from("/nonexistent/vzlist"),
            Duration::from_secs(1),
        ));
        assert!(matches!(
            tool.health_check().await,
            Err(ExecutorError::BinaryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn invoke_surfaces_tool_failure() {
        // `false` ignores its arguments and exits 1.
        let tool = VzctlTool::new(&ToolConfig::new(
            PathBuf::from("false"),
            PathBuf::from("false"),
            Duration::from_secs(5),
        ));
        let id = match labvz_core::IdentifierValidator::default().validate("101") {
            Ok(id) => id,
            Err(e) => panic!("unexpected error: {e}"),
        };
        match tool.invoke(&ToolCommand::Stop(id)).await {
            Err(ExecutorError::ToolInvocationFailed { command, status, .. }) => {
                assert_eq!(command, "false stop 101");
                assert_eq!(status, Some(1));
            }
            other => panic!("expected ToolInvocationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore = "requires an OpenVZ host with vzlist"]
    async fn list_on_real_host() {
        let tool = VzctlTool::with_defaults();
        let listing = tool.list().await;
        assert!(listing.is_ok(), "vzlist failed: {listing:?}");
    }
}
