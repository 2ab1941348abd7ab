//! Timed execution of external tools.
//!
//! Arguments are passed as a vector, never through a shell, so an argument
//! can never be reinterpreted as another command.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::ExecutorError;

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ToolOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Run `program` with `args` and wait at most `timeout` for it to exit.
///
/// On timeout the child is killed (via `kill_on_drop`) before returning.
///
/// # Errors
/// Returns [`ExecutorError::ToolSpawn`] if the process cannot start,
/// [`ExecutorError::ToolTimeout`] if it overruns, and
/// [`ExecutorError::ToolInvocationFailed`] on a nonzero exit.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    current_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ToolOutput, ExecutorError> {
    let command_line = render_command(program, args);
    tracing::debug!(command = %command_line, "invoking tool");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|source| ExecutorError::ToolSpawn {
        command: command_line.clone(),
        source,
    })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            tracing::error!(
                command = %command_line,
                timeout_s = timeout.as_secs(),
                "tool timed out"
            );
            ExecutorError::ToolTimeout {
                command: command_line.clone(),
                timeout,
            }
        })??;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        tracing::warn!(
            command = %command_line,
            status = ?output.status.code(),
            stderr = %stderr.trim(),
            "tool failed"
        );
        return Err(ExecutorError::ToolInvocationFailed {
            command: command_line,
            status: output.status.code(),
            stderr: stderr.trim().to_owned(),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}
