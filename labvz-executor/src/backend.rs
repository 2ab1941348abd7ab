//! Control-tool abstraction.
//!
//! The controller only speaks [`ToolCommand`]s; an implementation decides how
//! they reach the host (the real `vzctl`, or an in-memory fake in tests).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use labvz_core::VmId;

use crate::ExecutorError;

/// One privileged control-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ToolCommand {
    /// `create <id> <args>`
    Create { id: VmId, args: Vec<String> },
    /// `start <id>`
    Start(VmId),
    /// `stop <id>`
    Stop(VmId),
    /// `restart <id>`
    Restart(VmId),
    /// `set <id> <args>`
    Set { id: VmId, args: Vec<String> },
    /// `destroy <id>`
    Destroy(VmId),
}

impl ToolCommand {
    /// Subcommand name as the tool spells it.
    #[must_use]
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Restart(_) => "restart",
            Self::Set { .. } => "set",
            Self::Destroy(_) => "destroy",
        }
    }

    /// The VM this command targets.
    #[must_use]
    pub fn id(&self) -> VmId {
        match self {
            Self::Create { id, .. }
            | Self::Set { id, .. }
            | Self::Start(id)
            | Self::Stop(id)
            | Self::Restart(id)
            | Self::Destroy(id) => *id,
        }
    }

    /// Full argument vector: subcommand, id, then any extra arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.subcommand().to_owned(), self.id().to_string()];
        if let Self::Create { args: extra, .. } | Self::Set { args: extra, .. } = self {
            args.extend(extra.iter().cloned());
        }
        args
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

/// Privileged control and listing tool.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Cancel Safety
/// Dropping an in-flight future kills the tool process. Callers that need a
/// sequence to stop part-way should stop issuing commands instead.
#[async_trait]
pub trait ControlTool: Send + Sync {
    /// Run one control command to completion.
    ///
    /// # Errors
    /// Returns [`ExecutorError::ToolInvocationFailed`] on a nonzero exit and
    /// [`ExecutorError::ToolTimeout`] if the tool overruns.
    async fn invoke(&self, command: &ToolCommand) -> Result<(), ExecutorError>;

    /// Fetch the raw live listing of every VM on the host.
    ///
    /// # Errors
    /// Same failure kinds as [`ControlTool::invoke`].
    async fn list(&self) -> Result<String, ExecutorError>;

    /// Check that the tools are installed.
    ///
    /// # Errors
    /// Returns [`ExecutorError::BinaryNotFound`] if a tool is missing.
    async fn health_check(&self) -> Result<(), ExecutorError>;
}

#[async_trait]
impl<T: ControlTool + ?Sized> ControlTool for Arc<T> {
    async fn invoke(&self, command: &ToolCommand) -> Result<(), ExecutorError> {
        (**self).invoke(command).await
    }

    async fn list(&self) -> Result<String, ExecutorError> {
        (**self).list().await
    }

    async fn health_check(&self) -> Result<(), ExecutorError> {
        (**self).health_check().await
    }
}
