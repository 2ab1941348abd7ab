//! Management endpoint activation.
//!
//! Once a VM is running, callers interact with it through a management
//! agent listening on a fixed port. Installing and starting that agent is
//! an extension point; the default activator assumes the agent is baked
//! into the template and only pairs the address with the port.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use labvz_core::{ManagementEndpoint, VmId};

use crate::ExecutorError;

/// Turns a running VM into a reachable management endpoint.
#[async_trait]
pub trait EndpointActivator: Send + Sync {
    /// Bring up the management agent for `id`, reachable at `address`.
    ///
    /// # Errors
    /// Implementations report their own failures as [`ExecutorError`].
    async fn activate(
        &self,
        id: VmId,
        address: Ipv4Addr,
    ) -> Result<ManagementEndpoint, ExecutorError>;
}

/// Pairs the VM address with a fixed port without touching the VM.
#[derive(Debug, Clone, Copy)]
pub struct FixedPortActivator {
    port: u16,
}

impl FixedPortActivator {
    /// Create an activator for the given management port.
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl EndpointActivator for FixedPortActivator {
    async fn activate(
        &self,
        id: VmId,
        address: Ipv4Addr,
    ) -> Result<ManagementEndpoint, ExecutorError> {
        tracing::debug!(vm_id = %id, %address, port = self.port, "management endpoint ready");
        Ok(ManagementEndpoint::new(address, self.port))
    }
}
