//! VM lifecycle controller.
//!
//! Every public operation takes a raw identifier and passes it through the
//! configured [`IdentifierValidator`] before any privileged invocation.
//! Multi-step operations issue their commands strictly in order and stop at
//! the first failure.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use labvz_core::{
    IdentifierValidator, ManagementEndpoint, PartialFailurePolicy, ProvisionConfig,
    ProvisioningSpecBuilder, ResourceSpec, TemplateResolver, VmId,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::activator::{EndpointActivator, FixedPortActivator};
use crate::backend::{ControlTool, ToolCommand};
use crate::gateway::AllocationGateway;
use crate::listing::Listing;
use crate::ExecutorError;

/// Lifecycle state of a VM as last observed by this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum VmState {
    /// Never seen by this controller, or a create that failed before step one.
    Absent,
    Creating,
    Running,
    Restarting,
    Stopping,
    Stopped,
    Destroyed,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Registry entry for one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct VmRecord {
    pub state: VmState,
    pub updated_at: DateTime<Utc>,
}

/// The ordered steps of a create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    Create,
    Start,
    Configure,
}

impl fmt::Display for CreateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Start => "start",
            Self::Configure => "configure",
        })
    }
}

/// State a partially created VM is left in.
fn settled_after(completed: &[CreateStep]) -> VmState {
    if completed.contains(&CreateStep::Start) {
        VmState::Running
    } else {
        VmState::Stopped
    }
}

/// Orchestrates VM lifecycle operations against a [`ControlTool`].
///
/// Safe to share across tasks: address claims go through one
/// [`AllocationGateway`] and the state registry is behind a mutex.
pub struct VmController<T: ControlTool, A: EndpointActivator = FixedPortActivator> {
    tool: T,
    activator: A,
    config: ProvisionConfig,
    validator: IdentifierValidator,
    resolver: TemplateResolver,
    builder: ProvisioningSpecBuilder,
    gateway: AllocationGateway,
    states: Mutex<BTreeMap<VmId, VmRecord>>,
}

impl<T: ControlTool> VmController<T> {
    /// Create a controller whose endpoints use the configured management port.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] if the configuration is invalid.
    pub fn new(tool: T, config: ProvisionConfig) -> Result<Self, ExecutorError> {
        let activator = FixedPortActivator::new(config.management_port);
        Self::with_activator(tool, activator, config)
    }
}

impl<T: ControlTool, A: EndpointActivator> VmController<T, A> {
    /// Create a controller with a custom endpoint activator.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] if the configuration is invalid.
    pub fn with_activator(
        tool: T,
        activator: A,
        config: ProvisionConfig,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        Ok(Self {
            validator: config.identifier_validator(),
            resolver: config.template_resolver(),
            builder: ProvisioningSpecBuilder::new(&config),
            tool,
            activator,
            config,
            gateway: AllocationGateway::new(),
            states: Mutex::new(BTreeMap::new()),
        })
    }

    /// Settings this controller was built with.
    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Provision a new VM and return its management endpoint.
    ///
    /// Without `id`, the identifier is derived from the allocated address.
    /// Issues `create`, `start` and `set` in that order; a failure aborts the
    /// remaining steps and is handled per [`PartialFailurePolicy`].
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier, unsupported
    /// template or exhausted subnets, [`ExecutorError::IdentifierInUse`] for a
    /// taken identifier, and the failing step's tool error otherwise.
    pub async fn create(
        &self,
        spec: &ResourceSpec,
        id: Option<&str>,
    ) -> Result<ManagementEndpoint, ExecutorError> {
        let span = tracing::info_span!("create", provision_id = %Uuid::new_v4());
        self.create_inner(spec, id).instrument(span).await
    }

    async fn create_inner(
        &self,
        spec: &ResourceSpec,
        id: Option<&str>,
    ) -> Result<ManagementEndpoint, ExecutorError> {
        let requested = id.map(|raw| self.validator.validate(raw)).transpose()?;
        let template = self.resolver.resolve(&spec.os, &spec.os_version)?;

        let claim = self
            .gateway
            .claim(&self.tool, &self.config.subnets, &self.validator, requested)
            .await?;
        let id = claim.id();
        let args = self.builder.build(spec, claim.address(), &template);

        tracing::info!(vm_id = %id, address = %claim.address(), %template, "creating VM");
        let previous = self.set_state(id, VmState::Creating).await;

        let steps = [
            (CreateStep::Create, ToolCommand::Create { id, args: args.create }),
            (CreateStep::Start, ToolCommand::Start(id)),
            (CreateStep::Configure, ToolCommand::Set { id, args: args.configure }),
        ];
        let mut completed = Vec::with_capacity(steps.len());
        for (step, command) in steps {
            if let Err(err) = self.tool.invoke(&command).await {
                tracing::error!(vm_id = %id, %step, ?completed, error = %err, "create aborted");
                self.recover_partial(id, previous, &completed).await;
                return Err(err);
            }
            completed.push(step);
        }
        // The listing now shows the VM, so the reservation can go.
        drop(claim);

        self.set_state(id, VmState::Running).await;
        tracing::info!(vm_id = %id, "VM running");
        self.activate_id(id).await
    }

    async fn recover_partial(
        &self,
        id: VmId,
        previous: Option<VmRecord>,
        completed: &[CreateStep],
    ) {
        if completed.is_empty() {
            self.restore_state(id, previous).await;
            return;
        }
        let settled = settled_after(completed);

        if self.config.partial_failure == PartialFailurePolicy::Teardown {
            let started = completed.contains(&CreateStep::Start);
            match self.teardown_known(id, started).await {
                Ok(()) => {
                    tracing::info!(vm_id = %id, "partial VM torn down");
                    return;
                }
                Err(err) => {
                    tracing::error!(vm_id = %id, error = %err, "teardown of partial VM failed");
                }
            }
        } else {
            tracing::warn!(vm_id = %id, state = %settled, "partial VM left for inspection");
        }
        self.set_state(id, settled).await;
    }

    /// Start a VM. Identical to [`VmController::restart`], since the tool's
    /// restart also starts a stopped VM.
    ///
    /// # Errors
    /// Same as [`VmController::restart`].
    pub async fn start(&self, id: &str) -> Result<ManagementEndpoint, ExecutorError> {
        self.restart(id).await
    }

    /// Restart a VM and re-activate its management endpoint.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier, the tool
    /// error if the restart fails, and lookup errors from activation.
    pub async fn restart(&self, id: &str) -> Result<ManagementEndpoint, ExecutorError> {
        let id = self.validator.validate(id)?;
        self.transition(id, VmState::Restarting, ToolCommand::Restart(id), VmState::Running)
            .await?;
        self.activate_id(id).await
    }

    /// Stop a VM.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier and the tool
    /// error if the stop fails.
    pub async fn stop(&self, id: &str) -> Result<(), ExecutorError> {
        let id = self.validator.validate(id)?;
        self.transition(id, VmState::Stopping, ToolCommand::Stop(id), VmState::Stopped)
            .await
    }

    /// Stop and then destroy a VM.
    ///
    /// The destroy is only issued after the stop succeeded.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier and the tool
    /// error of whichever step failed.
    pub async fn destroy(&self, id: &str) -> Result<(), ExecutorError> {
        let id = self.validator.validate(id)?;
        self.teardown_known(id, true).await
    }

    /// Clean up a VM in any state: stop it if the listing says it is
    /// running, then destroy it.
    ///
    /// # Errors
    /// Returns [`ExecutorError::VmNotFound`] if the VM is not listed, and the
    /// tool error of whichever step failed.
    pub async fn teardown(&self, id: &str) -> Result<(), ExecutorError> {
        let id = self.validator.validate(id)?;
        let listing = self.gateway.snapshot(&self.tool).await?;
        let running = listing
            .find(id)
            .ok_or(ExecutorError::VmNotFound(id))?
            .is_running();
        self.teardown_known(id, running).await
    }

    async fn teardown_known(&self, id: VmId, running: bool) -> Result<(), ExecutorError> {
        if running {
            self.transition(id, VmState::Stopping, ToolCommand::Stop(id), VmState::Stopped)
                .await?;
        }
        self.transition(id, VmState::Stopped, ToolCommand::Destroy(id), VmState::Destroyed)
            .await
    }

    /// Address of a VM, read from the live listing.
    ///
    /// # Errors
    /// Returns [`ExecutorError::VmNotFound`] if the VM is not listed and
    /// [`ExecutorError::AddressNotAssigned`] if it has no address.
    pub async fn get_address(&self, id: &str) -> Result<Ipv4Addr, ExecutorError> {
        let id = self.validator.validate(id)?;
        self.address_of(id).await
    }

    /// Whether the live listing reports the VM as running.
    ///
    /// # Errors
    /// Returns [`ExecutorError::VmNotFound`] if the VM is not listed.
    pub async fn is_running(&self, id: &str) -> Result<bool, ExecutorError> {
        let id = self.validator.validate(id)?;
        let listing = self.gateway.snapshot(&self.tool).await?;
        listing
            .find(id)
            .map(crate::listing::ListingEntry::is_running)
            .ok_or(ExecutorError::VmNotFound(id))
    }

    /// Look up the VM's address and pair it with its management port.
    ///
    /// # Errors
    /// Same as [`VmController::get_address`], plus activator failures.
    pub async fn activate(&self, id: &str) -> Result<ManagementEndpoint, ExecutorError> {
        let id = self.validator.validate(id)?;
        self.activate_id(id).await
    }

    /// Last state this controller recorded for the VM.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier.
    pub async fn state(&self, id: &str) -> Result<VmState, ExecutorError> {
        Ok(self
            .record(id)
            .await?
            .map_or(VmState::Absent, |record| record.state))
    }

    /// Registry entry for the VM, if this controller has seen it.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] for an invalid identifier.
    pub async fn record(&self, id: &str) -> Result<Option<VmRecord>, ExecutorError> {
        let id = self.validator.validate(id)?;
        Ok(self.states.lock().await.get(&id).copied())
    }

    /// Every VM on the host.
    ///
    /// # Errors
    /// Propagates listing tool failures.
    pub async fn list(&self) -> Result<Listing, ExecutorError> {
        self.gateway.snapshot(&self.tool).await
    }

    /// Check the control tools are installed.
    ///
    /// # Errors
    /// Propagates [`ControlTool::health_check`] failures.
    pub async fn health_check(&self) -> Result<(), ExecutorError> {
        self.tool.health_check().await
    }

    async fn address_of(&self, id: VmId) -> Result<Ipv4Addr, ExecutorError> {
        let listing = self.gateway.snapshot(&self.tool).await?;
        listing
            .find(id)
            .ok_or(ExecutorError::VmNotFound(id))?
            .address()
            .ok_or(ExecutorError::AddressNotAssigned(id))
    }

    async fn activate_id(&self, id: VmId) -> Result<ManagementEndpoint, ExecutorError> {
        let address = self.address_of(id).await?;
        self.activator.activate(id, address).await
    }

    async fn transition(
        &self,
        id: VmId,
        transient: VmState,
        command: ToolCommand,
        settled: VmState,
    ) -> Result<(), ExecutorError> {
        let previous = self.set_state(id, transient).await;
        if let Err(err) = self.tool.invoke(&command).await {
            tracing::warn!(
                vm_id = %id,
                subcommand = command.subcommand(),
                error = %err,
                "lifecycle step failed"
            );
            self.restore_state(id, previous).await;
            return Err(err);
        }
        self.set_state(id, settled).await;
        tracing::info!(vm_id = %id, state = %settled, "VM state changed");
        Ok(())
    }

    async fn restore_state(&self, id: VmId, previous: Option<VmRecord>) {
        let mut states = self.states.lock().await;
        match previous {
            Some(record) => states.insert(id, record),
            None => states.remove(&id),
        };
    }

    async fn set_state(&self, id: VmId, state: VmState) -> Option<VmRecord> {
        self.states.lock().await.insert(
            id,
            VmRecord {
                state,
                updated_at: Utc::now(),
            },
        )
    }
}
