//! Provisioning configuration, loaded once and passed to each component.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{IdentifierValidator, DEFAULT_MAX_VM_ID, MIN_VM_ID_EXCLUSIVE};
use crate::template::TemplateResolver;

/// What the controller does with a VM whose create sequence failed part-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PartialFailurePolicy {
    /// Leave the partial VM in place for manual inspection.
    #[default]
    Leave,
    /// Stop (if started) and destroy the partial VM before reporting the error.
    Teardown,
}

/// Host-wide provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ProvisionConfig {
    /// Nameserver written into every VM.
    pub nameserver: Ipv4Addr,

    /// Subnets scanned for free addresses, in order.
    pub subnets: Vec<Ipv4Network>,

    /// Port of the management agent inside each VM.
    pub management_port: u16,

    /// Domain appended to the lab id to form the VM hostname.
    pub host_domain: String,

    /// Lab id used when a request leaves it blank.
    pub default_lab_id: String,

    /// Largest identifier the control tool accepts.
    pub max_vm_id: u32,

    /// OS used when a request leaves it blank.
    pub default_os: String,

    /// OS version used when a request leaves it blank.
    pub default_os_version: String,

    /// Cleanup behaviour after a partial create.
    pub partial_failure: PartialFailurePolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            nameserver: Ipv4Addr::new(10, 10, 10, 10),
            subnets: vec![lab_subnet(100), lab_subnet(101)],
            management_port: 8089,
            host_domain: "vlabs.ac.in".to_owned(),
            default_lab_id: "engg01".to_owned(),
            max_vm_id: DEFAULT_MAX_VM_ID,
            default_os: "Ubuntu".to_owned(),
            default_os_version: "12.04".to_owned(),
            partial_failure: PartialFailurePolicy::Leave,
        }
    }
}

#[expect(clippy::expect_used, reason = "a /24 prefix is always valid")]
fn lab_subnet(third_octet: u8) -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 1, third_octet, 0), 24).expect("valid /24 subnet")
}

impl ProvisionConfig {
    /// Replace the subnet list.
    #[must_use]
    pub fn with_subnets(mut self, subnets: Vec<Ipv4Network>) -> Self {
        self.subnets = subnets;
        self
    }

    /// Replace the partial-failure policy.
    #[must_use]
    pub fn with_partial_failure(mut self, policy: PartialFailurePolicy) -> Self {
        self.partial_failure = policy;
        self
    }

    /// Replace the management port.
    #[must_use]
    pub fn with_management_port(mut self, port: u16) -> Self {
        self.management_port = port;
        self
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |field: &str, reason: &str| {
            Err(CoreError::InvalidConfig {
                field: field.to_owned(),
                reason: reason.to_owned(),
            })
        };

        if self.subnets.is_empty() {
            return invalid("subnets", "at least one subnet is required");
        }
        if self.max_vm_id <= MIN_VM_ID_EXCLUSIVE {
            return invalid("max_vm_id", "must be greater than 100");
        }
        if self.host_domain.trim().is_empty() {
            return invalid("host_domain", "must not be blank");
        }
        if self.default_lab_id.trim().is_empty() {
            return invalid("default_lab_id", "must not be blank");
        }
        if self.default_os.trim().is_empty() {
            return invalid("default_os", "must not be blank");
        }
        if self.default_os_version.trim().is_empty() {
            return invalid("default_os_version", "must not be blank");
        }
        Ok(())
    }

    /// Identifier validator bounded by `max_vm_id`.
    #[must_use]
    pub fn identifier_validator(&self) -> IdentifierValidator {
        IdentifierValidator::new(self.max_vm_id)
    }

    /// Template resolver using the configured defaults.
    #[must_use]
    pub fn template_resolver(&self) -> TemplateResolver {
        TemplateResolver::new(&self.default_os, &self.default_os_version)
    }
}
