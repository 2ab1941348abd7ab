//! Resource requests and the control-tool arguments built from them.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::config::ProvisionConfig;
use crate::template::OsTemplate;

/// Caller-supplied description of a VM request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ResourceSpec {
    /// Lab the VM belongs to; blank means the configured default.
    pub lab_id: String,
    /// OS name; blank means the configured default.
    pub os: String,
    /// OS version; blank means the configured default.
    pub os_version: String,
    /// Memory in mebibytes.
    pub ram_mib: u32,
    /// Swap in mebibytes.
    pub swap_mib: u32,
    /// Disk soft limit in mebibytes.
    pub disk_mib: u32,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            lab_id: String::new(),
            os: String::new(),
            os_version: String::new(),
            ram_mib: 256,
            swap_mib: 512,
            disk_mib: 10_240,
        }
    }
}

impl ResourceSpec {
    /// Request the given OS and version with default resources.
    pub fn new(os: impl Into<String>, os_version: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            os_version: os_version.into(),
            ..Self::default()
        }
    }

    /// Set the lab id.
    #[must_use]
    pub fn with_lab_id(mut self, lab_id: impl Into<String>) -> Self {
        self.lab_id = lab_id.into();
        self
    }

    /// Set memory and swap in mebibytes.
    #[must_use]
    pub fn with_memory(mut self, ram_mib: u32, swap_mib: u32) -> Self {
        self.ram_mib = ram_mib;
        self.swap_mib = swap_mib;
        self
    }

    /// Set the disk soft limit in mebibytes.
    #[must_use]
    pub fn with_disk(mut self, disk_mib: u32) -> Self {
        self.disk_mib = disk_mib;
        self
    }
}

/// Arguments for the control tool's `create` and `set` subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct ProvisioningArgs {
    /// Passed after `create <id>`.
    pub create: Vec<String>,
    /// Passed after `set <id>`.
    pub configure: Vec<String>,
}

/// Formats a [`ResourceSpec`] into control-tool arguments.
#[derive(Debug, Clone)]
pub struct ProvisioningSpecBuilder {
    nameserver: Ipv4Addr,
    host_domain: String,
    default_lab_id: String,
}

impl ProvisioningSpecBuilder {
    /// Create a builder from the provisioning settings.
    #[must_use]
    pub fn new(config: &ProvisionConfig) -> Self {
        Self {
            nameserver: config.nameserver,
            host_domain: config.host_domain.clone(),
            default_lab_id: config.default_lab_id.clone(),
        }
    }

    /// Hostname for a VM of the given lab: `<lab_id>.<host_domain>`.
    #[must_use]
    pub fn hostname(&self, spec: &ResourceSpec) -> String {
        let lab_id = match spec.lab_id.trim() {
            "" => self.default_lab_id.as_str(),
            given => given,
        };
        format!("{lab_id}.{}", self.host_domain)
    }

    /// Build both argument groups.
    ///
    /// The disk hard limit is the soft limit plus ten percent.
    #[must_use]
    pub fn build(
        &self,
        spec: &ResourceSpec,
        address: Ipv4Addr,
        template: &OsTemplate,
    ) -> ProvisioningArgs {
        let disk_soft = spec.disk_mib;
        let disk_hard = disk_soft.saturating_add(disk_soft / 10);

        let create = vec![
            "--ostemplate".to_owned(),
            template.as_str().to_owned(),
            "--ipadd".to_owned(),
            address.to_string(),
            "--diskspace".to_owned(),
            format!("{disk_soft}M:{disk_hard}M"),
            "--hostname".to_owned(),
            self.hostname(spec),
        ];

        let configure = vec![
            "--nameserver".to_owned(),
            self.nameserver.to_string(),
            "--ram".to_owned(),
            format!("{}M", spec.ram_mib),
            "--swap".to_owned(),
            format!("{}M", spec.swap_mib),
            "--onboot".to_owned(),
            "yes".to_owned(),
            "--save".to_owned(),
        ];

        ProvisioningArgs { create, configure }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateResolver;

    fn template() -> OsTemplate {
        match TemplateResolver::new("Ubuntu", "12.04").resolve("debian", "6") {
            Ok(t) => t,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    fn builder() -> ProvisioningSpecBuilder {
        ProvisioningSpecBuilder::new(&ProvisionConfig::default())
    }

    #[test]
    fn create_args_in_order() {
        let spec = ResourceSpec::new("debian", "6").with_lab_id("cse02").with_disk(2048);
        let args = builder().build(&spec, Ipv4Addr::new(10, 1, 100, 7), &template());
        assert_eq!(
            args.create,
            [
                "--ostemplate",
                "debian-6.0-x86_64",
                "--ipadd",
                "10.1.100.7",
                "--diskspace",
                "2048M:2252M",
                "--hostname",
                "cse02.vlabs.ac.in",
            ]
        );
    }

    #[test]
    fn configure_args_in_order() {
        let spec = ResourceSpec::new("debian", "6").with_memory(1024, 2048);
        let args = builder().build(&spec, Ipv4Addr::new(10, 1, 100, 7), &template());
        assert_eq!(
            args.configure,
            [
                "--nameserver",
                "10.10.10.10",
                "--ram",
                "1024M",
                "--swap",
                "2048M",
                "--onboot",
                "yes",
                "--save",
            ]
        );
    }

    #[test]
    fn blank_lab_id_uses_default() {
        let spec = ResourceSpec::new("", "").with_lab_id("   ");
        assert_eq!(builder().hostname(&spec), "engg01.vlabs.ac.in");
    }

    #[test]
    fn resource_spec_from_partial_json() {
        let parsed: Result<ResourceSpec, _> =
            serde_json::from_str(r#"{"os": "CentOS", "os_version": "6.3", "ram_mib": 512}"#);
        let spec = match parsed {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(spec.ram_mib, 512);
        assert_eq!(spec.swap_mib, 512);
        assert!(spec.lab_id.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn proptest_build_is_deterministic(
            lab_id in "[a-z0-9]{0,12}",
            ram in 64u32..65_536,
            swap in 0u32..65_536,
            disk in 1u32..1_000_000,
            host in 1u8..255,
        ) {
            let spec = ResourceSpec::new("ubuntu", "12")
                .with_lab_id(lab_id)
                .with_memory(ram, swap)
                .with_disk(disk);
            let address = Ipv4Addr::new(10, 1, 100, host);
            let first = builder().build(&spec, address, &template());
            let second = builder().build(&spec.clone(), address, &template());
            proptest::prop_assert_eq!(first, second);
        }
    }
}
