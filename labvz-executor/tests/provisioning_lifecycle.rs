//! End-to-end lifecycle tests against an in-memory OpenVZ host.
//!
//! `FakeHost` applies each control command to a table of containers and
//! renders that table as the listing, so the controller sees its own
//! effects exactly as it would on a real host.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use labvz_core::{
    CoreError, ManagementEndpoint, PartialFailurePolicy, ProvisionConfig, ResourceSpec,
};
use labvz_executor::{ControlTool, ExecutorError, ToolCommand, VmController, VmState};

#[derive(Debug, Clone)]
struct Container {
    status: &'static str,
    address: Option<String>,
    hostname: Option<String>,
}

#[derive(Default)]
struct FakeHost {
    containers: Mutex<BTreeMap<u32, Container>>,
    issued: Mutex<Vec<String>>,
    fail: Vec<&'static str>,
    create_delay: Option<Duration>,
}

impl FakeHost {
    fn failing(fail: &[&'static str]) -> Self {
        Self {
            fail: fail.to_vec(),
            ..Self::default()
        }
    }

    fn with_container(self, ctid: u32, status: &'static str, address: &str) -> Self {
        if let Ok(mut containers) = self.containers.lock() {
            containers.insert(
                ctid,
                Container {
                    status,
                    address: Some(address.to_owned()),
                    hostname: Some("existing.vlabs.ac.in".to_owned()),
                },
            );
        }
        self
    }

    fn issued(&self) -> Vec<String> {
        self.issued.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn subcommands(&self) -> Vec<String> {
        self.issued()
            .iter()
            .filter_map(|line| line.split(' ').next().map(str::to_owned))
            .collect()
    }

    fn exists(&self, ctid: u32) -> bool {
        self.containers
            .lock()
            .map(|c| c.contains_key(&ctid))
            .unwrap_or(false)
    }

    fn failure(command: &ToolCommand, stderr: &str) -> ExecutorError {
        ExecutorError::ToolInvocationFailed {
            command: format!("vzctl {command}"),
            status: Some(1),
            stderr: stderr.to_owned(),
        }
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[async_trait]
impl ControlTool for FakeHost {
    async fn invoke(&self, command: &ToolCommand) -> Result<(), ExecutorError> {
        if let Ok(mut issued) = self.issued.lock() {
            issued.push(command.to_string());
        }
        if self.fail.contains(&command.subcommand()) {
            return Err(Self::failure(command, "injected failure"));
        }
        if command.subcommand() == "create" {
            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }
        }

        let ctid = command.id().get();
        let mut containers = match self.containers.lock() {
            Ok(c) => c,
            Err(e) => panic!("fake host lock poisoned: {e}"),
        };
        let args = command.to_args();
        match command.subcommand() {
            "create" => {
                if containers.contains_key(&ctid) {
                    return Err(Self::failure(command, "container already exists"));
                }
                containers.insert(
                    ctid,
                    Container {
                        status: "stopped",
                        address: flag_value(&args, "--ipadd"),
                        hostname: flag_value(&args, "--hostname"),
                    },
                );
            }
            "start" | "restart" => match containers.get_mut(&ctid) {
                Some(c) => c.status = "running",
                None => return Err(Self::failure(command, "container does not exist")),
            },
            "stop" => match containers.get_mut(&ctid) {
                Some(c) => c.status = "stopped",
                None => return Err(Self::failure(command, "container does not exist")),
            },
            "set" => {
                if !containers.contains_key(&ctid) {
                    return Err(Self::failure(command, "container does not exist"));
                }
            }
            "destroy" => {
                if containers.remove(&ctid).is_none() {
                    return Err(Self::failure(command, "container does not exist"));
                }
            }
            other => panic!("unexpected subcommand {other}"),
        }
        Ok(())
    }

    async fn list(&self) -> Result<String, ExecutorError> {
        let containers = match self.containers.lock() {
            Ok(c) => c,
            Err(e) => panic!("fake host lock poisoned: {e}"),
        };
        Ok(containers
            .iter()
            .map(|(ctid, c)| {
                format!(
                    "{ctid:>10} {:<9} {:<15} {}\n",
                    c.status,
                    c.address.as_deref().unwrap_or("-"),
                    c.hostname.as_deref().unwrap_or("-"),
                )
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), ExecutorError> {
        Ok(())
    }
}

fn controller(host: &Arc<FakeHost>, config: ProvisionConfig) -> VmController<Arc<FakeHost>> {
    match VmController::new(Arc::clone(host), config) {
        Ok(c) => c,
        Err(e) => panic!("controller construction failed: {e}"),
    }
}

fn endpoint(a: u8, b: u8, c: u8, d: u8) -> ManagementEndpoint {
    ManagementEndpoint::new(Ipv4Addr::new(a, b, c, d), 8089)
}

/// Blank id, Debian 6: first free address of the first subnet, debian
/// template, create/start/set in order, endpoint on the management port.
#[tokio::test]
async fn create_debian_with_derived_id() {
    let host = Arc::new(FakeHost::default());
    let ctl = controller(&host, ProvisionConfig::default());

    let result = ctl.create(&ResourceSpec::new("Debian", "6"), None).await;
    assert_eq!(result.ok(), Some(endpoint(10, 1, 100, 1)));

    assert_eq!(host.subcommands(), ["create", "start", "set"]);
    let issued = host.issued();
    assert!(issued[0].starts_with("create 1001 --ostemplate debian-6.0-x86_64 --ipadd 10.1.100.1"));
    assert!(issued[0].ends_with("--hostname engg01.vlabs.ac.in"));
    assert_eq!(
        issued[2],
        "set 1001 --nameserver 10.10.10.10 --ram 256M --swap 512M --onboot yes --save"
    );

    assert_eq!(ctl.state("1001").await.ok(), Some(VmState::Running));
    assert_eq!(ctl.is_running("1001").await.ok(), Some(true));
    assert_eq!(ctl.get_address("1001").await.ok(), Some(Ipv4Addr::new(10, 1, 100, 1)));
}

#[tokio::test]
async fn create_with_supplied_id_uses_next_free_address() {
    let host = Arc::new(FakeHost::default().with_container(4000, "running", "10.1.100.1"));
    let ctl = controller(&host, ProvisionConfig::default());

    let spec = ResourceSpec::new("ubuntu", "12.04").with_lab_id("cse02");
    let result = ctl.create(&spec, Some(" 4242 ")).await;
    assert_eq!(result.ok(), Some(endpoint(10, 1, 100, 2)));
    assert!(host.issued()[0].starts_with("create 4242 --ostemplate ubuntu-12.04-x86_64"));
    assert!(host.issued()[0].ends_with("--hostname cse02.vlabs.ac.in"));
}

#[tokio::test]
async fn create_with_existing_id_is_rejected_before_any_invocation() {
    let host = Arc::new(FakeHost::default().with_container(4242, "running", "10.1.100.1"));
    let ctl = controller(&host, ProvisionConfig::default());

    let result = ctl.create(&ResourceSpec::default(), Some("4242")).await;
    assert!(matches!(result, Err(ExecutorError::IdentifierInUse(_))));
    assert!(host.issued().is_empty());
}

#[tokio::test]
async fn derived_creates_skip_addresses_whose_id_is_taken() {
    let host = Arc::new(FakeHost::default());
    let ctl = controller(&host, ProvisionConfig::default());
    let spec = ResourceSpec::default();

    // 1002 lands on 10.1.100.1, so 10.1.100.2 would derive a listed id.
    let supplied = ctl.create(&spec, Some("1002")).await;
    assert_eq!(supplied.ok(), Some(endpoint(10, 1, 100, 1)));

    let first = ctl.create(&spec, None).await;
    assert_eq!(first.ok(), Some(endpoint(10, 1, 100, 3)));
    let second = ctl.create(&spec, None).await;
    assert_eq!(second.ok(), Some(endpoint(10, 1, 100, 4)));

    assert!(host.exists(1003));
    assert!(host.exists(1004));
    assert_eq!(ctl.get_address("1002").await.ok(), Some(Ipv4Addr::new(10, 1, 100, 1)));
}

#[tokio::test]
async fn create_with_invalid_id_is_rejected() {
    let host = Arc::new(FakeHost::default());
    let ctl = controller(&host, ProvisionConfig::default());

    let result = ctl.create(&ResourceSpec::default(), Some("99")).await;
    assert!(matches!(
        result,
        Err(ExecutorError::Core(CoreError::InvalidIdentifier { .. }))
    ));
    assert!(host.issued().is_empty());
}

#[tokio::test]
async fn create_fails_when_subnets_exhausted() {
    let config = ProvisionConfig::default().with_subnets(vec![match "10.1.100.0/30".parse() {
        Ok(n) => n,
        Err(e) => panic!("bad subnet: {e}"),
    }]);
    let host = Arc::new(
        FakeHost::default()
            .with_container(4001, "running", "10.1.100.1")
            .with_container(4002, "running", "10.1.100.2"),
    );
    let ctl = controller(&host, config);

    let result = ctl.create(&ResourceSpec::default(), None).await;
    assert!(matches!(
        result,
        Err(ExecutorError::Core(CoreError::NoAddressAvailable { .. }))
    ));
    assert!(host.issued().is_empty());
}

/// Destroying a VM that does not exist: the stop fails and destroy is
/// never issued.
#[tokio::test]
async fn destroy_missing_vm_stops_at_failed_stop() {
    let host = Arc::new(FakeHost::default());
    let ctl = controller(&host, ProvisionConfig::default());

    let result = ctl.destroy("4242").await;
    match result {
        Err(ExecutorError::ToolInvocationFailed { command, status, .. }) => {
            assert_eq!(command, "vzctl stop 4242");
            assert_eq!(status, Some(1));
        }
        other => panic!("expected ToolInvocationFailed, got {other:?}"),
    }
    assert_eq!(host.subcommands(), ["stop"]);
}

#[tokio::test]
async fn destroy_existing_vm_stops_then_destroys() {
    let host = Arc::new(FakeHost::default().with_container(4242, "running", "10.1.100.9"));
    let ctl = controller(&host, ProvisionConfig::default());

    assert!(ctl.destroy("4242").await.is_ok());
    assert_eq!(host.subcommands(), ["stop", "destroy"]);
    assert!(!host.exists(4242));
    assert_eq!(ctl.state("4242").await.ok(), Some(VmState::Destroyed));
}

/// An identifier absent from the listing is an explicit `VmNotFound`.
#[tokio::test]
async fn get_address_of_unknown_vm_is_not_found() {
    let host = Arc::new(FakeHost::default().with_container(4000, "running", "10.1.100.1"));
    let ctl = controller(&host, ProvisionConfig::default());

    match ctl.get_address("4242").await {
        Err(ExecutorError::VmNotFound(id)) => assert_eq!(id.get(), 4242),
        other => panic!("expected VmNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn stop_and_restart_round_trip() {
    let host = Arc::new(FakeHost::default());
    let ctl = controller(&host, ProvisionConfig::default());
    assert!(ctl.create(&ResourceSpec::default(), None).await.is_ok());

    assert!(ctl.stop("1001").await.is_ok());
    assert_eq!(ctl.is_running("1001").await.ok(), Some(false));
    assert_eq!(ctl.state("1001").await.ok(), Some(VmState::Stopped));

    let restarted = ctl.restart("1001").await;
    assert_eq!(restarted.ok(), Some(endpoint(10, 1, 100, 1)));
    assert_eq!(ctl.is_running("1001").await.ok(), Some(true));
}

#[tokio::test]
async fn partial_create_is_left_by_default() {
    let host = Arc::new(FakeHost::failing(&["set"]));
    let ctl = controller(&host, ProvisionConfig::default());

    let result = ctl.create(&ResourceSpec::default(), None).await;
    assert!(matches!(result, Err(ExecutorError::ToolInvocationFailed { .. })));
    assert_eq!(host.subcommands(), ["create", "start", "set"]);
    assert!(host.exists(1001), "partial VM must be left for inspection");
    assert_eq!(ctl.state("1001").await.ok(), Some(VmState::Running));
}

#[tokio::test]
async fn partial_create_is_torn_down_when_configured() {
    let host = Arc::new(FakeHost::failing(&["set"]));
    let config = ProvisionConfig::default().with_partial_failure(PartialFailurePolicy::Teardown);
    let ctl = controller(&host, config);

    let result = ctl.create(&ResourceSpec::default(), None).await;
    assert!(
        matches!(
            result,
            Err(ExecutorError::ToolInvocationFailed { ref command, .. })
                if command.contains("set 1001")
        ),
        "the set failure must be reported, got {result:?}"
    );
    assert_eq!(
        host.subcommands(),
        ["create", "start", "set", "stop", "destroy"]
    );
    assert!(!host.exists(1001));
    assert_eq!(ctl.state("1001").await.ok(), Some(VmState::Destroyed));
}

#[tokio::test]
async fn teardown_after_failed_start_skips_stop() {
    let host = Arc::new(FakeHost::failing(&["start"]));
    let config = ProvisionConfig::default().with_partial_failure(PartialFailurePolicy::Teardown);
    let ctl = controller(&host, config);

    assert!(ctl.create(&ResourceSpec::default(), None).await.is_err());
    assert_eq!(host.subcommands(), ["create", "start", "destroy"]);
    assert!(!host.exists(1001));
}

#[tokio::test]
async fn failed_create_step_releases_address() {
    let host = Arc::new(FakeHost::failing(&["create"]));
    let ctl = controller(&host, ProvisionConfig::default());

    assert!(ctl.create(&ResourceSpec::default(), None).await.is_err());
    assert_eq!(ctl.state("1001").await.ok(), Some(VmState::Absent));
    // Same address is offered again.
    assert!(ctl.create(&ResourceSpec::default(), None).await.is_err());
    let issued = host.issued();
    assert!(issued.iter().all(|line| line.starts_with("create 1001")));
}

#[tokio::test]
async fn concurrent_creates_never_share_an_address() {
    let host = Arc::new(FakeHost {
        create_delay: Some(Duration::from_millis(20)),
        ..FakeHost::default()
    });
    let ctl = Arc::new(controller(&host, ProvisionConfig::default()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ctl = Arc::clone(&ctl);
        tasks.push(tokio::spawn(async move {
            ctl.create(&ResourceSpec::default(), None).await
        }));
    }

    let mut addresses = HashSet::new();
    for task in tasks {
        match task.await {
            Ok(Ok(endpoint)) => {
                addresses.insert(endpoint.address);
            }
            other => panic!("create failed: {other:?}"),
        }
    }
    assert_eq!(addresses.len(), 8, "every VM must get its own address");
    assert_eq!(host.subcommands().iter().filter(|s| *s == "create").count(), 8);
}
