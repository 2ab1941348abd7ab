//! The `labvz` operator command line.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use labvz_core::{ManagementEndpoint, ResourceSpec};
use labvz_executor::{VmController, VzctlTool};

use crate::repo::RepoSync;
use crate::settings::Settings;
use crate::trigger::TestTrigger;
use crate::LabError;

/// Provision and manage lab VMs on this OpenVZ host.
#[derive(Debug, Parser)]
#[command(name = "labvz", version)]
pub struct Cli {
    /// TOML settings file; built-in defaults are used without one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Vm(VmCommand),

    /// Clone or refresh a lab repository and print its lab spec.
    SyncLab {
        lab_id: String,
        url: String,
        /// Tag, branch or commit to check out.
        #[arg(long)]
        version: Option<String>,
    },

    /// Ask a VM's management agent to install and test a lab.
    TestLab {
        address: Ipv4Addr,
        port: u16,
        url: String,
        #[arg(long)]
        version: Option<String>,
    },
}

/// Commands that drive the VM controller.
#[derive(Debug, Subcommand)]
pub enum VmCommand {
    /// Create and start a VM, then print its management endpoint.
    Create(CreateArgs),
    /// Start a VM.
    Start { id: String },
    /// Restart a VM.
    Restart { id: String },
    /// Stop a VM.
    Stop { id: String },
    /// Stop and destroy a VM.
    Destroy { id: String },
    /// Destroy a VM in whatever state it is in.
    Teardown { id: String },
    /// Print a VM's address.
    Ip { id: String },
    /// Print whether a VM is running.
    Status { id: String },
    /// List every VM on the host.
    List,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// VM id; derived from the allocated address when omitted.
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long, default_value = "")]
    pub lab_id: String,
    #[arg(long, default_value = "")]
    pub os: String,
    #[arg(long, default_value = "")]
    pub os_version: String,
    /// Memory in MiB.
    #[arg(long, default_value_t = 256)]
    pub ram: u32,
    /// Swap in MiB.
    #[arg(long, default_value_t = 512)]
    pub swap: u32,
    /// Disk soft limit in MiB.
    #[arg(long, default_value_t = 10_240)]
    pub disk: u32,
}

impl CreateArgs {
    #[must_use]
    pub fn resource_spec(&self) -> ResourceSpec {
        ResourceSpec::new(self.os.as_str(), self.os_version.as_str())
            .with_lab_id(self.lab_id.as_str())
            .with_memory(self.ram, self.swap)
            .with_disk(self.disk)
    }
}

/// Run one parsed command, printing its result on stdout.
///
/// # Errors
/// Returns whatever the selected operation fails with, and
/// [`LabError::TestFailed`] when a lab test completes unsuccessfully.
pub async fn run(cli: Cli) -> Result<(), LabError> {
    let settings = Settings::load(cli.config.as_deref()).await?;

    match cli.command {
        Command::Vm(command) => run_vm(command, settings).await,
        Command::SyncLab { lab_id, url, version } => {
            let spec = RepoSync::new(settings.lab)
                .sync(&lab_id, &url, version.as_deref())
                .await?;
            println!("{spec}");
            Ok(())
        }
        Command::TestLab {
            address,
            port,
            url,
            version,
        } => {
            let endpoint = ManagementEndpoint::new(address, port);
            let outcome = TestTrigger::new(&settings.lab)
                .test_lab(&endpoint, &url, version.as_deref())
                .await?;
            println!("{}", outcome.response);
            if outcome.success {
                Ok(())
            } else {
                Err(LabError::TestFailed(format!("lab test on {endpoint} did not succeed")))
            }
        }
    }
}

async fn run_vm(command: VmCommand, settings: Settings) -> Result<(), LabError> {
    let ctl = VmController::new(VzctlTool::new(&settings.tool), settings.provision)?;

    match command {
        VmCommand::Create(args) => {
            let endpoint = ctl.create(&args.resource_spec(), args.id.as_deref()).await?;
            println!("{endpoint}");
        }
        VmCommand::Start { id } => println!("{}", ctl.start(&id).await?),
        VmCommand::Restart { id } => println!("{}", ctl.restart(&id).await?),
        VmCommand::Stop { id } => ctl.stop(&id).await?,
        VmCommand::Destroy { id } => ctl.destroy(&id).await?,
        VmCommand::Teardown { id } => ctl.teardown(&id).await?,
        VmCommand::Ip { id } => println!("{}", ctl.get_address(&id).await?),
        VmCommand::Status { id } => {
            let running = ctl.is_running(&id).await?;
            println!("{}", if running { "running" } else { "not running" });
        }
        VmCommand::List => {
            for entry in ctl.list().await?.entries() {
                let addresses: Vec<String> =
                    entry.addresses.iter().map(ToString::to_string).collect();
                println!(
                    "{:>10} {:<9} {:<15} {}",
                    entry.ctid,
                    entry.status,
                    if addresses.is_empty() { "-".to_owned() } else { addresses.join(",") },
                    entry.hostname.as_deref().unwrap_or("-"),
                );
            }
        }
    }
    Ok(())
}
