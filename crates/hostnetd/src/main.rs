//! Host network daemon
//!
//! Watches the ARP table for hosts appearing, leaving or changing address,
//! and applies NetworkManager interface and route configuration.

mod config;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use hostnet_discovery::{
    ArpCommandReader, ArpSampler, ArpSource, ArpTableReader, DiscoveryEngine, PingProber,
    ProcArpReader, SystemInterfaces,
};
use hostnet_exec::{CommandRunner, CommandSpec, Credential, ProcessRunner};
use hostnet_netcfg::{
    AddressingMode, ConfigurationPlanner, InterfaceRequest, NmcliClient, PowerAction,
    RouteOutcome, WifiSettings,
};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{DaemonConfig, SUDO_PASSWORD_ENV};

/// Host network discovery and configuration
#[derive(Parser, Debug)]
#[command(name = "hostnetd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Seconds between periodic ARP samples
    #[arg(long)]
    refresh_interval: Option<u64>,

    /// Seconds allowed for one active probe
    #[arg(long)]
    probe_timeout: Option<u64>,

    /// ARP table source
    #[arg(long, value_enum)]
    arp_source: Option<ArpSourceArg>,

    /// Skip re-probing known hosts after each sample
    #[arg(long)]
    no_liveness_sweep: bool,

    /// Re-key local interfaces onto ARP segment names
    #[arg(long)]
    reconcile_segment_names: bool,

    /// nmcli executable
    #[arg(long)]
    nmcli_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ArpSourceArg {
    Proc,
    Command,
}

impl From<ArpSourceArg> for ArpSource {
    fn from(arg: ArpSourceArg) -> Self {
        match arg {
            ArpSourceArg::Proc => ArpSource::Proc,
            ArpSourceArg::Command => ArpSource::Command,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track hosts and log changes until interrupted
    Watch,
    /// Print the current address table as JSON
    List {
        /// Only this host's own addresses
        #[arg(long)]
        self_only: bool,
    },
    /// Print the MAC address holding an IP on a network
    Resolve {
        #[arg(long)]
        network: String,
        #[arg(long)]
        ip: Ipv4Addr,
        /// Probe the host if it is not yet known
        #[arg(long)]
        active: bool,
    },
    /// Print local IPv4 networks per interface
    Interfaces,
    /// Reconfigure an interface through NetworkManager
    #[command(group(ArgGroup::new("addressing").required(true).args(["dhcp", "address"])))]
    Configure {
        #[arg(long)]
        interface: String,
        /// Obtain the address by DHCP
        #[arg(long)]
        dhcp: bool,
        /// Static address with prefix, e.g. 192.168.1.5/24
        #[arg(long)]
        address: Option<Ipv4Network>,
        #[arg(long, requires = "address")]
        gateway: Option<Ipv4Addr>,
        /// WiFi SSID; makes the connection wireless
        #[arg(long)]
        ssid: Option<String>,
        #[arg(long, requires = "ssid")]
        wifi_password: Option<String>,
        #[arg(long, requires = "ssid")]
        wifi_password_confirm: Option<String>,
        /// none, reboot or shutdown
        #[arg(long, default_value = "none")]
        power: String,
    },
    /// Add or move a static route
    Route {
        #[arg(long)]
        target: Ipv4Network,
        #[arg(long)]
        gateway: Ipv4Addr,
    },
    /// List NetworkManager devices
    Devices,
    /// List visible WiFi access points
    WifiScan,
    /// Print virtual memory statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = effective_config(&args)?;
    let runner: Arc<dyn CommandRunner> =
        Arc::new(ProcessRunner::with_sudo_path(config.netcfg.sudo_path.clone()));

    match args.command {
        Command::Watch => watch(build_engine(&config, &runner)).await,
        Command::List { self_only } => {
            let engine = build_engine(&config, &runner);
            engine.refresh().await.context("Failed to sample the ARP table")?;
            println!("{}", serde_json::to_string_pretty(&engine.macs(self_only))?);
            Ok(())
        }
        Command::Resolve {
            network,
            ip,
            active,
        } => {
            let engine = build_engine(&config, &runner);
            let mac = engine.resolve(&network, ip, active).await?;
            println!("{}", mac);
            Ok(())
        }
        Command::Interfaces => {
            let engine = build_engine(&config, &runner);
            for (name, networks) in engine.network_interfaces()? {
                let networks: Vec<String> = networks.iter().map(|n| n.to_string()).collect();
                println!("{}\t{}", name, networks.join(" "));
            }
            Ok(())
        }
        Command::Configure {
            interface,
            dhcp: _,
            address,
            gateway,
            ssid,
            wifi_password,
            wifi_password_confirm,
            power,
        } => {
            let addressing = match address {
                Some(address) => AddressingMode::Static { address, gateway },
                None => AddressingMode::Dhcp,
            };
            let mut request = InterfaceRequest::new(interface, addressing)
                .with_power(power.parse::<PowerAction>()?);
            if let Some(ssid) = ssid {
                request = request.with_wifi(WifiSettings {
                    ssid,
                    ssid_manual: String::new(),
                    password: wifi_password.unwrap_or_default(),
                    password_confirm: wifi_password_confirm.unwrap_or_default(),
                });
            }

            let planner = ConfigurationPlanner::new(runner, config.netcfg.clone())
                .with_barrier_hook(Arc::new(|| info!("Settings accepted")));
            let credential = sudo_credential();
            let outputs = planner
                .apply_interface(&mut request, credential.as_ref())
                .await?;
            print_outputs(&outputs);
            Ok(())
        }
        Command::Route { target, gateway } => {
            let planner = ConfigurationPlanner::new(runner, config.netcfg.clone());
            let credential = sudo_credential();
            match planner.apply_route(target, gateway, credential.as_ref()).await? {
                RouteOutcome::Unchanged => println!("unchanged"),
                RouteOutcome::Applied(outputs) => print_outputs(&outputs),
            }
            Ok(())
        }
        Command::Devices => {
            let client = NmcliClient::new(runner, config.netcfg.nmcli_path.clone());
            let list = client.list_devices().await?;
            for device in &list.devices {
                println!("{}", device);
            }
            info!(wlan = list.wlan_exists, "Devices listed");
            Ok(())
        }
        Command::WifiScan => {
            let client = NmcliClient::new(runner, config.netcfg.nmcli_path.clone());
            if !client.is_supported().await {
                warn!("NetworkManager is not available; install network-manager");
            }
            for ssid in client.scan_wifi().await {
                println!("{}", ssid);
            }
            Ok(())
        }
        Command::Status => {
            let stdout = runner
                .run(&CommandSpec::new("vmstat", Vec::<String>::new()), None)
                .await?;
            for line in stdout.lines() {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

/// Initialize structured logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();

    Ok(())
}

/// Configuration file overlaid with command-line flags
fn effective_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = DaemonConfig::load(args.config.as_deref())?;
    let discovery = &mut config.discovery;

    if let Some(secs) = args.refresh_interval {
        discovery.refresh_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.probe_timeout {
        discovery.probe_timeout = Duration::from_secs(secs);
    }
    if let Some(source) = args.arp_source {
        discovery.arp_source = source.into();
    }
    if args.no_liveness_sweep {
        discovery.liveness_sweep = false;
    }
    if args.reconcile_segment_names {
        discovery.reconcile_segment_names = true;
    }
    if let Some(path) = &args.nmcli_path {
        config.netcfg.nmcli_path = path.clone();
    }

    Ok(config)
}

fn build_engine(config: &DaemonConfig, runner: &Arc<dyn CommandRunner>) -> DiscoveryEngine {
    let discovery = config.discovery.clone();
    let reader: Arc<dyn ArpTableReader> = match discovery.arp_source {
        ArpSource::Proc => Arc::new(ProcArpReader::default()),
        ArpSource::Command => Arc::new(ArpCommandReader::new(runner.clone())),
    };
    let sampler = ArpSampler::new(reader, Arc::new(SystemInterfaces))
        .with_segment_reconciliation(discovery.reconcile_segment_names);
    let prober = Arc::new(PingProber::new(runner.clone()));
    DiscoveryEngine::new(sampler, prober, discovery)
}

async fn watch(engine: DiscoveryEngine) -> Result<()> {
    info!(
        interval = ?engine.config().refresh_interval,
        "hostnetd: Starting discovery"
    );
    let shutdown = CancellationToken::new();
    let handle = engine.start(shutdown.clone());

    signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("hostnetd: Received shutdown signal");
    shutdown.cancel();
    handle.await.context("Discovery loop panicked")?;
    Ok(())
}

fn sudo_credential() -> Option<Credential> {
    std::env::var(SUDO_PASSWORD_ENV).ok().map(Credential::new)
}

fn print_outputs(outputs: &[String]) {
    for output in outputs.iter().filter(|o| !o.trim().is_empty()) {
        print!("{}", output);
    }
}
