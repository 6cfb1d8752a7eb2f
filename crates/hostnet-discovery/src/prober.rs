//! Active reachability probing
//!
//! A probe exists to provoke an ARP exchange, so its answer is secondary:
//! callers re-sample the ARP table afterwards either way.

use async_trait::async_trait;
use hostnet_exec::{CommandRunner, CommandSpec, ExecError};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// `ping` command used by [`PingProber`]
pub const PING_CMD: &str = "ping";

/// Sends a probe to `ip` out of `network`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns whether the host answered. Errors only when the probe could
    /// not be sent at all.
    async fn probe(&self, network: &str, ip: Ipv4Addr, timeout: Duration) -> Result<bool>;
}

/// Syntax family for binding `ping` to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingFlavor {
    /// `-b <ifname>` with `-t <secs>` (macOS; `-S` there wants an address)
    Bsd,
    /// `-I <ifname>` with `-W <secs>` (Linux iputils / busybox)
    Linux,
    /// No interface binding
    Unbound,
}

impl BindingFlavor {
    pub fn current() -> Self {
        if cfg!(target_vendor = "apple") {
            BindingFlavor::Bsd
        } else if cfg!(any(target_os = "linux", target_os = "android")) {
            BindingFlavor::Linux
        } else {
            BindingFlavor::Unbound
        }
    }
}

/// Arguments for a single-echo `ping` bound to `network`
pub fn ping_args(flavor: BindingFlavor, network: &str, ip: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1).to_string();
    let mut args = vec!["-n".to_string(), "-c".to_string(), "1".to_string()];
    match flavor {
        BindingFlavor::Bsd => {
            args.extend(["-t".to_string(), secs, "-b".to_string(), network.to_string()]);
        }
        BindingFlavor::Linux => {
            args.extend(["-W".to_string(), secs, "-I".to_string(), network.to_string()]);
        }
        BindingFlavor::Unbound => {}
    }
    args.push(ip.to_string());
    args
}

/// Probes with the system `ping` binary
pub struct PingProber {
    runner: Arc<dyn CommandRunner>,
    flavor: BindingFlavor,
}

impl PingProber {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            flavor: BindingFlavor::current(),
        }
    }

    pub fn with_flavor(mut self, flavor: BindingFlavor) -> Self {
        self.flavor = flavor;
        self
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, network: &str, ip: Ipv4Addr, timeout: Duration) -> Result<bool> {
        let cmd = CommandSpec::new(PING_CMD, ping_args(self.flavor, network, ip, timeout));
        match self.runner.run(&cmd, None).await {
            Ok(_) => Ok(true),
            Err(ExecError::CommandFailed { status, .. }) => {
                debug!(%network, %ip, %status, "No echo reply");
                Ok(false)
            }
            Err(e) => Err(DiscoveryError::Probe {
                network: network.to_string(),
                ip,
                reason: e.to_string(),
            }),
        }
    }
}
