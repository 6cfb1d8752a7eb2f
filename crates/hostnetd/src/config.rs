//! Daemon configuration file

use anyhow::{Context, Result};
use hostnet_discovery::DiscoveryConfig;
use hostnet_netcfg::NetcfgConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the sudo password
pub const SUDO_PASSWORD_ENV: &str = "HOSTNET_SUDO_PASSWORD";

/// Contents of the YAML configuration file
///
/// ```yaml
/// discovery:
///   refresh_interval: 60
///   probe_timeout: 7
///   arp_source: proc
/// netcfg:
///   connection_prefix: hostnet_conn
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub discovery: DiscoveryConfig,
    pub netcfg: NetcfgConfig,
}

impl DaemonConfig {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
