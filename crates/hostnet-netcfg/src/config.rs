//! Configuration for the nmcli planner

use serde::{Deserialize, Serialize};

pub const DEFAULT_NMCLI_PATH: &str = "nmcli";
pub const DEFAULT_CONNECTION_PREFIX: &str = "hostnet_conn";
pub const DEFAULT_SUDO_PATH: &str = "sudo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetcfgConfig {
    /// nmcli executable
    pub nmcli_path: String,
    /// Managed connections are named `<prefix>_<interface>`
    pub connection_prefix: String,
    /// Elevation helper
    pub sudo_path: String,
}

impl Default for NetcfgConfig {
    fn default() -> Self {
        Self {
            nmcli_path: DEFAULT_NMCLI_PATH.to_string(),
            connection_prefix: DEFAULT_CONNECTION_PREFIX.to_string(),
            sudo_path: DEFAULT_SUDO_PATH.to_string(),
        }
    }
}

impl NetcfgConfig {
    /// Name of the managed connection bound to `interface`
    pub fn connection_name(&self, interface: &str) -> String {
        format!("{}_{}", self.connection_prefix, interface)
    }
}
