//! Network configuration through NetworkManager
//!
//! Builds and runs elevated `nmcli` plans for two requests:
//!
//! - **Interface reconfiguration**: tear down the managed connection of an
//!   interface, recreate it (ethernet or WiFi), set DHCP or static
//!   addressing, set the WPA-PSK key, bring it up, and optionally reboot or
//!   shut down afterwards.
//! - **Static routes**: move or add an `ipv4.routes` entry on the connection
//!   whose network contains the gateway, cycling affected connections.
//!
//! Read-only queries (connections, devices, WiFi scan) go through
//! [`NmcliClient`].

pub mod commands;
pub mod config;
pub mod error;
pub mod nmcli;
pub mod planner;
pub mod types;

pub use config::NetcfgConfig;
pub use error::{NetcfgError, Result};
pub use nmcli::NmcliClient;
pub use planner::ConfigurationPlanner;
pub use types::{
    AddressingMode, DeviceList, InterfaceRequest, PowerAction, RouteDescriptor, RouteOutcome,
    WifiSettings,
};
