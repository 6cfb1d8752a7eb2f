//! Configuration request types

use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::NetcfgError;

/// How an interface obtains its IPv4 address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Dhcp,
    Static {
        /// Address with prefix, e.g. `192.168.1.5/24`
        address: Ipv4Network,
        gateway: Option<Ipv4Addr>,
    },
}

/// WiFi association details for a wireless interface
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WifiSettings {
    /// SSID picked from a scan
    pub ssid: String,
    /// Manually typed SSID; wins over `ssid` when not blank
    pub ssid_manual: String,
    pub password: String,
    pub password_confirm: String,
}

impl WifiSettings {
    /// The SSID to associate with
    pub fn effective_ssid(&self) -> &str {
        let manual = self.ssid_manual.trim();
        if manual.is_empty() {
            &self.ssid
        } else {
            manual
        }
    }

    pub fn passwords_match(&self) -> bool {
        self.password == self.password_confirm
    }

    /// Clear both password fields
    pub fn scrub(&mut self) {
        self.password.clear();
        self.password_confirm.clear();
    }
}

impl fmt::Debug for WifiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiSettings")
            .field("ssid", &self.ssid)
            .field("ssid_manual", &self.ssid_manual)
            .field("password", &"***")
            .field("password_confirm", &"***")
            .finish()
    }
}

/// Destructive action requested after a configuration is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerAction {
    #[default]
    None,
    Reboot,
    Shutdown,
}

impl FromStr for PowerAction {
    type Err = NetcfgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(PowerAction::None),
            "reboot" => Ok(PowerAction::Reboot),
            "shutdown" => Ok(PowerAction::Shutdown),
            other => Err(NetcfgError::UnknownPowerAction(other.to_string())),
        }
    }
}

/// Desired configuration of one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRequest {
    pub interface: String,
    pub addressing: AddressingMode,
    /// Present for wireless interfaces
    pub wifi: Option<WifiSettings>,
    /// Consumed by the planner; always `None` after an apply
    pub power: PowerAction,
}

impl InterfaceRequest {
    pub fn new(interface: impl Into<String>, addressing: AddressingMode) -> Self {
        Self {
            interface: interface.into(),
            addressing,
            wifi: None,
            power: PowerAction::None,
        }
    }

    pub fn with_wifi(mut self, wifi: WifiSettings) -> Self {
        self.wifi = Some(wifi);
        self
    }

    pub fn with_power(mut self, power: PowerAction) -> Self {
        self.power = power;
        self
    }
}

/// A static route configured on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub connection_name: String,
    pub target: Ipv4Network,
    pub gateway: Ipv4Addr,
}

impl RouteDescriptor {
    /// `"<target> <gateway>"` as nmcli's `ipv4.routes` expects
    pub fn nmcli_value(&self) -> String {
        format!("{} {}", self.target, self.gateway)
    }
}

/// Result of a route request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The identical route already exists; nothing ran
    Unchanged,
    /// Per-step output of the executed plan
    Applied(Vec<String>),
}

/// Managed devices as listed by `nmcli d`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    pub devices: Vec<String>,
    pub wlan_exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wifi(ssid: &str, manual: &str) -> WifiSettings {
        WifiSettings {
            ssid: ssid.into(),
            ssid_manual: manual.into(),
            password: "secret".into(),
            password_confirm: "secret".into(),
        }
    }

    #[test]
    fn test_manual_ssid_overrides_selected() {
        assert_eq!(wifi("office", "").effective_ssid(), "office");
        assert_eq!(wifi("office", "   ").effective_ssid(), "office");
        assert_eq!(wifi("office", " lab-5g ").effective_ssid(), "lab-5g");
    }

    #[test]
    fn test_debug_hides_passwords() {
        let text = format!("{:?}", wifi("office", ""));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_scrub_clears_passwords() {
        let mut w = wifi("office", "");
        w.scrub();
        assert!(w.password.is_empty());
        assert!(w.password_confirm.is_empty());
        assert_eq!(w.ssid, "office");
    }

    #[test]
    fn test_power_action_parse() {
        assert_eq!("reboot".parse::<PowerAction>().unwrap(), PowerAction::Reboot);
        assert_eq!("shutdown".parse::<PowerAction>().unwrap(), PowerAction::Shutdown);
        assert_eq!("none".parse::<PowerAction>().unwrap(), PowerAction::None);
        assert!("halt".parse::<PowerAction>().is_err());
    }

    #[test]
    fn test_route_nmcli_value() {
        let route = RouteDescriptor {
            connection_name: "hostnet_conn_eth0".into(),
            target: "224.0.23.0/32".parse().unwrap(),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
        };
        assert_eq!(route.nmcli_value(), "224.0.23.0/32 192.168.1.1");
    }
}
