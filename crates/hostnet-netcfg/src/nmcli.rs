//! Read-only NetworkManager queries and their output parsers

use hostnet_exec::{CommandRunner, CommandSpec};
use ipnetwork::Ipv4Network;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::commands::{
    build_connection_check_cmd, build_device_list_cmd, build_list_connections_cmd,
    build_show_addresses_cmd, build_show_routes_cmd, build_wifi_list_cmd,
};
use crate::error::{NetcfgError, Result};
use crate::types::{DeviceList, RouteDescriptor};

/// `IP4.ADDRESS[1]:   192.168.1.5/24`
static IP4_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([\d.]+)/(\d+)").expect("Invalid regex pattern"));

/// Column labels that follow the SSID in `nmcli dev wifi list`
const WIFI_MODE_LABELS: [&str; 2] = ["Infra", "インフラ"];

/// Connection names from `nmcli -t -f NAME,DEVICE connection show`, in list order
///
/// Terse mode escapes `:` inside names as `\:`.
pub fn parse_connection_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut name = String::new();
            let mut chars = line.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            name.push(escaped);
                        }
                    }
                    ':' => break,
                    c => name.push(c),
                }
            }
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

/// Addresses from `nmcli -f IP4.ADDRESS connection show <name>`
pub fn parse_ip4_addresses(output: &str) -> Vec<Ipv4Network> {
    output
        .lines()
        .filter_map(|line| IP4_ADDRESS_RE.captures(line))
        .filter_map(|caps| {
            let ip: Ipv4Addr = caps[1].parse().ok()?;
            let prefix: u8 = caps[2].parse().ok()?;
            Ipv4Network::new(ip, prefix).ok()
        })
        .collect()
}

/// Next hop of the route to `target` in `nmcli -f IP4.ROUTE connection show <name>`
pub fn parse_route_gateway(output: &str, target: &Ipv4Network) -> Option<Ipv4Addr> {
    let pattern = format!(
        r"dst\s*=\s*{},\s*nh\s*=\s*([\d.]+)",
        regex::escape(&target.to_string())
    );
    let re = Regex::new(&pattern).ok()?;
    output
        .lines()
        .filter_map(|line| re.captures(line))
        .find_map(|caps| caps[1].parse().ok())
}

/// Device names from `nmcli d`, skipping the header, `lo` and short lines
pub fn parse_device_list(output: &str) -> DeviceList {
    let mut list = DeviceList::default();
    for line in output.lines().skip(1) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 4 || columns[0] == "lo" {
            continue;
        }
        if columns[0].starts_with("wlan") {
            list.wlan_exists = true;
        }
        list.devices.push(columns[0].to_string());
    }
    list
}

/// Visible SSIDs from `nmcli dev wifi list`
pub fn parse_wifi_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let end = WIFI_MODE_LABELS.iter().find_map(|label| line.find(label))?;
            let mut ssid = line[..end].trim();
            if let Some(rest) = ssid.strip_prefix('*') {
                ssid = rest.trim();
            }
            (ssid != "--").then(|| ssid.to_string())
        })
        .collect()
}

/// Queries NetworkManager through a [`CommandRunner`]
#[derive(Clone)]
pub struct NmcliClient {
    runner: Arc<dyn CommandRunner>,
    nmcli: String,
}

impl NmcliClient {
    pub fn new(runner: Arc<dyn CommandRunner>, nmcli: impl Into<String>) -> Self {
        Self {
            runner,
            nmcli: nmcli.into(),
        }
    }

    pub fn nmcli(&self) -> &str {
        &self.nmcli
    }

    async fn query(&self, cmd: CommandSpec) -> Result<String> {
        Ok(self.runner.run(&cmd, None).await?)
    }

    /// Whether NetworkManager answers at all
    pub async fn is_supported(&self) -> bool {
        match self.runner.run(&build_connection_check_cmd(&self.nmcli), None).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "nmcli is not usable");
                false
            }
        }
    }

    pub async fn list_connections(&self) -> Result<Vec<String>> {
        let output = self.query(build_list_connections_cmd(&self.nmcli)).await?;
        Ok(parse_connection_names(&output))
    }

    pub async fn connection_addresses(&self, conn: &str) -> Result<Vec<Ipv4Network>> {
        let output = self.query(build_show_addresses_cmd(&self.nmcli, conn)).await?;
        Ok(parse_ip4_addresses(&output))
    }

    /// First connection, in list order, with an address whose network contains `gateway`
    pub async fn find_connection_for_gateway(&self, gateway: Ipv4Addr) -> Result<Option<String>> {
        for conn in self.list_connections().await? {
            let addresses = self.connection_addresses(&conn).await?;
            if addresses.iter().any(|net| net.contains(gateway)) {
                return Ok(Some(conn));
            }
        }
        Ok(None)
    }

    /// Existing route to `target` on any connection, first in list order
    pub async fn find_route(&self, target: &Ipv4Network) -> Result<Option<RouteDescriptor>> {
        for conn in self.list_connections().await? {
            let output = self.query(build_show_routes_cmd(&self.nmcli, &conn)).await?;
            if let Some(gateway) = parse_route_gateway(&output, target) {
                return Ok(Some(RouteDescriptor {
                    connection_name: conn,
                    target: *target,
                    gateway,
                }));
            }
        }
        Ok(None)
    }

    pub async fn list_devices(&self) -> Result<DeviceList> {
        let output = self.query(build_device_list_cmd(&self.nmcli)).await?;
        if output.lines().count() < 2 {
            return Err(NetcfgError::NoNetworkAvailable);
        }
        Ok(parse_device_list(&output))
    }

    /// Visible access points; empty when scanning is not permitted
    pub async fn scan_wifi(&self) -> Vec<String> {
        match self.query(build_wifi_list_cmd(&self.nmcli)).await {
            Ok(output) => parse_wifi_list(&output),
            Err(e) => {
                warn!(error = %e, "Cannot scan WiFi access points");
                Vec::new()
            }
        }
    }
}
