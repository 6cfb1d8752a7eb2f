//! nmcli command builders
//!
//! Every mutating command is elevated and tagged with its nmcli verb so
//! pipelines can tolerate failures by verb.

use hostnet_exec::CommandSpec;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::types::{PowerAction, RouteDescriptor};

pub const TAG_DOWN: &str = "down";
pub const TAG_DELETE: &str = "delete";
pub const TAG_ADD: &str = "add";
pub const TAG_MODIFY: &str = "modify";
pub const TAG_UP: &str = "up";
pub const TAG_POWER: &str = "power";

pub const REBOOT_CMD: &str = "reboot";
pub const SHUTDOWN_CMD: &str = "shutdown";

fn connection_cmd<'a>(nmcli: &str, verb: &'a str, rest: impl IntoIterator<Item = &'a str>) -> CommandSpec {
    let mut args = vec!["connection", verb];
    args.extend(rest);
    CommandSpec::new(nmcli, args).elevated().with_tag(verb)
}

/// Build connection deactivation command
pub fn build_connection_down_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    connection_cmd(nmcli, TAG_DOWN, [conn])
}

/// Build connection deletion command
pub fn build_connection_delete_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    connection_cmd(nmcli, TAG_DELETE, [conn])
}

/// Build connection activation command
pub fn build_connection_up_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    connection_cmd(nmcli, TAG_UP, [conn])
}

/// Build wireless connection creation command
pub fn build_add_wifi_cmd(nmcli: &str, conn: &str, interface: &str, ssid: &str) -> CommandSpec {
    connection_cmd(
        nmcli,
        TAG_ADD,
        ["con-name", conn, "type", "wifi", "ifname", interface, "ssid", ssid],
    )
}

/// Build wired connection creation command
pub fn build_add_ethernet_cmd(nmcli: &str, conn: &str, interface: &str) -> CommandSpec {
    connection_cmd(
        nmcli,
        TAG_ADD,
        ["con-name", conn, "type", "ethernet", "ifname", interface],
    )
}

/// Build DHCP addressing command
pub fn build_dhcp_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    connection_cmd(nmcli, TAG_MODIFY, [conn, "ipv4.method", "auto"])
}

/// Build static addressing command, gateway folded into `ipv4.addresses`
///
/// Older nmcli releases accept `"<ip/prefix> <gateway>"` here.
pub fn build_static_cmd(
    nmcli: &str,
    conn: &str,
    address: &Ipv4Network,
    gateway: Option<Ipv4Addr>,
) -> CommandSpec {
    let setting = match gateway {
        Some(gw) => format!("{} {}", address, gw),
        None => address.to_string(),
    };
    connection_cmd(
        nmcli,
        TAG_MODIFY,
        [conn, "ipv4.method", "manual", "ipv4.addresses", setting.as_str()],
    )
}

/// Build static addressing command with a separate `ipv4.gateway` field
pub fn build_static_separate_gateway_cmd(
    nmcli: &str,
    conn: &str,
    address: &Ipv4Network,
    gateway: Option<Ipv4Addr>,
) -> CommandSpec {
    let address = address.to_string();
    let gateway = gateway.map(|gw| gw.to_string()).unwrap_or_default();
    connection_cmd(
        nmcli,
        TAG_MODIFY,
        [
            conn,
            "ipv4.method",
            "manual",
            "ipv4.addresses",
            address.as_str(),
            "ipv4.gateway",
            gateway.as_str(),
        ],
    )
}

/// Build WPA-PSK credential command
pub fn build_wifi_psk_cmd(nmcli: &str, conn: &str, psk: &str) -> CommandSpec {
    connection_cmd(
        nmcli,
        TAG_MODIFY,
        [conn, "wifi-sec.key-mgmt", "wpa-psk", "wifi-sec.psk", psk],
    )
    .redact_last_arg()
}

/// Build static route addition command
pub fn build_route_add_cmd(nmcli: &str, route: &RouteDescriptor) -> CommandSpec {
    let value = route.nmcli_value();
    connection_cmd(
        nmcli,
        TAG_MODIFY,
        [route.connection_name.as_str(), "+ipv4.routes", value.as_str()],
    )
}

/// Build static route removal command
pub fn build_route_remove_cmd(nmcli: &str, route: &RouteDescriptor) -> CommandSpec {
    let value = route.nmcli_value();
    connection_cmd(
        nmcli,
        TAG_MODIFY,
        [route.connection_name.as_str(), "-ipv4.routes", value.as_str()],
    )
}

/// Build reboot/shutdown command; `None` for [`PowerAction::None`]
pub fn build_power_cmd(action: PowerAction) -> Option<CommandSpec> {
    let cmd = match action {
        PowerAction::None => return None,
        PowerAction::Reboot => CommandSpec::new(REBOOT_CMD, Vec::<String>::new()),
        PowerAction::Shutdown => CommandSpec::new(SHUTDOWN_CMD, ["-h", "now"]),
    };
    Some(cmd.elevated().with_tag(TAG_POWER))
}

/// Build connection listing query (`NAME:DEVICE` per line)
pub fn build_list_connections_cmd(nmcli: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["-f", "NAME,DEVICE", "-t", "connection", "show"])
}

/// Build query for a connection's configured IPv4 addresses
pub fn build_show_addresses_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["-f", "IP4.ADDRESS", "connection", "show", conn])
}

/// Build query for a connection's IPv4 routes
pub fn build_show_routes_cmd(nmcli: &str, conn: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["-f", "IP4.ROUTE", "connection", "show", conn])
}

/// Build device listing query
pub fn build_device_list_cmd(nmcli: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["d"])
}

/// Build WiFi access point scan query
pub fn build_wifi_list_cmd(nmcli: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["dev", "wifi", "list"])
}

/// Build NetworkManager availability probe
pub fn build_connection_check_cmd(nmcli: &str) -> CommandSpec {
    CommandSpec::new(nmcli, ["connection"])
}
