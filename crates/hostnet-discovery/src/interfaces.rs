//! Local interface enumeration

use ipnetwork::Ipv4Network;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::Result;
use crate::types::MacAddress;

/// One address of a local network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    /// OS interface name (eth0, wlan0, en0, ...)
    pub name: String,
    /// Hardware address, if the interface has one
    pub mac: Option<MacAddress>,
    pub address: IpAddr,
    pub netmask: Option<IpAddr>,
    /// Loopback interface
    pub internal: bool,
}

impl LocalInterface {
    /// Address and mask, for IPv4 addresses only
    pub fn ipv4(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        match (self.address, self.netmask) {
            (IpAddr::V4(addr), Some(IpAddr::V4(mask))) => Some((addr, mask)),
            (IpAddr::V4(addr), None) => Some((addr, Ipv4Addr::BROADCAST)),
            _ => None,
        }
    }

    /// The IPv4 network this address belongs to
    pub fn ipv4_network(&self) -> Option<Ipv4Network> {
        let (addr, mask) = self.ipv4()?;
        Ipv4Network::with_netmask(addr, mask).ok()
    }
}

/// Source of the local interface list
pub trait InterfaceEnumerator: Send + Sync {
    fn interfaces(&self) -> Result<Vec<LocalInterface>>;
}

/// Group the non-loopback IPv4 networks of `interfaces` by interface name
pub fn ipv4_networks(interfaces: &[LocalInterface]) -> BTreeMap<String, Vec<Ipv4Network>> {
    let mut networks: BTreeMap<String, Vec<Ipv4Network>> = BTreeMap::new();
    for iface in interfaces.iter().filter(|i| !i.internal) {
        if let Some(net) = iface.ipv4_network() {
            networks.entry(iface.name.clone()).or_default().push(net);
        }
    }
    networks
}

/// Name of the interface whose network contains `ip`
pub fn search_network_interface(
    ip: Ipv4Addr,
    networks: &BTreeMap<String, Vec<Ipv4Network>>,
) -> Option<String> {
    networks
        .iter()
        .find(|(_, nets)| nets.iter().any(|n| n.contains(ip)))
        .map(|(name, _)| name.clone())
}

/// Interfaces as reported by `getifaddrs(3)`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

#[cfg(unix)]
impl InterfaceEnumerator for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<LocalInterface>> {
        use nix::ifaddrs::getifaddrs;
        use nix::net::if_::InterfaceFlags;
        use std::collections::HashMap;

        let addrs: Vec<_> = getifaddrs()
            .map_err(|e| crate::error::DiscoveryError::Sample(format!("getifaddrs: {}", e)))?
            .collect();

        let mut macs: HashMap<String, MacAddress> = HashMap::new();
        for ifa in &addrs {
            let link = ifa.address.as_ref().and_then(|a| a.as_link_addr());
            if let Some(bytes) = link.and_then(|l| l.addr()) {
                macs.insert(ifa.interface_name.clone(), MacAddress(bytes));
            }
        }

        let mut interfaces = Vec::new();
        for ifa in &addrs {
            let Some(addr) = ifa.address.as_ref() else {
                continue;
            };
            let mask = ifa.netmask.as_ref();
            let (address, netmask) = if let Some(sin) = addr.as_sockaddr_in() {
                (
                    IpAddr::V4(Ipv4Addr::from(sin.ip())),
                    mask.and_then(|m| m.as_sockaddr_in())
                        .map(|m| IpAddr::V4(Ipv4Addr::from(m.ip()))),
                )
            } else if let Some(sin6) = addr.as_sockaddr_in6() {
                (
                    IpAddr::V6(sin6.ip()),
                    mask.and_then(|m| m.as_sockaddr_in6())
                        .map(|m| IpAddr::V6(m.ip())),
                )
            } else {
                continue;
            };

            interfaces.push(LocalInterface {
                name: ifa.interface_name.clone(),
                mac: macs.get(&ifa.interface_name).copied(),
                address,
                netmask,
                internal: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
            });
        }

        Ok(interfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, addr: &str, mask: &str, internal: bool) -> LocalInterface {
        LocalInterface {
            name: name.to_string(),
            mac: Some(MacAddress([2, 0, 0, 0, 0, 1])),
            address: addr.parse().unwrap(),
            netmask: Some(mask.parse().unwrap()),
            internal,
        }
    }

    #[test]
    fn test_ipv4_only_for_v4_addresses() {
        assert!(iface("eth0", "fe80::1", "ffff:ffff:ffff:ffff::", false)
            .ipv4()
            .is_none());
        assert_eq!(
            iface("eth0", "192.168.1.2", "255.255.255.0", false).ipv4(),
            Some((Ipv4Addr::new(192, 168, 1, 2), Ipv4Addr::new(255, 255, 255, 0)))
        );
    }

    #[test]
    fn test_ipv4_networks_skip_loopback() {
        let list = vec![
            iface("lo", "127.0.0.1", "255.0.0.0", true),
            iface("eth0", "192.168.1.2", "255.255.255.0", false),
            iface("wlan0", "10.0.0.5", "255.255.0.0", false),
        ];
        let nets = ipv4_networks(&list);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets["eth0"][0].prefix(), 24);
        assert_eq!(nets["wlan0"][0].prefix(), 16);
    }

    #[test]
    fn test_search_network_interface() {
        let list = vec![
            iface("eth0", "192.168.1.2", "255.255.255.0", false),
            iface("wlan0", "10.0.0.5", "255.255.0.0", false),
        ];
        let nets = ipv4_networks(&list);
        assert_eq!(
            search_network_interface(Ipv4Addr::new(10, 0, 200, 1), &nets),
            Some("wlan0".to_string())
        );
        assert_eq!(
            search_network_interface(Ipv4Addr::new(172, 16, 0, 1), &nets),
            None
        );
    }
}
