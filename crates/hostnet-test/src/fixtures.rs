//! Test fixtures for ARP tables and local interfaces

use hostnet_discovery::{LocalInterface, MacAddress, RawArpTable};
use std::net::{IpAddr, Ipv4Addr};

/// Parse a MAC literal
///
/// # Panics
/// On malformed input; fixtures are static.
pub fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap_or_else(|| panic!("bad fixture mac {}", s))
}

/// Parse an IPv4 literal
pub fn ip(s: &str) -> Ipv4Addr {
    s.parse()
        .unwrap_or_else(|_| panic!("bad fixture ip {}", s))
}

/// Raw ARP table fixtures
pub mod arp_fixtures {
    use super::*;

    /// Build a raw table from `(segment, mac, ip)` triples
    pub fn table(entries: &[(&str, &str, &str)]) -> RawArpTable {
        entries
            .iter()
            .fold(RawArpTable::new(), |t, (segment, m, i)| {
                t.with(segment, mac(m), ip(i))
            })
    }

    /// One neighbor on `eth0`
    pub fn single_host(m: &str, i: &str) -> RawArpTable {
        table(&[("eth0", m, i)])
    }

    /// A small office LAN: a router and two hosts on eth0, one host on wlan0
    pub fn office_lan() -> RawArpTable {
        table(&[
            ("eth0", "aa:bb:cc:dd:ee:01", "192.168.1.1"),
            ("eth0", "aa:bb:cc:dd:ee:02", "192.168.1.20"),
            ("eth0", "aa:bb:cc:dd:ee:03", "192.168.1.21"),
            ("wlan0", "aa:bb:cc:dd:ee:10", "10.0.0.10"),
        ])
    }

    /// `/proc/net/arp` rendering of `(segment, mac, ip)` triples
    pub fn proc_net_arp_text(entries: &[(&str, &str, &str)]) -> String {
        let mut text = String::from(
            "IP address       HW type     Flags       HW address            Mask     Device\n",
        );
        for (segment, m, i) in entries {
            text.push_str(&format!(
                "{:<16} 0x1         0x2         {:<21} *        {}\n",
                i, m, segment
            ));
        }
        text
    }
}

/// Local interface fixtures
pub mod interface_fixtures {
    use super::*;

    fn v4(name: &str, m: &str, address: &str, netmask: &str, internal: bool) -> LocalInterface {
        LocalInterface {
            name: name.to_string(),
            mac: Some(mac(m)),
            address: IpAddr::V4(ip(address)),
            netmask: Some(IpAddr::V4(ip(netmask))),
            internal,
        }
    }

    /// `lo` at 127.0.0.1/8
    pub fn loopback() -> LocalInterface {
        v4("lo", "00:00:00:00:00:00", "127.0.0.1", "255.0.0.0", true)
    }

    /// `eth0` at 192.168.1.2/24
    pub fn eth0() -> LocalInterface {
        v4("eth0", "02:00:00:00:00:01", "192.168.1.2", "255.255.255.0", false)
    }

    /// `wlan0` at 10.0.0.2/24
    pub fn wlan0() -> LocalInterface {
        v4("wlan0", "02:00:00:00:00:02", "10.0.0.2", "255.255.255.0", false)
    }

    /// Any non-loopback IPv4 interface
    pub fn custom(name: &str, m: &str, address: &str, netmask: &str) -> LocalInterface {
        v4(name, m, address, netmask, false)
    }

    /// Loopback plus eth0 and wlan0
    pub fn workstation() -> Vec<LocalInterface> {
        vec![loopback(), eth0(), wlan0()]
    }
}
