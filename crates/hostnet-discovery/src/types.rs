//! Core types for neighbor discovery
//!
//! An [`AddressTable`] is one atomic snapshot of every host seen on the
//! local segments, keyed by hardware address.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// MAC address representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Null MAC address (incomplete ARP entries)
    pub const ZERO: Self = Self([0, 0, 0, 0, 0, 0]);

    /// Broadcast MAC address (filtered out)
    pub const BROADCAST: Self = Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

    /// Check if this is a zero MAC
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO.0
    }

    /// Check if this is a broadcast MAC
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Whether this address may be admitted to an [`AddressTable`]
    #[inline]
    pub fn is_admissible(&self) -> bool {
        !self.is_zero() && !self.is_broadcast()
    }

    /// Parse MAC from a colon- or dash-separated string.
    ///
    /// Octets may omit their leading zero (`0:1b:...` as printed by BSD
    /// `arp`) and either case is accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = s.trim().split(sep).collect();
        if parts.len() != 6 {
            return None;
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return None;
            }
            bytes[i] = u8::from_str_radix(part, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DiscoveryError::InvalidMac(s.to_string()))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of an [`AddressTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Segment (interface-like name) the address was observed on
    #[serde(rename = "net")]
    pub network: String,
    /// Current IPv4 address, if resolved
    pub ip: Option<Ipv4Addr>,
    /// True if the MAC belongs to a local interface
    #[serde(rename = "self", default, skip_serializing_if = "is_false")]
    pub is_self: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl AddressRecord {
    /// A neighbor learned from the ARP table
    pub fn neighbor(network: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            network: network.into(),
            ip: Some(ip),
            is_self: false,
        }
    }

    /// A local interface address
    pub fn local(network: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            network: network.into(),
            ip: Some(ip),
            is_self: true,
        }
    }
}

/// MAC -> record mapping; at most one record per MAC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressTable {
    records: BTreeMap<MacAddress, AddressRecord>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `mac`.
    ///
    /// Returns false, leaving the table untouched, for the broadcast and
    /// all-zero addresses.
    pub fn insert(&mut self, mac: MacAddress, record: AddressRecord) -> bool {
        if !mac.is_admissible() {
            return false;
        }
        self.records.insert(mac, record);
        true
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&AddressRecord> {
        self.records.get(mac)
    }

    pub fn get_mut(&mut self, mac: &MacAddress) -> Option<&mut AddressRecord> {
        self.records.get_mut(mac)
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<AddressRecord> {
        self.records.remove(mac)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.records.contains_key(mac)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MacAddress, &AddressRecord)> {
        self.records.iter()
    }

    /// Keep only records for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&MacAddress, &AddressRecord) -> bool) {
        self.records.retain(|mac, record| keep(mac, record));
    }

    /// Find the MAC currently holding `ip` on `network` (linear scan)
    pub fn lookup(&self, network: &str, ip: Ipv4Addr) -> Option<MacAddress> {
        self.records
            .iter()
            .find(|(_, r)| r.network == network && r.ip == Some(ip))
            .map(|(mac, _)| *mac)
    }

    /// Copy of the table restricted to local interface addresses
    pub fn self_only(&self) -> AddressTable {
        Self {
            records: self
                .records
                .iter()
                .filter(|(_, r)| r.is_self)
                .map(|(mac, r)| (*mac, r.clone()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AddressTable {
    type Item = (&'a MacAddress, &'a AddressRecord);
    type IntoIter = std::collections::btree_map::Iter<'a, MacAddress, AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Address presence change produced by diffing two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum NetworkChangeEvent {
    Found {
        network: String,
        mac: MacAddress,
        ip: Option<Ipv4Addr>,
    },
    Lost {
        network: String,
        mac: MacAddress,
        ip: Option<Ipv4Addr>,
    },
    Changed {
        network: String,
        mac: MacAddress,
        old_ip: Option<Ipv4Addr>,
        new_ip: Option<Ipv4Addr>,
    },
}

impl NetworkChangeEvent {
    pub fn mac(&self) -> &MacAddress {
        match self {
            Self::Found { mac, .. } | Self::Lost { mac, .. } | Self::Changed { mac, .. } => mac,
        }
    }

    pub fn network(&self) -> &str {
        match self {
            Self::Found { network, .. }
            | Self::Lost { network, .. }
            | Self::Changed { network, .. } => network,
        }
    }
}

impl fmt::Display for NetworkChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = |ip: &Option<Ipv4Addr>| ip.map_or_else(|| "-".to_string(), |ip| ip.to_string());
        match self {
            Self::Found { network, mac, ip: a } => write!(f, "found({}, {}, {})", network, mac, ip(a)),
            Self::Lost { network, mac, ip: a } => write!(f, "lost({}, {}, {})", network, mac, ip(a)),
            Self::Changed {
                network,
                mac,
                old_ip,
                new_ip,
            } => write!(
                f,
                "changed({}, {}, {}, {})",
                network,
                mac,
                ip(old_ip),
                ip(new_ip)
            ),
        }
    }
}

/// True if `a` and `b` fall in the same network under `mask`
#[inline]
pub fn same_subnet(mask: Ipv4Addr, a: Ipv4Addr, b: Ipv4Addr) -> bool {
    let mask = u32::from(mask);
    (u32::from(a) & mask) == (u32::from(b) & mask)
}
