//! OS ARP table readers
//!
//! Readers return the raw `segment -> [(mac, ip)]` view; all filtering and
//! reconciliation happens in [`crate::sampler`].

use async_trait::async_trait;
use hostnet_exec::{CommandRunner, CommandSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::trace;

use crate::error::{DiscoveryError, Result};
use crate::types::MacAddress;

/// Kernel ARP table on Linux
pub const PROC_NET_ARP: &str = "/proc/net/arp";

/// `arp` command used by [`ArpCommandReader`]
pub const ARP_CMD: &str = "arp";

/// `? (192.168.1.1) at aa:bb:cc:dd:ee:ff [ether] on eth0` (net-tools) or
/// `? (192.168.1.1) at aa:bb:cc:dd:ee:ff on en0 ifscope [ethernet]` (BSD)
static ARP_AN_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d{1,3}(?:\.\d{1,3}){3})\) at ([0-9A-Fa-f:.-]+)(?: \[\w+\])? on (\S+)")
        .expect("Invalid regex pattern")
});

/// One raw ARP entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
}

/// Raw ARP table grouped by segment, entries in the order the OS listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArpTable {
    segments: BTreeMap<String, Vec<ArpEntry>>,
}

impl RawArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: impl Into<String>, mac: MacAddress, ip: Ipv4Addr) {
        self.segments
            .entry(segment.into())
            .or_default()
            .push(ArpEntry { mac, ip });
    }

    /// Builder-style [`RawArpTable::push`]
    pub fn with(mut self, segment: &str, mac: MacAddress, ip: Ipv4Addr) -> Self {
        self.push(segment, mac, ip);
        self
    }

    pub fn segments(&self) -> impl Iterator<Item = (&str, &[ArpEntry])> {
        self.segments
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Source of the OS ARP table
#[async_trait]
pub trait ArpTableReader: Send + Sync {
    async fn read(&self) -> Result<RawArpTable>;
}

/// Parse the contents of `/proc/net/arp`
pub fn parse_proc_net_arp(text: &str) -> RawArpTable {
    let mut table = RawArpTable::new();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }
        let (Ok(ip), Some(mac)) = (fields[0].parse::<Ipv4Addr>(), MacAddress::parse(fields[3]))
        else {
            trace!(line, "Skipping unparsable arp line");
            continue;
        };
        table.push(fields[5], mac, ip);
    }
    table
}

/// Parse `arp -an` output (net-tools or BSD flavor)
pub fn parse_arp_an(text: &str) -> RawArpTable {
    let mut table = RawArpTable::new();
    for line in text.lines() {
        let Some(caps) = ARP_AN_LINE_RE.captures(line) else {
            trace!(line, "Skipping unparsable arp line");
            continue;
        };
        let (Ok(ip), Some(mac)) = (caps[1].parse::<Ipv4Addr>(), MacAddress::parse(&caps[2])) else {
            continue;
        };
        table.push(&caps[3], mac, ip);
    }
    table
}

/// Reads `/proc/net/arp`
#[derive(Debug, Clone)]
pub struct ProcArpReader {
    path: String,
}

impl Default for ProcArpReader {
    fn default() -> Self {
        Self::new(PROC_NET_ARP)
    }
}

impl ProcArpReader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArpTableReader for ProcArpReader {
    async fn read(&self) -> Result<RawArpTable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DiscoveryError::Sample(format!("reading {}: {}", self.path, e)))?;
        Ok(parse_proc_net_arp(&text))
    }
}

/// Runs `arp -an` and parses its output
pub struct ArpCommandReader {
    runner: Arc<dyn CommandRunner>,
}

impl ArpCommandReader {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ArpTableReader for ArpCommandReader {
    async fn read(&self) -> Result<RawArpTable> {
        let cmd = CommandSpec::new(ARP_CMD, ["-an"]);
        let text = self
            .runner
            .run(&cmd, None)
            .await
            .map_err(|e| DiscoveryError::Sample(e.to_string()))?;
        Ok(parse_arp_an(&text))
    }
}
