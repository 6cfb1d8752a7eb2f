//! ARP sampling
//!
//! Turns the raw OS ARP table plus the local interface list into one
//! [`AddressTable`] snapshot. A snapshot is built completely before it is
//! returned; on any read failure no table is produced at all.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::arp::{ArpTableReader, RawArpTable};
use crate::error::Result;
use crate::interfaces::{InterfaceEnumerator, LocalInterface};
use crate::types::{same_subnet, AddressRecord, AddressTable};

/// Builds fresh [`AddressTable`] snapshots
pub struct ArpSampler {
    reader: Arc<dyn ArpTableReader>,
    interfaces: Arc<dyn InterfaceEnumerator>,
    reconcile_segment_names: bool,
}

impl ArpSampler {
    pub fn new(reader: Arc<dyn ArpTableReader>, interfaces: Arc<dyn InterfaceEnumerator>) -> Self {
        Self {
            reader,
            interfaces,
            reconcile_segment_names: false,
        }
    }

    /// Re-key local interfaces onto ARP segment names when the two disagree
    pub fn with_segment_reconciliation(mut self, enabled: bool) -> Self {
        self.reconcile_segment_names = enabled;
        self
    }

    /// Read the OS tables and build a snapshot
    #[instrument(skip(self))]
    pub async fn sample(&self) -> Result<AddressTable> {
        let raw = self.reader.read().await?;
        let locals = self.interfaces.interfaces()?;
        let table = build_table(&raw, &locals, self.reconcile_segment_names);
        debug!(entries = table.len(), "Sampled arp table");
        Ok(table)
    }

    /// Local interfaces as currently reported by the OS
    pub fn local_interfaces(&self) -> Result<Vec<LocalInterface>> {
        self.interfaces.interfaces()
    }
}

/// Reconcile a raw ARP table with the local interfaces
pub fn build_table(
    raw: &RawArpTable,
    locals: &[LocalInterface],
    reconcile_segment_names: bool,
) -> AddressTable {
    let mut table = AddressTable::new();
    // First admitted address per segment
    let mut hints: BTreeMap<String, Ipv4Addr> = BTreeMap::new();

    for (segment, entries) in raw.segments() {
        for entry in entries {
            if !table.insert(entry.mac, AddressRecord::neighbor(segment, entry.ip)) {
                continue;
            }
            hints.entry(segment.to_string()).or_insert(entry.ip);
        }
    }

    for iface in locals.iter().filter(|i| !i.internal) {
        let Some((address, netmask)) = iface.ipv4() else {
            continue;
        };
        let Some(mac) = iface.mac.filter(|m| m.is_admissible()) else {
            continue;
        };

        let mut segment = iface.name.clone();
        if reconcile_segment_names && !hints.contains_key(&segment) {
            if let Some((name, _)) = hints
                .iter()
                .find(|(_, hint)| same_subnet(netmask, address, **hint))
            {
                trace!(interface = %iface.name, segment = %name, "Re-keyed local interface");
                segment = name.clone();
            }
        }

        table.insert(mac, AddressRecord::local(segment.clone(), address));

        // Drop entries filed under this segment that are not in its subnet
        table.retain(|_, r| {
            r.network != segment
                || r.is_self
                || r.ip.is_some_and(|ip| same_subnet(netmask, address, ip))
        });
    }

    table
}
