//! Snapshot diffing
//!
//! Produces the ordered list of [`NetworkChangeEvent`]s that turns one
//! [`AddressTable`] into the next. Keys present in the new table are
//! visited first (in table order), then keys that disappeared.

use crate::types::{AddressTable, NetworkChangeEvent};

/// Compute the change events between `old` and `new`
pub fn diff(old: &AddressTable, new: &AddressTable) -> Vec<NetworkChangeEvent> {
    let mut events = Vec::new();

    for (mac, record) in new {
        match old.get(mac) {
            None => events.push(NetworkChangeEvent::Found {
                network: record.network.clone(),
                mac: *mac,
                ip: record.ip,
            }),
            Some(prev) if prev.network != record.network => {
                // Moved segments: report as lost on the old one, found on the new one
                events.push(NetworkChangeEvent::Lost {
                    network: prev.network.clone(),
                    mac: *mac,
                    ip: prev.ip,
                });
                events.push(NetworkChangeEvent::Found {
                    network: record.network.clone(),
                    mac: *mac,
                    ip: record.ip,
                });
            }
            Some(prev) if prev.ip != record.ip => events.push(NetworkChangeEvent::Changed {
                network: record.network.clone(),
                mac: *mac,
                old_ip: prev.ip,
                new_ip: record.ip,
            }),
            Some(_) => {}
        }
    }

    for (mac, prev) in old {
        if !new.contains(mac) {
            events.push(NetworkChangeEvent::Lost {
                network: prev.network.clone(),
                mac: *mac,
                ip: prev.ip,
            });
        }
    }

    events
}
