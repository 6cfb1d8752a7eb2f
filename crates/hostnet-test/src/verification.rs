//! Event replay helpers for checking diff output

use hostnet_discovery::{AddressRecord, AddressTable, NetworkChangeEvent};
use tracing::{trace, warn};

/// Apply `events` to a copy of `table`, keyed by MAC
///
/// `Found` inserts, `Lost` removes, `Changed` rewrites the IP. Replayed
/// records are neighbors; self flags are not carried by events.
pub fn replay(table: &AddressTable, events: &[NetworkChangeEvent]) -> AddressTable {
    let mut out = table.clone();
    for event in events {
        trace!(?event, "Replaying event");
        match event {
            NetworkChangeEvent::Found { network, mac, ip } => {
                out.insert(
                    *mac,
                    AddressRecord {
                        network: network.clone(),
                        ip: *ip,
                        is_self: false,
                    },
                );
            }
            NetworkChangeEvent::Lost { mac, .. } => {
                if out.remove(mac).is_none() {
                    warn!(mac = %mac, "Lost event for unknown MAC");
                }
            }
            NetworkChangeEvent::Changed { mac, new_ip, .. } => match out.get_mut(mac) {
                Some(record) => record.ip = *new_ip,
                None => warn!(mac = %mac, "Changed event for unknown MAC"),
            },
        }
    }
    out
}

/// `(found, lost, changed)` event counts
pub fn count_events(events: &[NetworkChangeEvent]) -> (usize, usize, usize) {
    events.iter().fold((0, 0, 0), |(f, l, c), e| match e {
        NetworkChangeEvent::Found { .. } => (f + 1, l, c),
        NetworkChangeEvent::Lost { .. } => (f, l + 1, c),
        NetworkChangeEvent::Changed { .. } => (f, l, c + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ip, mac};

    fn record(network: &str, addr: &str) -> AddressRecord {
        AddressRecord {
            network: network.to_string(),
            ip: Some(ip(addr)),
            is_self: false,
        }
    }

    #[test]
    fn test_replay_applies_each_event_kind() {
        let mut table = AddressTable::new();
        table.insert(mac("aa:bb:cc:dd:ee:01"), record("eth0", "192.168.1.20"));
        table.insert(mac("aa:bb:cc:dd:ee:02"), record("eth0", "192.168.1.30"));

        let events = vec![
            NetworkChangeEvent::Changed {
                network: "eth0".into(),
                mac: mac("aa:bb:cc:dd:ee:01"),
                old_ip: Some(ip("192.168.1.20")),
                new_ip: Some(ip("192.168.1.10")),
            },
            NetworkChangeEvent::Lost {
                network: "eth0".into(),
                mac: mac("aa:bb:cc:dd:ee:02"),
                ip: Some(ip("192.168.1.30")),
            },
            NetworkChangeEvent::Found {
                network: "wlan0".into(),
                mac: mac("aa:bb:cc:dd:ee:03"),
                ip: Some(ip("10.0.0.7")),
            },
        ];

        let out = replay(&table, &events);
        assert_eq!(out.len(), 2);
        assert_eq!(out.lookup("eth0", ip("192.168.1.10")), Some(mac("aa:bb:cc:dd:ee:01")));
        assert_eq!(out.lookup("wlan0", ip("10.0.0.7")), Some(mac("aa:bb:cc:dd:ee:03")));
        assert!(!out.contains(&mac("aa:bb:cc:dd:ee:02")));
        assert_eq!(count_events(&events), (1, 1, 1));
    }

    #[test]
    fn test_replay_ignores_events_for_unknown_macs() {
        let table = AddressTable::new();
        let events = vec![
            NetworkChangeEvent::Changed {
                network: "eth0".into(),
                mac: mac("aa:bb:cc:dd:ee:09"),
                old_ip: None,
                new_ip: Some(ip("192.168.1.9")),
            },
            NetworkChangeEvent::Lost {
                network: "eth0".into(),
                mac: mac("aa:bb:cc:dd:ee:09"),
                ip: None,
            },
        ];
        assert!(replay(&table, &events).is_empty());
    }
}
