//! ARP-based neighbor discovery
//!
//! This crate keeps a live table of every MAC address visible on the host's
//! network segments, keyed by MAC, and notifies observers when addresses
//! appear, disappear or move to a new IP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  ARP table      │     │   ArpSampler    │     │ DiscoveryEngine │
//! │ /proc/net/arp   │────▶│  + interfaces   │────▶│  diff + swap    │──▶ observers
//! │ or `arp -an`    │     │  (self MACs)    │     │  lookup/resolve │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                                                  ┌───────▼───────┐
//!                                                  │    Prober     │
//!                                                  │   (ping)      │
//!                                                  └───────────────┘
//! ```

pub mod arp;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod prober;
pub mod sampler;
pub mod types;

pub use arp::{
    parse_arp_an, parse_proc_net_arp, ArpCommandReader, ArpEntry, ArpTableReader, ProcArpReader,
    RawArpTable,
};
pub use config::{ArpSource, DiscoveryConfig};
pub use diff::diff;
pub use engine::{ChangedHandler, DiscoveryEngine, FoundHandler, LostHandler, SubscriberId};
pub use error::{DiscoveryError, Result};
pub use interfaces::{
    ipv4_networks, search_network_interface, InterfaceEnumerator, LocalInterface, SystemInterfaces,
};
pub use prober::{ping_args, BindingFlavor, PingProber, Prober};
pub use sampler::{build_table, ArpSampler};
pub use types::{AddressRecord, AddressTable, MacAddress, NetworkChangeEvent};
