//! Error types for neighbor discovery

use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors that can occur in the discovery engine
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// ARP table read or interface enumeration failed
    #[error("Sampling failed: {0}")]
    Sample(String),

    /// Address absent from the ARP table and no active search requested
    #[error("{ip} on {network} not found in arp table")]
    NotFound { network: String, ip: Ipv4Addr },

    /// Address still absent after an active probe
    #[error("Timeout resolving {ip} on {network}")]
    Timeout { network: String, ip: Ipv4Addr },

    /// The probe itself could not be sent
    #[error("Ping error for {ip} on {network}: {reason}")]
    Probe {
        network: String,
        ip: Ipv4Addr,
        reason: String,
    },

    /// Malformed hardware address
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
}

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
