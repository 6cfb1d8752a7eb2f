//! Error types for network configuration

use hostnet_exec::{ExecError, PipelineError};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, NetcfgError>;

#[derive(Debug, Error)]
pub enum NetcfgError {
    /// The two WiFi password fields differ; nothing was executed
    #[error("Password mismatch.")]
    PasswordMismatch,

    /// A configuration pipeline aborted
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A read-only nmcli query failed
    #[error("nmcli query failed: {0}")]
    Query(#[from] ExecError),

    /// No managed device was listed
    #[error("No network available.")]
    NoNetworkAvailable,

    /// No connection has an address whose network contains the gateway
    #[error("No connection found for gateway {0}")]
    NoConnectionForGateway(Ipv4Addr),

    #[error("Unknown power action '{0}'")]
    UnknownPowerAction(String),
}

impl NetcfgError {
    /// Raw diagnostic text of the failing command, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            NetcfgError::Pipeline(e) => e.source.stderr(),
            NetcfgError::Query(e) => e.stderr(),
            _ => None,
        }
    }
}
