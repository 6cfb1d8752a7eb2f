//! Discovery engine settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interval between periodic ARP samples
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a single active probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(7);

/// Where the ARP table is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArpSource {
    /// `/proc/net/arp`
    #[default]
    Proc,
    /// `arp -an`
    Command,
}

/// Discovery engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds between periodic samples
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,
    /// Seconds allowed for one active probe
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
    /// Re-probe every known address after each periodic sample
    pub liveness_sweep: bool,
    /// Re-key local interfaces onto ARP segment names when they differ
    pub reconcile_segment_names: bool,
    pub arp_source: ArpSource,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            liveness_sweep: true,
            reconcile_segment_names: false,
            arp_source: ArpSource::default(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.probe_timeout, Duration::from_secs(7));
        assert!(config.liveness_sweep);
        assert!(!config.reconcile_segment_names);
        assert_eq!(config.arp_source, ArpSource::Proc);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DiscoveryConfig =
            serde_json::from_str(r#"{"refresh_interval": 15, "arp_source": "command"}"#).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.arp_source, ArpSource::Command);
    }
}
