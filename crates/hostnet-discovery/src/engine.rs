//! DiscoveryEngine - live MAC/IP state and change notification
//!
//! The engine owns the `previous`/`current` snapshot pair. All writes go
//! through one async mutex (the one guarding `previous`), so a sample, its
//! diff, the swap and observer dispatch never interleave with another
//! refresh. Readers only clone the `Arc` of the current table.

use futures::future::join_all;
use ipnetwork::Ipv4Network;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::DiscoveryConfig;
use crate::diff::diff;
use crate::error::{DiscoveryError, Result};
use crate::interfaces::{ipv4_networks, search_network_interface};
use crate::prober::Prober;
use crate::sampler::ArpSampler;
use crate::types::{AddressTable, MacAddress, NetworkChangeEvent};

/// Extra time granted to a probe beyond its own timeout
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Floor for the periodic sampling interval
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// `(network, mac, ip)`
pub type FoundHandler = Arc<dyn Fn(&str, &MacAddress, Option<Ipv4Addr>) + Send + Sync>;
/// `(network, mac, ip)`
pub type LostHandler = Arc<dyn Fn(&str, &MacAddress, Option<Ipv4Addr>) + Send + Sync>;
/// `(network, mac, old_ip, new_ip)`
pub type ChangedHandler =
    Arc<dyn Fn(&str, &MacAddress, Option<Ipv4Addr>, Option<Ipv4Addr>) + Send + Sync>;

/// Opaque identity of an observer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Clone, Default)]
struct Subscriber {
    on_found: Option<FoundHandler>,
    on_lost: Option<LostHandler>,
    on_changed: Option<ChangedHandler>,
}

struct Inner {
    sampler: ArpSampler,
    prober: Arc<dyn Prober>,
    config: DiscoveryConfig,
    current: RwLock<Arc<AddressTable>>,
    /// Also the single-writer lock for the snapshot pair
    previous: Mutex<Arc<AddressTable>>,
    /// Registration order is dispatch order
    subscribers: RwLock<Vec<(SubscriberId, Subscriber)>>,
}

/// Tracks every host visible on the local segments
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct DiscoveryEngine {
    inner: Arc<Inner>,
}

impl DiscoveryEngine {
    pub fn new(sampler: ArpSampler, prober: Arc<dyn Prober>, config: DiscoveryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sampler,
                prober,
                config,
                current: RwLock::new(Arc::new(AddressTable::new())),
                previous: Mutex::new(Arc::new(AddressTable::new())),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    fn update_subscriber(&self, id: SubscriberId, update: impl FnOnce(&mut Subscriber)) {
        let mut subscribers = self.inner.subscribers.write();
        match subscribers.iter_mut().find(|(sid, _)| *sid == id) {
            Some((_, sub)) => update(sub),
            None => {
                let mut sub = Subscriber::default();
                update(&mut sub);
                subscribers.push((id, sub));
            }
        }
    }

    /// Register (or replace) `id`'s handler for newly found addresses
    pub fn on_found(&self, id: impl Into<SubscriberId>, handler: FoundHandler) {
        self.update_subscriber(id.into(), |s| s.on_found = Some(handler));
    }

    /// Register (or replace) `id`'s handler for lost addresses
    pub fn on_lost(&self, id: impl Into<SubscriberId>, handler: LostHandler) {
        self.update_subscriber(id.into(), |s| s.on_lost = Some(handler));
    }

    /// Register (or replace) `id`'s handler for IP changes
    pub fn on_changed(&self, id: impl Into<SubscriberId>, handler: ChangedHandler) {
        self.update_subscriber(id.into(), |s| s.on_changed = Some(handler));
    }

    /// Drop every handler of `id`. Returns false if `id` was unknown.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| sid != id);
        subscribers.len() != before
    }

    /// Sample, diff against the current table, swap, and notify observers.
    ///
    /// On a sampling error both tables are left exactly as they were.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<NetworkChangeEvent>> {
        let mut previous = self.inner.previous.lock().await;

        let fresh = self.inner.sampler.sample().await?;
        let old = self.inner.current.read().clone();
        let events = diff(&old, &fresh);

        *self.inner.current.write() = Arc::new(fresh);
        *previous = old;

        self.dispatch(&events);
        Ok(events)
    }

    /// [`Self::refresh`] with sampling failures logged and swallowed
    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "An error occurred while checking the arp table");
        }
    }

    fn dispatch(&self, events: &[NetworkChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();

        for event in events {
            info!(%event, "Network change");
            for sub in &subscribers {
                match event {
                    NetworkChangeEvent::Found { network, mac, ip } => {
                        if let Some(cb) = &sub.on_found {
                            cb(network, mac, *ip);
                        }
                    }
                    NetworkChangeEvent::Lost { network, mac, ip } => {
                        if let Some(cb) = &sub.on_lost {
                            cb(network, mac, *ip);
                        }
                    }
                    NetworkChangeEvent::Changed {
                        network,
                        mac,
                        old_ip,
                        new_ip,
                    } => {
                        if let Some(cb) = &sub.on_changed {
                            cb(network, mac, *old_ip, *new_ip);
                        }
                    }
                }
            }
        }
    }

    /// MAC currently holding `ip` on `network`, from the cached table only
    pub fn lookup(&self, network: &str, ip: Ipv4Addr) -> Option<MacAddress> {
        self.inner.current.read().lookup(network, ip)
    }

    /// Deep copy of the current table
    pub fn snapshot(&self) -> AddressTable {
        let current = self.inner.current.read().clone();
        (*current).clone()
    }

    /// Deep copy of the current table, optionally restricted to local addresses
    pub fn macs(&self, self_only: bool) -> AddressTable {
        let current = self.inner.current.read().clone();
        if self_only {
            current.self_only()
        } else {
            (*current).clone()
        }
    }

    /// Deep copy of the table replaced by the last successful refresh
    pub async fn previous_snapshot(&self) -> AddressTable {
        let previous = self.inner.previous.lock().await;
        (**previous).clone()
    }

    /// Resolve the MAC of `ip` on `network`.
    ///
    /// Checks the cache, then forces a refresh. With `active_search` the
    /// host is probed and the table refreshed once more before giving up.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        network: &str,
        ip: Ipv4Addr,
        active_search: bool,
    ) -> Result<MacAddress> {
        if let Some(mac) = self.lookup(network, ip) {
            return Ok(mac);
        }

        self.refresh_logged().await;
        if let Some(mac) = self.lookup(network, ip) {
            return Ok(mac);
        }

        if !active_search {
            return Err(DiscoveryError::NotFound {
                network: network.to_string(),
                ip,
            });
        }

        let timeout = self.inner.config.probe_timeout;
        let probe = self.inner.prober.probe(network, ip, timeout);
        match tokio::time::timeout(timeout + PROBE_GRACE, probe).await {
            Ok(Ok(reachable)) => debug!(%network, %ip, reachable, "Probe finished"),
            Ok(Err(DiscoveryError::Probe { reason, .. })) => {
                return Err(DiscoveryError::Probe {
                    network: network.to_string(),
                    ip,
                    reason,
                })
            }
            Ok(Err(e)) => {
                return Err(DiscoveryError::Probe {
                    network: network.to_string(),
                    ip,
                    reason: e.to_string(),
                })
            }
            Err(_) => debug!(%network, %ip, "Probe timed out"),
        }

        self.refresh_logged().await;
        self.lookup(network, ip).ok_or_else(|| DiscoveryError::Timeout {
            network: network.to_string(),
            ip,
        })
    }

    /// Probe every known address without waiting for the results
    pub fn liveness_sweep(&self) -> JoinHandle<()> {
        let targets: Vec<(String, Ipv4Addr)> = self
            .inner
            .current
            .read()
            .iter()
            .filter_map(|(_, r)| r.ip.map(|ip| (r.network.clone(), ip)))
            .collect();
        let prober = self.inner.prober.clone();
        let timeout = self.inner.config.probe_timeout;

        tokio::spawn(async move {
            let probes = targets.iter().map(|(network, ip)| {
                let prober = prober.clone();
                async move {
                    if let Err(e) = prober.probe(network, *ip, timeout).await {
                        debug!(%network, %ip, error = %e, "Liveness probe failed");
                    }
                }
            });
            join_all(probes).await;
        })
    }

    /// Start periodic sampling until `shutdown` is cancelled.
    ///
    /// An initial refresh runs immediately; every tick refreshes and then
    /// (if enabled) sweeps known addresses.
    pub fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        let period = self.inner.config.refresh_interval.max(MIN_REFRESH_INTERVAL);

        tokio::spawn(async move {
            engine.refresh_logged().await;

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Discovery loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        engine.refresh_logged().await;
                        if engine.inner.config.liveness_sweep {
                            engine.liveness_sweep();
                        }
                    }
                }
            }
        })
    }

    /// IPv4 networks of each local interface
    pub fn network_interfaces(&self) -> Result<BTreeMap<String, Vec<Ipv4Network>>> {
        Ok(ipv4_networks(&self.inner.sampler.local_interfaces()?))
    }

    /// Local interface whose network contains `ip`
    pub fn search_network_interface(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        Ok(search_network_interface(ip, &self.network_interfaces()?))
    }
}
