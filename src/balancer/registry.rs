//! Backend Registry: the configured server list and the live-server map.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use rand::seq::IteratorRandom;
use tracing::info;

use crate::error::BalancerError;
use crate::mac::MacAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveBackend {
    pub mac: MacAddr,
    pub port: u16,
}

/// Configured servers (fixed order, used by the Prober for round-robin
/// probing) plus the live set learned from ARP replies.
pub struct Registry {
    servers: Vec<Ipv4Addr>,
    live: HashMap<Ipv4Addr, LiveBackend>,
}

impl Registry {
    pub fn new(servers: Vec<Ipv4Addr>) -> Self {
        Registry {
            servers,
            live: HashMap::new(),
        }
    }

    pub fn servers(&self) -> &[Ipv4Addr] {
        &self.servers
    }

    pub fn contains_server(&self, ip: Ipv4Addr) -> bool {
        self.servers.contains(&ip)
    }

    /// Set or refresh the live entry for `ip`. Logs "server up" only on a
    /// genuine transition or rebind, stays silent on an identical refresh.
    pub fn mark_live(&mut self, ip: Ipv4Addr, mac: MacAddr, port: u16) {
        let new = LiveBackend { mac, port };
        match self.live.get(&ip) {
            Some(existing) if *existing == new => {
                // silent refresh
            }
            Some(existing) => {
                info!(backend = %ip, old_mac = %existing.mac, old_port = existing.port, new_mac = %mac, new_port = port, "server rebind");
                self.live.insert(ip, new);
            }
            None => {
                info!(backend = %ip, mac = %mac, port, "server up");
                self.live.insert(ip, new);
            }
        }
    }

    /// Remove the live entry for `ip`, if present. Called by the Prober on
    /// probe expiry.
    pub fn mark_dead(&mut self, ip: Ipv4Addr) {
        if self.live.remove(&ip).is_some() {
            info!(backend = %ip, "server dead");
        }
    }

    pub fn is_live(&self, ip: Ipv4Addr) -> bool {
        self.live.contains_key(&ip)
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<LiveBackend> {
        self.live.get(&ip).copied()
    }

    /// Choose one live backend uniformly at random.
    pub fn pick_live(&self) -> Result<Ipv4Addr, BalancerError> {
        self.live
            .keys()
            .copied()
            .choose(&mut rand::rng())
            .ok_or(BalancerError::NoBackends)
    }
}
