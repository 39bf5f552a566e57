//! Prober: the periodic ARP-liveness task. Runs as piggybacked logic inside
//! the Balancer's own tick handling — see [`crate::balancer::Balancer`] —
//! rather than as an independently scheduled loop, so that expiry and probe
//! emission never race with packet-in handling (§5).

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::mac::MacAddr;
use crate::openflow::message::{Action, PacketOut, NO_BUFFER, OFPP_NONE};
use crate::packet::{ArpOp, ArpPacket};

pub const PROBE_CYCLE_TIME: Duration = Duration::from_secs(5);
pub const ARP_TIMEOUT: Duration = Duration::from_secs(3);
const MIN_PROBE_WAIT: Duration = Duration::from_millis(250);

/// `max(0.25s, probe_cycle_time / len(servers))`. The 0.25s floor caps probe
/// rate at four per second regardless of pool size.
pub fn probe_wait_time(server_count: usize) -> Duration {
    if server_count == 0 {
        return PROBE_CYCLE_TIME;
    }
    let per_server = PROBE_CYCLE_TIME / server_count as u32;
    per_server.max(MIN_PROBE_WAIT)
}

/// Outstanding ARP probes: at most one per backend, newest deadline wins.
#[derive(Default)]
pub struct Prober {
    outstanding: HashMap<Ipv4Addr, Instant>,
    next_index: usize,
}

impl Prober {
    pub fn new() -> Self {
        Prober::default()
    }

    pub fn is_outstanding(&self, ip: Ipv4Addr) -> bool {
        self.outstanding.contains_key(&ip)
    }

    pub fn clear(&mut self, ip: Ipv4Addr) {
        self.outstanding.remove(&ip);
    }

    /// Remove and return every backend whose probe deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<Ipv4Addr> {
        let expired: Vec<Ipv4Addr> = self
            .outstanding
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&ip, _)| ip)
            .collect();
        for ip in &expired {
            self.outstanding.remove(ip);
        }
        expired
    }

    pub fn record(&mut self, ip: Ipv4Addr, now: Instant) {
        self.outstanding.insert(ip, now + ARP_TIMEOUT);
    }

    /// Rotate through the configured server list by index, so every backend
    /// is probed exactly once per full cycle regardless of liveness.
    pub fn select_next(&mut self, servers: &[Ipv4Addr]) -> Option<Ipv4Addr> {
        if servers.is_empty() {
            return None;
        }
        let ip = servers[self.next_index % servers.len()];
        self.next_index = (self.next_index + 1) % servers.len();
        Some(ip)
    }
}

/// Build the ARP-probe `packet_out`: a FLOOD packet_out carrying an
/// Ethernet(ARP REQUEST) frame, `in_port = NONE`.
pub fn build_probe(xid: u32, balancer_mac: MacAddr, service_ip: Ipv4Addr, target_ip: Ipv4Addr) -> PacketOut {
    let arp = ArpPacket {
        op: ArpOp::Request,
        hwsrc: balancer_mac,
        protosrc: service_ip,
        hwdst: MacAddr::BROADCAST,
        protodst: target_ip,
    };
    let frame = crate::packet::EthernetFrame::encode(
        MacAddr::BROADCAST,
        balancer_mac,
        crate::packet::EtherType::Arp,
        &arp.encode(),
    );
    PacketOut {
        xid,
        buffer_id: NO_BUFFER,
        in_port: OFPP_NONE,
        actions: vec![Action::Flood],
        data: frame,
    }
}
