//! Flow Memory: a bidirectional 4-tuple table mapping both the forward and
//! reverse halves of a connection to one shared [`AffinityEntry`].
//!
//! Grounded on the arena-plus-dual-index shape: entries live in a plain
//! `Vec` slot arena, and two `HashMap`s index into it by forward and reverse
//! key. Expiry frees the arena slot and both index entries in one pass.
//! There is no shared-ownership handle (`Arc`/`Rc`) anywhere here — a slot
//! index is enough, since the whole structure is owned and mutated from a
//! single task.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// A 4-tuple flow fingerprint: (src ip, dst ip, src port, dst port).
pub type FlowKey = (Ipv4Addr, Ipv4Addr, u16, u16);

pub fn forward_key(client_ip: Ipv4Addr, service_ip: Ipv4Addr, client_port: u16, service_port: u16) -> FlowKey {
    (client_ip, service_ip, client_port, service_port)
}

pub fn reverse_key(backend_ip: Ipv4Addr, client_ip: Ipv4Addr, service_port: u16, client_port: u16) -> FlowKey {
    (backend_ip, client_ip, service_port, client_port)
}

#[derive(Debug, Clone)]
pub struct AffinityEntry {
    pub backend_ip: Ipv4Addr,
    pub client_port: u16,
    pub expiry: Instant,
    forward_key: FlowKey,
    reverse_key: FlowKey,
}

#[derive(Default)]
pub struct FlowMemory {
    arena: Vec<Option<AffinityEntry>>,
    free: Vec<usize>,
    forward_index: HashMap<FlowKey, usize>,
    reverse_index: HashMap<FlowKey, usize>,
}

impl FlowMemory {
    pub fn new() -> Self {
        FlowMemory::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a fresh entry under both keys, allocating a new arena slot.
    /// If `forward_key` or `reverse_key` already map to a live slot, that
    /// binding is simply overwritten to point here; the superseded slot is
    /// left in place and reclaimed on its next expiry (§9 design note: no
    /// proactive orphan cleanup).
    pub fn insert(
        &mut self,
        forward: FlowKey,
        reverse: FlowKey,
        backend_ip: Ipv4Addr,
        client_port: u16,
        expiry: Instant,
    ) -> usize {
        let entry = AffinityEntry {
            backend_ip,
            client_port,
            expiry,
            forward_key: forward,
            reverse_key: reverse,
        };
        let slot = if let Some(free_slot) = self.free.pop() {
            self.arena[free_slot] = Some(entry);
            free_slot
        } else {
            self.arena.push(Some(entry));
            self.arena.len() - 1
        };
        self.forward_index.insert(forward, slot);
        self.reverse_index.insert(reverse, slot);
        slot
    }

    pub fn lookup_forward(&self, key: &FlowKey) -> Option<&AffinityEntry> {
        self.forward_index.get(key).and_then(|&slot| self.arena[slot].as_ref())
    }

    pub fn lookup_reverse(&self, key: &FlowKey) -> Option<&AffinityEntry> {
        self.reverse_index.get(key).and_then(|&slot| self.arena[slot].as_ref())
    }

    /// Refresh the entry found under `forward_key`, setting its expiry to
    /// `now + timeout`. Both key views observe the refresh since they share
    /// the arena slot.
    pub fn refresh_forward(&mut self, key: &FlowKey, now: Instant, timeout: Duration) {
        if let Some(&slot) = self.forward_index.get(key) {
            if let Some(entry) = self.arena[slot].as_mut() {
                entry.expiry = now + timeout;
            }
        }
    }

    pub fn refresh_reverse(&mut self, key: &FlowKey, now: Instant, timeout: Duration) {
        if let Some(&slot) = self.reverse_index.get(key) {
            if let Some(entry) = self.arena[slot].as_mut() {
                entry.expiry = now + timeout;
            }
        }
    }

    /// Remove every entry whose expiry has passed. Returns the count
    /// removed, for the Prober's "size changed" log line.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        for slot in 0..self.arena.len() {
            let expired = match &self.arena[slot] {
                Some(entry) => entry.expiry <= now,
                None => false,
            };
            if expired {
                let entry = self.arena[slot].take().unwrap();
                if self.forward_index.get(&entry.forward_key) == Some(&slot) {
                    self.forward_index.remove(&entry.forward_key);
                }
                if self.reverse_index.get(&entry.reverse_key) == Some(&slot) {
                    self.reverse_index.remove(&entry.reverse_key);
                }
                self.free.push(slot);
                removed += 1;
            }
        }
        removed
    }
}
