//! The Balancer: one instance per OpenFlow switch connection, composed of
//! the five cooperating components described in the design doc.
//!
//! Implemented as a single-task actor (see [`crate::actor`]): the Backend
//! Registry, Prober state, and Flow Memory are owned outright by this one
//! task and mutated only from [`Balancer::handle`], which realizes the
//! "single-threaded cooperative, no locks" concurrency model directly —
//! `tokio::select!` inside [`crate::actor::run_actor_loop`] guarantees at
//! most one branch runs at a time.

pub mod dispatcher;
pub mod flow_memory;
pub mod prober;
pub mod registry;
pub mod rules;

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::actor::{self, Actor, ActorHandle};
use crate::mac::MacAddr;
use crate::openflow::connection::SwitchEvent;
use crate::openflow::message::PacketIn;
use crate::openflow::SwitchSender;

use flow_memory::FlowMemory;
use prober::Prober;
use registry::Registry;

/// Per-switch Balancer configuration (§3): service IP, configured server
/// pool, and the flow-memory retention window.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    pub service_ip: Ipv4Addr,
    pub servers: Vec<Ipv4Addr>,
    pub flow_memory_timeout: Duration,
}

impl BalancerConfig {
    pub fn new(service_ip: Ipv4Addr, servers: Vec<Ipv4Addr>) -> Self {
        BalancerConfig {
            service_ip,
            servers,
            flow_memory_timeout: Duration::from_secs(300),
        }
    }
}

/// Messages the Balancer actor processes, one at a time.
pub enum Message {
    Switch(SwitchEvent),
    ProbeTick,
}

impl actor::Message for Message {}

pub struct Balancer {
    name: String,
    mac: MacAddr,
    sender: SwitchSender,
    config: BalancerConfig,
    registry: Registry,
    prober: Prober,
    flow_memory: FlowMemory,
    next_xid: u32,
}

impl Balancer {
    fn new(dpid: u64, sender: SwitchSender, config: BalancerConfig) -> Self {
        let mac = MacAddr::from_dpid(dpid);
        let registry = Registry::new(config.servers.clone());
        Balancer {
            name: format!("balancer-{:#018x}", dpid),
            mac,
            sender,
            config,
            registry,
            prober: Prober::new(),
            flow_memory: FlowMemory::new(),
            next_xid: 1,
        }
    }

    pub(crate) fn mac(&self) -> MacAddr {
        self.mac
    }

    pub(crate) fn service_ip(&self) -> Ipv4Addr {
        self.config.service_ip
    }

    pub(crate) fn flow_memory_timeout(&self) -> Duration {
        self.config.flow_memory_timeout
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub(crate) fn prober_mut(&mut self) -> &mut Prober {
        &mut self.prober
    }

    pub(crate) fn flow_memory(&self) -> &FlowMemory {
        &self.flow_memory
    }

    pub(crate) fn flow_memory_mut(&mut self) -> &mut FlowMemory {
        &mut self.flow_memory
    }

    pub(crate) fn next_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }

    pub(crate) fn send(&self, msg: Vec<u8>) {
        if let Err(e) = self.sender.send(msg) {
            warn!(error = %e, "switch send failed");
        }
    }

    /// One Prober tick (§4.2): expire outstanding probes, sweep flow
    /// memory, rotate to the next backend, and emit its ARP probe.
    fn on_probe_tick(&mut self) {
        let now = Instant::now();

        for dead in self.prober.expire(now) {
            self.registry.mark_dead(dead);
        }

        let removed = self.flow_memory.sweep(now);
        if removed > 0 {
            debug!(removed, "flow memory entries expired");
        }

        let servers = self.config.servers.clone();
        if let Some(target) = self.prober.select_next(&servers) {
            let xid = self.next_xid();
            let probe = prober::build_probe(xid, self.mac, self.config.service_ip, target);
            self.send(probe.encode());
            self.prober.record(target, now);
        }
    }
}

#[async_trait]
impl Actor for Balancer {
    type Message = Message;

    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&mut self, msg: Message, _handle: &ActorHandle<Message>) -> bool {
        match msg {
            Message::Switch(SwitchEvent::PacketIn(pin)) => {
                dispatcher::dispatch(self, pin);
                true
            }
            Message::Switch(SwitchEvent::Disconnected) => false,
            Message::ProbeTick => {
                self.on_probe_tick();
                true
            }
        }
    }
}

/// Spawn and run one Balancer for a switch connection until it disconnects.
pub async fn run(dpid: u64, sender: SwitchSender, mut events: mpsc::UnboundedReceiver<SwitchEvent>, config: BalancerConfig) {
    let wait_time = prober::probe_wait_time(config.servers.len());
    let (handle, rx) = actor::mailbox::<Message>();

    let fwd_handle = handle.clone();
    tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            let stop = matches!(ev, SwitchEvent::Disconnected);
            if fwd_handle.send(Message::Switch(ev)).is_err() || stop {
                break;
            }
        }
    });

    let ticker_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(wait_time).await;
            if ticker_handle.send(Message::ProbeTick).is_err() {
                break;
            }
        }
    });

    let balancer = Balancer::new(dpid, sender, config);
    actor::run_actor_loop(balancer, rx, handle).await;
}

#[cfg(test)]
pub(crate) fn test_balancer(dpid: u64, service_ip: Ipv4Addr, servers: Vec<Ipv4Addr>) -> (Balancer, mpsc::UnboundedReceiver<Vec<u8>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = crate::openflow::connection::test_sender(tx);
    let config = BalancerConfig::new(service_ip, servers);
    (Balancer::new(dpid, sender, config), rx)
}
