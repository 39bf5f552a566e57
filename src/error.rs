//! Error types for the Balancer core and the OpenFlow transport it sits on.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors raised while dispatching a single packet-in through the Balancer.
///
/// All of these are non-fatal at Balancer scope: the caller logs and moves
/// on, it never tears the Balancer down.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// `pick_live()` was called with an empty live set.
    #[error("no live backends available")]
    NoBackends,

    /// Server-origin TCP traffic with no matching flow-memory entry.
    #[error("unknown reverse flow from {src}:{src_port} to {dst}:{dst_port}")]
    UnknownReverseFlow {
        src: Ipv4Addr,
        src_port: u16,
        dst: Ipv4Addr,
        dst_port: u16,
    },

    /// A forward-flow memory hit named a backend that is no longer Live.
    #[error("flow memory names stale backend {backend} for {client}:{client_port}")]
    StaleBackend {
        backend: Ipv4Addr,
        client: Ipv4Addr,
        client_port: u16,
    },

    /// A packet failed to parse as Ethernet/ARP/IPv4/TCP.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// Writing to the switch connection failed.
    #[error("switch send failed: {0}")]
    SwitchSendFailure(#[from] std::io::Error),
}

/// Errors from the OpenFlow wire layer (handshake, decode) that sit below
/// `BalancerError` and are not part of the distilled spec's error table.
#[derive(Debug, Error)]
pub enum OpenFlowError {
    #[error("openflow message too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unsupported openflow version {0:#x}, expected 0x01")]
    UnsupportedVersion(u8),

    #[error("unexpected message type {0} during handshake")]
    UnexpectedMessage(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
