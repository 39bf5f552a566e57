//! Minimal Ethernet/ARP/IPv4/TCP parsing.
//!
//! Parsing is deliberately shallow: just enough structure to drive the
//! Dispatcher's classification. Anything that doesn't parse as one of these
//! shapes becomes [`crate::error::BalancerError::MalformedPacket`] and is
//! dropped, never panics.

mod arp;
mod ethernet;
mod ipv4;
mod tcp;

pub use arp::{ArpOp, ArpPacket};
pub use ethernet::{EtherType, EthernetFrame};
pub use ipv4::Ipv4Packet;
pub use tcp::TcpHeader;

use crate::error::BalancerError;

/// The parsed shape of a packet-in's payload, as far as the Dispatcher cares.
#[derive(Debug, Clone)]
pub enum ParsedPacket<'a> {
    Arp(ArpPacket),
    Tcp { ipv4: Ipv4Packet<'a>, tcp: TcpHeader },
    Other,
}

/// Parse an Ethernet frame and classify its payload.
pub fn parse(raw: &[u8]) -> Result<(EthernetFrame<'_>, ParsedPacket<'_>), BalancerError> {
    let eth = EthernetFrame::parse(raw)?;
    let parsed = match eth.ethertype {
        EtherType::Arp => ParsedPacket::Arp(ArpPacket::parse(eth.payload)?),
        EtherType::Ipv4 => {
            let ipv4 = Ipv4Packet::parse(eth.payload)?;
            if ipv4.protocol == Ipv4Packet::PROTO_TCP {
                let tcp = TcpHeader::parse(ipv4.payload)?;
                ParsedPacket::Tcp { ipv4, tcp }
            } else {
                ParsedPacket::Other
            }
        }
        EtherType::Other(_) => ParsedPacket::Other,
    };
    Ok((eth, parsed))
}
