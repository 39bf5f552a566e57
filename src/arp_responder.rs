//! A small stateless ARP responder for the service IP.
//!
//! The distilled design treats ARP-responder duty as a pre-configured
//! external helper the Balancer doesn't implement itself (§6). Since this
//! crate has no surrounding controller framework to supply that helper, it
//! carries a minimal implementation of the same role: answer ARP requests
//! for the service IP with the Balancer's synthetic MAC, so clients can
//! resolve `service_ip -> Balancer MAC` at all. It never touches Balancer
//! state and is wired in ahead of the Dispatcher's own ARP-reply handling.

use crate::mac::MacAddr;
use crate::openflow::message::{Action, PacketOut, NO_BUFFER};
use crate::packet::{ArpOp, ArpPacket, EtherType, EthernetFrame};

/// If `request` is an ARP REQUEST for `service_ip`, build the `packet_out`
/// carrying the reply. Returns `None` for anything else (left to the
/// Dispatcher's own classification).
pub fn respond(balancer_mac: MacAddr, service_ip: std::net::Ipv4Addr, in_port: u16, xid: u32, request: &ArpPacket) -> Option<PacketOut> {
    if request.op != ArpOp::Request || request.protodst != service_ip {
        return None;
    }

    let reply = ArpPacket {
        op: ArpOp::Reply,
        hwsrc: balancer_mac,
        protosrc: service_ip,
        hwdst: request.hwsrc,
        protodst: request.protosrc,
    };
    let frame = EthernetFrame::encode(request.hwsrc, balancer_mac, EtherType::Arp, &reply.encode());

    Some(PacketOut {
        xid,
        buffer_id: NO_BUFFER,
        in_port: crate::openflow::message::OFPP_NONE,
        actions: vec![Action::Output(in_port)],
        data: frame,
    })
}
