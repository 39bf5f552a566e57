//! Rule Installer: builds the `flow_mod`/`packet_out` messages that perform
//! the actual address rewrite and port steering in the switch.

use std::net::Ipv4Addr;

use crate::mac::MacAddr;
use crate::openflow::message::{Action, FlowMod, Match, PacketOut, NO_BUFFER};

pub const FLOW_IDLE_TIMEOUT: u16 = 10;

/// Build the exact-match `ofp_match` for a TCP packet, as the switch's
/// "match from packet" helper would.
#[allow(clippy::too_many_arguments)]
pub fn match_from_tcp(
    in_port: u16,
    dl_src: MacAddr,
    dl_dst: MacAddr,
    nw_src: Ipv4Addr,
    nw_dst: Ipv4Addr,
    tp_src: u16,
    tp_dst: u16,
) -> Match {
    Match {
        in_port,
        dl_src,
        dl_dst,
        dl_type: 0x0800,
        nw_proto: 6, // TCP
        nw_src,
        nw_dst,
        tp_src,
        tp_dst,
    }
}

/// Forward direction: rewrite destination to the chosen backend, output on
/// its learned switch port.
pub fn forward_flow_mod(xid: u32, m: Match, backend_mac: MacAddr, backend_ip: Ipv4Addr, backend_port: u16, buffer_id: u32) -> FlowMod {
    FlowMod {
        xid,
        m,
        idle_timeout: FLOW_IDLE_TIMEOUT,
        hard_timeout: crate::openflow::message::OFP_FLOW_PERMANENT,
        buffer_id,
        actions: vec![
            Action::SetDlDst(backend_mac),
            Action::SetNwDst(backend_ip),
            Action::Output(backend_port),
        ],
    }
}

/// Reverse direction: rewrite source back to `(balancer_mac, service_ip)`,
/// output on the client's ingress port.
///
/// Deliberately omits a `set-dl-dst` for the client MAC, matching the
/// original behavior of relying on the switch's own learning for the
/// client-facing hop (§9 open question, resolved: preserved as-is).
pub fn reverse_flow_mod(xid: u32, m: Match, balancer_mac: MacAddr, service_ip: Ipv4Addr, client_port: u16, buffer_id: u32) -> FlowMod {
    FlowMod {
        xid,
        m,
        idle_timeout: FLOW_IDLE_TIMEOUT,
        hard_timeout: crate::openflow::message::OFP_FLOW_PERMANENT,
        buffer_id,
        actions: vec![
            Action::SetDlSrc(balancer_mac),
            Action::SetNwSrc(service_ip),
            Action::Output(client_port),
        ],
    }
}

/// Release a buffered packet on drop: empty actions, referencing the
/// original `buffer_id`. Returns `None` if the packet-in carried no buffer
/// (nothing to release — drops are otherwise silent).
pub fn drop_release(xid: u32, buffer_id: u32, in_port: u16) -> Option<PacketOut> {
    if buffer_id == NO_BUFFER {
        return None;
    }
    Some(PacketOut {
        xid,
        buffer_id,
        in_port,
        actions: Vec::new(),
        data: Vec::new(),
    })
}
