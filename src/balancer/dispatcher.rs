//! Packet-In Dispatcher (§4.4): classifies every packet the switch escalates
//! and drives the Registry, Flow Memory, and Rule Installer accordingly.
//! Classification order is significant — see the module-level design doc.

use std::time::Instant;

use tracing::{debug, warn};

use crate::openflow::message::PacketIn;
use crate::packet::{self, ArpOp, ParsedPacket};

use super::{flow_memory, rules, Balancer};

/// Dispatch a single packet-in. Never panics: parse failures and
/// unclassifiable traffic are silently dropped per §7's `MalformedPacket`
/// policy.
pub fn dispatch(balancer: &mut Balancer, pin: PacketIn) {
    let (eth, parsed) = match packet::parse(&pin.data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "dropping malformed packet-in");
            release_buffer(balancer, &pin);
            return;
        }
    };

    match parsed {
        ParsedPacket::Tcp { ipv4, tcp } => {
            if balancer.registry().contains_server(ipv4.src) {
                handle_server_origin(balancer, &pin, eth.src, eth.dst, ipv4.src, ipv4.dst, tcp.src_port, tcp.dst_port);
            } else if ipv4.dst == balancer.service_ip() {
                handle_client_to_service(balancer, &pin, eth.src, eth.dst, ipv4.src, ipv4.dst, tcp.src_port, tcp.dst_port);
            } else {
                debug!(src = %ipv4.src, dst = %ipv4.dst, "dropping unrelated tcp traffic");
                release_buffer(balancer, &pin);
            }
        }
        ParsedPacket::Arp(arp) => {
            if arp.op == ArpOp::Request && arp.protodst == balancer.service_ip() {
                let xid = balancer.next_xid();
                if let Some(reply) = crate::arp_responder::respond(balancer.mac(), balancer.service_ip(), pin.in_port, xid, &arp) {
                    balancer.send(reply.encode());
                }
                return;
            }
            if arp.op == ArpOp::Reply && balancer.prober_mut().is_outstanding(arp.protosrc) {
                balancer.prober_mut().clear(arp.protosrc);
                balancer.registry_mut().mark_live(arp.protosrc, arp.hwsrc, pin.in_port);
            }
            // Untrusted or unsolicited ARP replies are ignored; no response,
            // no rule, no buffer release.
        }
        ParsedPacket::Other => {
            release_buffer(balancer, &pin);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_server_origin(
    balancer: &mut Balancer,
    pin: &PacketIn,
    dl_src: crate::mac::MacAddr,
    dl_dst: crate::mac::MacAddr,
    src_ip: std::net::Ipv4Addr,
    dst_ip: std::net::Ipv4Addr,
    src_port: u16,
    dst_port: u16,
) {
    let rkey = flow_memory::reverse_key(src_ip, dst_ip, src_port, dst_port);
    let client_port = match balancer.flow_memory().lookup_reverse(&rkey) {
        Some(entry) => entry.client_port,
        None => {
            let err = crate::error::BalancerError::UnknownReverseFlow {
                src: src_ip,
                src_port,
                dst: dst_ip,
                dst_port,
            };
            debug!(error = %err, "dropping server-origin packet");
            release_buffer(balancer, pin);
            return;
        }
    };

    let now = Instant::now();
    let timeout = balancer.flow_memory_timeout();
    balancer.flow_memory_mut().refresh_reverse(&rkey, now, timeout);

    let m = rules::match_from_tcp(pin.in_port, dl_src, dl_dst, src_ip, dst_ip, src_port, dst_port);
    let xid = balancer.next_xid();
    let fm = rules::reverse_flow_mod(xid, m, balancer.mac(), balancer.service_ip(), client_port, pin.buffer_id);
    balancer.send(fm.encode());
}

#[allow(clippy::too_many_arguments)]
fn handle_client_to_service(
    balancer: &mut Balancer,
    pin: &PacketIn,
    dl_src: crate::mac::MacAddr,
    dl_dst: crate::mac::MacAddr,
    client_ip: std::net::Ipv4Addr,
    service_ip: std::net::Ipv4Addr,
    client_port: u16,
    service_port: u16,
) {
    let fkey = flow_memory::forward_key(client_ip, service_ip, client_port, service_port);
    let now = Instant::now();

    let existing = balancer.flow_memory().lookup_forward(&fkey).map(|e| e.backend_ip);
    let backend_ip = match existing {
        Some(ip) if balancer.registry().is_live(ip) => ip,
        Some(stale) => {
            let err = crate::error::BalancerError::StaleBackend {
                backend: stale,
                client: client_ip,
                client_port,
            };
            debug!(error = %err, "re-balancing flow off stale backend");
            match balancer.registry().pick_live() {
                Ok(ip) => ip,
                Err(_) => {
                    warn!("No servers!");
                    release_buffer(balancer, pin);
                    return;
                }
            }
        }
        None => match balancer.registry().pick_live() {
            Ok(ip) => ip,
            Err(_) => {
                warn!("No servers!");
                release_buffer(balancer, pin);
                return;
            }
        },
    };

    let backend = match balancer.registry().get(backend_ip) {
        Some(b) => b,
        None => {
            // Backend went dead between pick_live() and get(): treat like
            // NoBackends for this packet; the next probe tick will recover.
            warn!(backend = %backend_ip, "backend vanished before install");
            release_buffer(balancer, pin);
            return;
        }
    };

    let rkey = flow_memory::reverse_key(backend_ip, client_ip, service_port, client_port);
    let expiry = now + balancer.flow_memory_timeout();
    balancer
        .flow_memory_mut()
        .insert(fkey, rkey, backend_ip, pin.in_port, expiry);

    let m = rules::match_from_tcp(pin.in_port, dl_src, dl_dst, client_ip, service_ip, client_port, service_port);
    let xid = balancer.next_xid();
    let fm = rules::forward_flow_mod(xid, m, backend.mac, backend_ip, backend.port, pin.buffer_id);
    balancer.send(fm.encode());
}

fn release_buffer(balancer: &mut Balancer, pin: &PacketIn) {
    let xid = balancer.next_xid();
    if let Some(po) = rules::drop_release(xid, pin.buffer_id, pin.in_port) {
        balancer.send(po.encode());
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::balancer::test_balancer;
    use crate::mac::MacAddr;
    use crate::openflow::message::NO_BUFFER;
    use crate::packet::{ArpOp, ArpPacket, EtherType, EthernetFrame};

    use super::*;

    fn client_mac() -> MacAddr {
        MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    fn backend_mac() -> MacAddr {
        MacAddr::new([0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01])
    }

    fn tcp_packet_in(
        in_port: u16,
        buffer_id: u32,
        eth_src: MacAddr,
        eth_dst: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> PacketIn {
        let mut tcp = vec![0u8; 20];
        tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
        tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());

        let mut ipv4 = vec![0u8; 20];
        ipv4[0] = 0x45;
        ipv4[9] = 6; // TCP
        ipv4[12..16].copy_from_slice(&src_ip.octets());
        ipv4[16..20].copy_from_slice(&dst_ip.octets());
        ipv4.extend_from_slice(&tcp);

        let frame = EthernetFrame::encode(eth_dst, eth_src, EtherType::Ipv4, &ipv4);
        PacketIn {
            buffer_id,
            in_port,
            data: frame,
        }
    }

    fn arp_reply_packet_in(in_port: u16, hwsrc: MacAddr, protosrc: Ipv4Addr, protodst: Ipv4Addr) -> PacketIn {
        let arp = ArpPacket {
            op: ArpOp::Reply,
            hwsrc,
            protosrc,
            hwdst: MacAddr::new([0; 6]),
            protodst,
        };
        let frame = EthernetFrame::encode(MacAddr::new([0; 6]), hwsrc, EtherType::Arp, &arp.encode());
        PacketIn {
            buffer_id: NO_BUFFER,
            in_port,
            data: frame,
        }
    }

    /// S1 — cold start, one backend up: an ARP reply registers the backend
    /// as live and clears its outstanding probe.
    #[test]
    fn s1_arp_reply_registers_backend_live() {
        let (mut balancer, _rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![Ipv4Addr::new(10, 0, 0, 1)]);
        balancer.prober_mut().record(Ipv4Addr::new(10, 0, 0, 1), Instant::now());

        let pin = arp_reply_packet_in(3, backend_mac(), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 100));
        dispatch(&mut balancer, pin);

        assert!(balancer.registry().is_live(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!balancer.prober_mut().is_outstanding(Ipv4Addr::new(10, 0, 0, 1)));
        let live = balancer.registry().get(Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(live.mac, backend_mac());
        assert_eq!(live.port, 3);
    }

    /// S2 — forward install: a client SYN to the service IP gets NAT'd onto
    /// the live backend and recorded under both flow-memory keys.
    #[test]
    fn s2_forward_install() {
        let (mut balancer, mut rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![Ipv4Addr::new(10, 0, 0, 1)]);
        balancer
            .registry_mut()
            .mark_live(Ipv4Addr::new(10, 0, 0, 1), backend_mac(), 3);

        let pin = tcp_packet_in(
            1,
            NO_BUFFER,
            client_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(10, 0, 0, 100),
            40000,
            80,
        );
        dispatch(&mut balancer, pin);

        assert!(rx.try_recv().is_ok(), "expected a flow_mod to be sent");

        let fkey = flow_memory::forward_key(Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(10, 0, 0, 100), 40000, 80);
        let rkey = flow_memory::reverse_key(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(192, 168, 1, 5), 80, 40000);
        assert!(balancer.flow_memory().lookup_forward(&fkey).is_some());
        assert!(balancer.flow_memory().lookup_reverse(&rkey).is_some());
    }

    /// S3 — reverse install: server-origin traffic for a known flow gets
    /// NAT'd back to the client.
    #[test]
    fn s3_reverse_install() {
        let (mut balancer, mut rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![Ipv4Addr::new(10, 0, 0, 1)]);
        balancer
            .registry_mut()
            .mark_live(Ipv4Addr::new(10, 0, 0, 1), backend_mac(), 3);

        let fwd = tcp_packet_in(
            1,
            NO_BUFFER,
            client_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(10, 0, 0, 100),
            40000,
            80,
        );
        dispatch(&mut balancer, fwd);
        let _ = rx.try_recv();

        let rev = tcp_packet_in(
            3,
            NO_BUFFER,
            backend_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(192, 168, 1, 5),
            80,
            40000,
        );
        dispatch(&mut balancer, rev);
        assert!(rx.try_recv().is_ok(), "expected reverse flow_mod");
    }

    /// S4 — backend death and re-balance: once A is marked dead, a repeat
    /// of the same 5-tuple picks a different live backend.
    #[test]
    fn s4_backend_death_triggers_rebalance() {
        let backend_a = Ipv4Addr::new(10, 0, 0, 1);
        let backend_b = Ipv4Addr::new(10, 0, 0, 2);
        let (mut balancer, mut rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![backend_a, backend_b]);
        balancer.registry_mut().mark_live(backend_a, backend_mac(), 3);
        balancer
            .registry_mut()
            .mark_live(backend_b, MacAddr::new([0xaa, 0xbb, 0xcc, 0, 0, 2]), 4);

        let pin = tcp_packet_in(
            1,
            NO_BUFFER,
            client_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(10, 0, 0, 100),
            40000,
            80,
        );
        dispatch(&mut balancer, pin.clone());
        let _ = rx.try_recv();

        balancer.registry_mut().mark_dead(backend_a);

        dispatch(&mut balancer, pin);
        let _ = rx.try_recv();

        let fkey = flow_memory::forward_key(Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(10, 0, 0, 100), 40000, 80);
        let entry = balancer.flow_memory().lookup_forward(&fkey).unwrap();
        assert_eq!(entry.backend_ip, backend_b);
    }

    /// S5 — unknown reverse: server traffic with no matching flow-memory
    /// entry is dropped, no flow_mod installed.
    #[test]
    fn s5_unknown_reverse_is_dropped() {
        let (mut balancer, mut rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![Ipv4Addr::new(10, 0, 0, 1)]);
        balancer
            .registry_mut()
            .mark_live(Ipv4Addr::new(10, 0, 0, 1), backend_mac(), 3);

        let pin = tcp_packet_in(
            3,
            7,
            backend_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(192, 168, 1, 5),
            80,
            40000,
        );
        dispatch(&mut balancer, pin);

        // Only the buffer-release packet_out should have been sent, no flow_mod.
        let msg = rx.try_recv().expect("buffer release expected");
        let hdr = crate::openflow::message::Header::parse(&msg).unwrap();
        assert_eq!(hdr.msg_type, crate::openflow::message::OFPT_PACKET_OUT);
        assert!(rx.try_recv().is_err(), "no further messages expected");
    }

    /// S6 — no live backends: a client SYN with an empty live set is
    /// dropped and leaves flow memory untouched.
    #[test]
    fn s6_no_live_backends_drops_without_memory_mutation() {
        let (mut balancer, _rx) = test_balancer(1, Ipv4Addr::new(10, 0, 0, 100), vec![Ipv4Addr::new(10, 0, 0, 1)]);

        let pin = tcp_packet_in(
            1,
            NO_BUFFER,
            client_mac(),
            MacAddr::from_dpid(1),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(10, 0, 0, 100),
            40000,
            80,
        );
        dispatch(&mut balancer, pin);

        assert!(balancer.flow_memory().is_empty());
    }
}
