//! OpenFlow 1.0 wire structures: just the subset the Balancer needs to
//! complete the handshake, receive packet-ins, and emit `packet_out` /
//! `flow_mod`.

use std::net::Ipv4Addr;

use crate::error::OpenFlowError;
use crate::mac::MacAddr;

pub const OFP_VERSION: u8 = 0x01;

pub const OFPT_HELLO: u8 = 0;
pub const OFPT_ECHO_REQUEST: u8 = 2;
pub const OFPT_ECHO_REPLY: u8 = 3;
pub const OFPT_FEATURES_REQUEST: u8 = 5;
pub const OFPT_FEATURES_REPLY: u8 = 6;
pub const OFPT_PACKET_IN: u8 = 10;
pub const OFPT_PACKET_OUT: u8 = 13;
pub const OFPT_FLOW_MOD: u8 = 14;

pub const OFPP_NONE: u16 = 0xffff;
pub const OFPP_FLOOD: u16 = 0xfffb;

pub const OFPFC_ADD: u16 = 0;
pub const OFP_FLOW_PERMANENT: u16 = 0;

pub const NO_BUFFER: u32 = 0xffff_ffff;

const HEADER_LEN: usize = 8;
const MATCH_LEN: usize = 40;

/// OpenFlow wildcards: we always produce an exact match, so wildcards is 0.
const OFPFW_NONE: u32 = 0;

/// The 8-byte header common to every OpenFlow message.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl Header {
    pub fn parse(raw: &[u8]) -> Result<Self, OpenFlowError> {
        if raw.len() < HEADER_LEN {
            return Err(OpenFlowError::Truncated {
                need: HEADER_LEN,
                have: raw.len(),
            });
        }
        let version = raw[0];
        if version != OFP_VERSION {
            return Err(OpenFlowError::UnsupportedVersion(version));
        }
        Ok(Header {
            version,
            msg_type: raw[1],
            length: u16::from_be_bytes([raw[2], raw[3]]),
            xid: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }

    pub fn encode(msg_type: u8, length: u16, xid: u32) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = OFP_VERSION;
        out[1] = msg_type;
        out[2..4].copy_from_slice(&length.to_be_bytes());
        out[4..8].copy_from_slice(&xid.to_be_bytes());
        out
    }
}

/// An exact-match `ofp_match` built from a triggering packet plus its
/// ingress port.
#[derive(Debug, Clone, Copy)]
pub struct Match {
    pub in_port: u16,
    pub dl_src: MacAddr,
    pub dl_dst: MacAddr,
    pub dl_type: u16,
    pub nw_proto: u8,
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Match {
    pub fn encode(&self) -> [u8; MATCH_LEN] {
        let mut out = [0u8; MATCH_LEN];
        out[0..4].copy_from_slice(&OFPFW_NONE.to_be_bytes());
        out[4..6].copy_from_slice(&self.in_port.to_be_bytes());
        out[6..12].copy_from_slice(&self.dl_src.as_bytes());
        out[12..18].copy_from_slice(&self.dl_dst.as_bytes());
        // dl_vlan(2) + dl_vlan_pcp(1) + pad(1) left zero (no VLAN)
        out[22..24].copy_from_slice(&self.dl_type.to_be_bytes());
        out[24] = 0; // nw_tos
        out[25] = self.nw_proto;
        // pad(2) at [26..28]
        out[28..32].copy_from_slice(&self.nw_src.octets());
        out[32..36].copy_from_slice(&self.nw_dst.octets());
        out[36..38].copy_from_slice(&self.tp_src.to_be_bytes());
        out[38..40].copy_from_slice(&self.tp_dst.to_be_bytes());
        out
    }
}

/// The three action kinds the Rule Installer ever emits, in emission order.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
    Output(u16),
    Flood,
}

impl Action {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Action::SetDlSrc(mac) => {
                out.extend_from_slice(&4u16.to_be_bytes()); // OFPAT_SET_DL_SRC
                out.extend_from_slice(&16u16.to_be_bytes());
                out.extend_from_slice(&mac.as_bytes());
                out.extend_from_slice(&[0u8; 6]); // pad
            }
            Action::SetDlDst(mac) => {
                out.extend_from_slice(&5u16.to_be_bytes()); // OFPAT_SET_DL_DST
                out.extend_from_slice(&16u16.to_be_bytes());
                out.extend_from_slice(&mac.as_bytes());
                out.extend_from_slice(&[0u8; 6]);
            }
            Action::SetNwSrc(ip) => {
                out.extend_from_slice(&6u16.to_be_bytes()); // OFPAT_SET_NW_SRC
                out.extend_from_slice(&8u16.to_be_bytes());
                out.extend_from_slice(&ip.octets());
            }
            Action::SetNwDst(ip) => {
                out.extend_from_slice(&7u16.to_be_bytes()); // OFPAT_SET_NW_DST
                out.extend_from_slice(&8u16.to_be_bytes());
                out.extend_from_slice(&ip.octets());
            }
            Action::Output(port) => {
                out.extend_from_slice(&0u16.to_be_bytes()); // OFPAT_OUTPUT
                out.extend_from_slice(&8u16.to_be_bytes());
                out.extend_from_slice(&port.to_be_bytes());
                out.extend_from_slice(&0xffffu16.to_be_bytes()); // max_len: whole packet
            }
            Action::Flood => {
                out.extend_from_slice(&0u16.to_be_bytes());
                out.extend_from_slice(&8u16.to_be_bytes());
                out.extend_from_slice(&OFPP_FLOOD.to_be_bytes());
                out.extend_from_slice(&0xffffu16.to_be_bytes());
            }
        }
    }
}

fn encode_actions(actions: &[Action]) -> Vec<u8> {
    let mut out = Vec::new();
    for action in actions {
        action.encode(&mut out);
    }
    out
}

/// A `flow_mod` add request, as built by the Rule Installer (§4.5).
#[derive(Debug, Clone)]
pub struct FlowMod {
    pub xid: u32,
    pub m: Match,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub buffer_id: u32,
    pub actions: Vec<Action>,
}

impl FlowMod {
    pub fn encode(&self) -> Vec<u8> {
        let action_bytes = encode_actions(&self.actions);
        let body_len = MATCH_LEN + 8 + 2 + 2 + 2 + 2 + 4 + 2 + 2 + action_bytes.len();
        let total_len = HEADER_LEN + body_len;

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(&Header::encode(OFPT_FLOW_MOD, total_len as u16, self.xid));
        out.extend_from_slice(&self.m.encode());
        out.extend_from_slice(&0u64.to_be_bytes()); // cookie
        out.extend_from_slice(&OFPFC_ADD.to_be_bytes());
        out.extend_from_slice(&self.idle_timeout.to_be_bytes());
        out.extend_from_slice(&self.hard_timeout.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // priority
        out.extend_from_slice(&self.buffer_id.to_be_bytes());
        out.extend_from_slice(&OFPP_NONE.to_be_bytes()); // out_port
        out.extend_from_slice(&0u16.to_be_bytes()); // flags
        out.extend_from_slice(&action_bytes);
        out
    }
}

/// A `packet_out`, used both for ARP-probe floods and for releasing a
/// buffered packet on drop.
#[derive(Debug, Clone)]
pub struct PacketOut {
    pub xid: u32,
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    /// Raw packet data; only sent when `buffer_id == NO_BUFFER`.
    pub data: Vec<u8>,
}

impl PacketOut {
    pub fn encode(&self) -> Vec<u8> {
        let action_bytes = encode_actions(&self.actions);
        let data: &[u8] = if self.buffer_id == NO_BUFFER { &self.data } else { &[] };
        let total_len = HEADER_LEN + 4 + 2 + 2 + action_bytes.len() + data.len();

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(&Header::encode(OFPT_PACKET_OUT, total_len as u16, self.xid));
        out.extend_from_slice(&self.buffer_id.to_be_bytes());
        out.extend_from_slice(&self.in_port.to_be_bytes());
        out.extend_from_slice(&(action_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&action_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// A decoded `packet_in`, carrying enough to classify and reply.
#[derive(Debug, Clone)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub in_port: u16,
    pub data: Vec<u8>,
}

impl PacketIn {
    pub fn parse(body: &[u8]) -> Result<Self, OpenFlowError> {
        if body.len() < 10 {
            return Err(OpenFlowError::Truncated {
                need: 10,
                have: body.len(),
            });
        }
        let buffer_id = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        let in_port = u16::from_be_bytes([body[6], body[7]]);
        // byte 8 = reason, byte 9 = pad, then data
        let data = body[10..].to_vec();
        Ok(PacketIn {
            buffer_id,
            in_port,
            data,
        })
    }
}

/// Minimal `features_reply` fields: we only need the switch's `dpid`.
#[derive(Debug, Clone, Copy)]
pub struct FeaturesReply {
    pub dpid: u64,
}

impl FeaturesReply {
    pub fn parse(body: &[u8]) -> Result<Self, OpenFlowError> {
        if body.len() < 8 {
            return Err(OpenFlowError::Truncated {
                need: 8,
                have: body.len(),
            });
        }
        let dpid = u64::from_be_bytes(body[0..8].try_into().unwrap());
        Ok(FeaturesReply { dpid })
    }
}

/// Build a bare `hello`/`features_request`/`echo_reply` (all empty bodies).
pub fn encode_empty(msg_type: u8, xid: u32) -> Vec<u8> {
    Header::encode(msg_type, HEADER_LEN as u16, xid).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let raw = Header::encode(OFPT_HELLO, 8, 42);
        let hdr = Header::parse(&raw).unwrap();
        assert_eq!(hdr.msg_type, OFPT_HELLO);
        assert_eq!(hdr.xid, 42);
        assert_eq!(hdr.length, 8);
    }

    #[test]
    fn rejects_bad_version() {
        let mut raw = Header::encode(OFPT_HELLO, 8, 1);
        raw[0] = 0x04;
        assert!(Header::parse(&raw).is_err());
    }

    #[test]
    fn match_encode_is_exact_length() {
        let m = Match {
            in_port: 1,
            dl_src: MacAddr::new([0; 6]),
            dl_dst: MacAddr::BROADCAST,
            dl_type: 0x0800,
            nw_proto: 6,
            nw_src: Ipv4Addr::new(192, 168, 1, 5),
            nw_dst: Ipv4Addr::new(10, 0, 0, 100),
            tp_src: 40000,
            tp_dst: 80,
        };
        assert_eq!(m.encode().len(), MATCH_LEN);
    }

    #[test]
    fn flow_mod_action_order_is_preserved() {
        let fm = FlowMod {
            xid: 1,
            m: Match {
                in_port: 1,
                dl_src: MacAddr::new([0; 6]),
                dl_dst: MacAddr::BROADCAST,
                dl_type: 0x0800,
                nw_proto: 6,
                nw_src: Ipv4Addr::new(192, 168, 1, 5),
                nw_dst: Ipv4Addr::new(10, 0, 0, 100),
                tp_src: 40000,
                tp_dst: 80,
            },
            idle_timeout: 10,
            hard_timeout: OFP_FLOW_PERMANENT,
            buffer_id: NO_BUFFER,
            actions: vec![
                Action::SetDlDst(MacAddr::new([0xaa, 0xbb, 0xcc, 0, 0, 1])),
                Action::SetNwDst(Ipv4Addr::new(10, 0, 0, 1)),
                Action::Output(3),
            ],
        };
        let encoded = fm.encode();
        let hdr = Header::parse(&encoded).unwrap();
        assert_eq!(hdr.msg_type, OFPT_FLOW_MOD);
        assert_eq!(hdr.length as usize, encoded.len());
    }

    #[test]
    fn packet_in_parses_buffer_and_port() {
        let mut body = vec![0u8; 10];
        body[0..4].copy_from_slice(&7u32.to_be_bytes());
        body[6..8].copy_from_slice(&3u16.to_be_bytes());
        body.extend_from_slice(&[1, 2, 3]);
        let pin = PacketIn::parse(&body).unwrap();
        assert_eq!(pin.buffer_id, 7);
        assert_eq!(pin.in_port, 3);
        assert_eq!(pin.data, vec![1, 2, 3]);
    }
}
