use std::net::Ipv4Addr;

use crate::error::BalancerError;
use crate::mac::MacAddr;

const ARP_LEN: usize = 28;
const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
    Other(u16),
}

impl From<u16> for ArpOp {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }
}

impl From<ArpOp> for u16 {
    fn from(value: ArpOp) -> Self {
        match value {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
            ArpOp::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub hwsrc: MacAddr,
    pub protosrc: Ipv4Addr,
    pub hwdst: MacAddr,
    pub protodst: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(raw: &[u8]) -> Result<Self, BalancerError> {
        if raw.len() < ARP_LEN {
            return Err(BalancerError::MalformedPacket("arp packet truncated"));
        }
        let htype = u16::from_be_bytes([raw[0], raw[1]]);
        let ptype = u16::from_be_bytes([raw[2], raw[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 {
            return Err(BalancerError::MalformedPacket("unsupported arp hw/proto type"));
        }
        let op = u16::from_be_bytes([raw[6], raw[7]]).into();
        let hwsrc = MacAddr::new(raw[8..14].try_into().unwrap());
        let protosrc = Ipv4Addr::new(raw[14], raw[15], raw[16], raw[17]);
        let hwdst = MacAddr::new(raw[18..24].try_into().unwrap());
        let protodst = Ipv4Addr::new(raw[24], raw[25], raw[26], raw[27]);
        Ok(ArpPacket {
            op,
            hwsrc,
            protosrc,
            hwdst,
            protodst,
        })
    }

    /// Encode the ARP payload (without the Ethernet header).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ARP_LEN);
        out.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        out.extend_from_slice(&PTYPE_IPV4.to_be_bytes());
        out.push(6); // hardware address length
        out.push(4); // protocol address length
        out.extend_from_slice(&u16::from(self.op).to_be_bytes());
        out.extend_from_slice(&self.hwsrc.as_bytes());
        out.extend_from_slice(&self.protosrc.octets());
        out.extend_from_slice(&self.hwdst.as_bytes());
        out.extend_from_slice(&self.protodst.octets());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_request() {
        let pkt = ArpPacket {
            op: ArpOp::Request,
            hwsrc: MacAddr::new([0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01]),
            protosrc: Ipv4Addr::new(10, 0, 0, 100),
            hwdst: MacAddr::BROADCAST,
            protodst: Ipv4Addr::new(10, 0, 0, 1),
        };
        let encoded = pkt.encode();
        let parsed = ArpPacket::parse(&encoded).unwrap();
        assert_eq!(parsed.op, ArpOp::Request);
        assert_eq!(parsed.protosrc, pkt.protosrc);
        assert_eq!(parsed.protodst, pkt.protodst);
    }

    #[test]
    fn rejects_truncated() {
        assert!(ArpPacket::parse(&[0u8; 4]).is_err());
    }
}
