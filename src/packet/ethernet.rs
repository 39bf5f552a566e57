use crate::error::BalancerError;
use crate::mac::MacAddr;

const HEADER_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Other(u16),
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            other => EtherType::Other(other),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(value: EtherType) -> Self {
        match value {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EthernetFrame<'a> {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: EtherType,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    pub fn parse(raw: &'a [u8]) -> Result<Self, BalancerError> {
        if raw.len() < HEADER_LEN {
            return Err(BalancerError::MalformedPacket("ethernet header truncated"));
        }
        let dst = MacAddr::new(raw[0..6].try_into().unwrap());
        let src = MacAddr::new(raw[6..12].try_into().unwrap());
        let ethertype = u16::from_be_bytes([raw[12], raw[13]]).into();
        Ok(EthernetFrame {
            dst,
            src,
            ethertype,
            payload: &raw[HEADER_LEN..],
        })
    }

    /// Serialize a frame with the given payload already encoded.
    pub fn encode(dst: MacAddr, src: MacAddr, ethertype: EtherType, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&dst.as_bytes());
        out.extend_from_slice(&src.as_bytes());
        out.extend_from_slice(&u16::from(ethertype).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }
}
